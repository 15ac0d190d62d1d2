//! Operator interrupt handling.
//!
//! Commands run in their own process group, so a terminal Ctrl-C only reaches
//! cortex. The handler kills the running command's group and exits.

use std::thread;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

use crate::exit_codes;
use crate::io::process::kill_active_group;

/// Register the SIGINT handler on a dedicated thread.
///
/// On the first interrupt the running command group is killed and the process
/// exits with [`exit_codes::INTERRUPTED`]. No report is produced.
pub fn install() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    let mut sigint = {
        let _guard = runtime.enter();
        signal(SignalKind::interrupt()).context("register SIGINT handler")?
    };

    thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            if runtime.block_on(sigint.recv()).is_none() {
                return;
            }
            info!("interrupted, killing running command");
            kill_active_group();
            eprintln!("\nInterrupted.");
            std::process::exit(exit_codes::INTERRUPTED);
        })
        .context("spawn interrupt thread")?;
    Ok(())
}
