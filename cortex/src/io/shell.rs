//! Shell command execution for model-proposed actions.
//!
//! The [`CommandExecutor`] trait decouples the mission loop from process
//! spawning. Every failure mode is returned as text so the model can reason
//! about it on the next turn.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Default per-command wall-clock budget.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Returned for an empty command without spawning anything.
pub const NO_COMMAND: &str = "Error: No command to execute.";

/// Abstraction over command execution backends.
pub trait CommandExecutor {
    /// Run `command` and return its combined output. Never fails.
    fn execute(&self, command: &str, timeout: Duration) -> String;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn execute(&self, command: &str, timeout: Duration) -> String {
        (**self).execute(command, timeout)
    }
}

/// Executor that runs commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
    workdir: Option<PathBuf>,
    output_limit_bytes: usize,
}

impl ShellExecutor {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self {
            shell: PathBuf::from("sh"),
            workdir: None,
            output_limit_bytes,
        }
    }

    /// Run commands from `dir` instead of the process working directory.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

impl CommandExecutor for ShellExecutor {
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
    fn execute(&self, command: &str, timeout: Duration) -> String {
        if command.trim().is_empty() {
            return NO_COMMAND.to_string();
        }
        info!(command, "executing");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        match run_command_with_timeout(cmd, timeout, self.output_limit_bytes) {
            Ok(output) if output.timed_out => format!(
                "Error: The command timed out after {} seconds.",
                timeout.as_secs()
            ),
            Ok(output) => output.combined_text(),
            Err(err) => {
                warn!(err = %err, "command execution failed");
                format!("Error executing command: {err:#}")
            }
        }
    }
}
