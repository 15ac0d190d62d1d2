//! Side-effecting helpers: processes, spill files, configuration and dumps.

pub mod config;
pub mod history_store;
#[cfg(unix)]
pub mod interrupt;
pub mod process;
pub mod shell;
pub mod spill;
