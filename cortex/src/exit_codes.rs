//! Stable exit codes for the cortex CLI.

/// The mission ended with `FINISH_SUCCESS`.
pub const OK: i32 = 0;
/// Invalid arguments/config, missing credentials, cancelled start, or other errors.
pub const INVALID: i32 = 1;
/// The mission ended with `FINISH_FAILURE` or hit its step limit.
pub const MISSION_FAILED: i32 = 2;
/// The operator interrupted the run (SIGINT). No report is produced.
pub const INTERRUPTED: i32 = 130;
