//! Autonomous think → act → observe mission runner.
//!
//! A language model proposes one shell command per step, the runner executes
//! it and feeds the result back until the model declares the mission finished.
//! The crate keeps the usual split:
//!
//! - **[`core`]**: Pure, deterministic logic (action decoding, history, report
//!   helpers). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, spill files,
//!   config and history files).
//! - **[`llm`]**: Model backends and the shared retry policy.
//!
//! [`mission`] and [`report`] coordinate these behind the [`console`]
//! presentation seam.

pub mod console;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod llm;
pub mod logging;
pub mod mission;
pub mod prompt;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
