//! Pure mission logic: types, reply decoding, history and report helpers.
//!
//! Nothing here performs I/O.

pub mod action;
pub mod fence;
pub mod history;
pub mod report;
pub mod types;
