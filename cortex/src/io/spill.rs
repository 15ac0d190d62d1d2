//! Inline-or-spill decision for command results.
//!
//! Results over the threshold are written verbatim to `output_step_{n}.log` and the
//! model receives a pointer note instead of the content.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Default inline threshold, in characters.
pub const DEFAULT_SPILL_THRESHOLD: usize = 30_000;

/// How a result reaches the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpillOutcome {
    /// Result is small enough to embed directly.
    Inline(String),
    /// Result was persisted to `pointer`; `note` replaces it in the conversation.
    Spilled { pointer: String, note: String },
    /// Result was oversized but could not be saved. No file exists; `note`
    /// replaces the result in the conversation.
    Unsaved { note: String },
}

/// Persists oversized results under a spill directory.
#[derive(Debug, Clone)]
pub struct OutputSpillManager {
    dir: PathBuf,
    threshold_chars: usize,
}

impl OutputSpillManager {
    pub fn new(dir: impl Into<PathBuf>, threshold_chars: usize) -> Self {
        Self {
            dir: dir.into(),
            threshold_chars,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold_chars
    }

    /// Deterministic spill path for `step`.
    pub fn spill_path(&self, step: u32) -> PathBuf {
        self.dir.join(format!("output_step_{step}.log"))
    }

    /// Decide how `result` of `step` is handed to the model.
    pub fn process(&self, step: u32, result: &str) -> SpillOutcome {
        let chars = result.chars().count();
        if chars <= self.threshold_chars {
            return SpillOutcome::Inline(result.to_string());
        }

        let path = self.spill_path(step);
        let pointer = path.display().to_string();
        match write_spill(&path, result) {
            Ok(()) => {
                info!(step, chars, path = %pointer, "result spilled to file");
                let note = spill_note(&pointer);
                SpillOutcome::Spilled { pointer, note }
            }
            Err(err) => {
                warn!(step, err = %err, "failed to spill result");
                SpillOutcome::Unsaved {
                    note: format!(
                        "The command output was too large to display directly ({chars} characters) \
                         and could not be saved to a file: {err:#}. Try a more targeted command."
                    ),
                }
            }
        }
    }
}

fn spill_note(pointer: &str) -> String {
    format!(
        "The command output was too large to display directly. It has been saved to the file '{pointer}'.\n\
         You MUST analyze this file using file-reading commands (like 'head', 'tail', 'grep', 'cat') \
         to find the relevant information and decide your next step."
    )
}

fn write_spill(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create spill dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
