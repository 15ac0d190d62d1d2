//! Append-only mission history.
//!
//! Step numbers start at 1 and are contiguous. Only the final record may carry a
//! terminal sentinel, and no record can be appended after it.

use anyhow::{Result, anyhow, bail};
use serde::Serialize;

use super::types::{Action, Outcome, terminal_outcome};

/// One think-act-observe iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: u32,
    pub thought: String,
    pub command: String,
    /// Raw captured output; empty for terminal steps.
    pub result: String,
    /// Spill file holding `result` when it exceeded the inline threshold.
    pub result_pointer: Option<String>,
    #[serde(skip)]
    completed: bool,
}

impl StepRecord {
    pub fn terminal(&self) -> Option<Outcome> {
        terminal_outcome(&self.command)
    }

    /// Whether the record is final (executed, or terminal).
    pub fn is_complete(&self) -> bool {
        self.completed
    }
}

/// Ordered step records for one mission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MissionHistory {
    records: Vec<StepRecord>,
}

impl MissionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for a freshly decided action and return its step number.
    ///
    /// Terminal actions are complete on creation; others await [`Self::complete_step`].
    pub fn begin_step(&mut self, action: &Action) -> Result<u32> {
        if let Some(last) = self.records.last() {
            if last.terminal().is_some() {
                bail!("mission already terminated at step {}", last.step);
            }
            if !last.completed {
                bail!("step {} has not been completed", last.step);
            }
        }
        let step = u32::try_from(self.records.len() + 1)
            .map_err(|_| anyhow!("step counter overflow"))?;
        self.records.push(StepRecord {
            step,
            thought: action.thought.clone(),
            command: action.command.clone(),
            result: String::new(),
            result_pointer: None,
            completed: action.terminal().is_some(),
        });
        Ok(step)
    }

    /// Fill the result of the pending step. Records are immutable afterwards.
    pub fn complete_step(
        &mut self,
        step: u32,
        result: String,
        result_pointer: Option<String>,
    ) -> Result<()> {
        let record = self
            .records
            .last_mut()
            .filter(|record| record.step == step)
            .ok_or_else(|| anyhow!("step {step} is not the pending step"))?;
        if record.completed {
            bail!("step {step} is already complete");
        }
        record.result = result;
        record.result_pointer = result_pointer;
        record.completed = true;
        Ok(())
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// The record before the last one, used as proof-of-concept evidence.
    pub fn penultimate(&self) -> Option<&StepRecord> {
        self.records.len().checked_sub(2).map(|idx| &self.records[idx])
    }

    /// Terminal outcome declared by the final record, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        self.records.last().and_then(StepRecord::terminal)
    }
}
