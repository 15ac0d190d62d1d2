//! The think → act → observe mission loop.
//!
//! [`MissionController`] owns the conversation and the history for one
//! mission. Each step asks the model for an action, records it, executes it
//! unless it is terminal, and feeds the (possibly spilled) result back.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::console::MissionObserver;
use crate::core::action;
use crate::core::history::MissionHistory;
use crate::core::report::final_status;
use crate::core::types::{ChatMessage, Conversation, MissionSpec, Outcome};
use crate::io::shell::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT};
use crate::io::spill::{OutputSpillManager, SpillOutcome};
use crate::llm::{LanguageModelClient, ModelReply};
use crate::prompt::{inline_feedback, opening_prompt};

/// Loop knobs that do not change the conversation contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionSettings {
    pub command_timeout: Duration,
    /// Stop after this many recorded steps. `None` runs until a terminal action.
    pub max_steps: Option<u32>,
}

impl Default for MissionSettings {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_steps: None,
        }
    }
}

/// Reason the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStop {
    /// The model issued a terminal sentinel.
    Terminal(Outcome),
    /// The configured step limit was reached without a sentinel.
    StepLimit { max_steps: u32 },
}

/// Everything a finished mission leaves behind.
#[derive(Debug, Clone)]
pub struct MissionOutcome {
    pub stop: MissionStop,
    pub history: MissionHistory,
    pub conversation: Conversation,
}

impl MissionOutcome {
    pub fn outcome(&self) -> Outcome {
        match self.stop {
            MissionStop::Terminal(outcome) => outcome,
            MissionStop::StepLimit { .. } => Outcome::Failure,
        }
    }
}

/// Drives one mission from the seeded conversation to a terminal action.
pub struct MissionController<C, E, O> {
    mission: MissionSpec,
    client: C,
    executor: E,
    observer: O,
    spill: OutputSpillManager,
    settings: MissionSettings,
    conversation: Conversation,
    history: MissionHistory,
}

impl<C, E, O> MissionController<C, E, O>
where
    C: LanguageModelClient,
    E: CommandExecutor,
    O: MissionObserver,
{
    /// Seed the conversation with `system_prompt` and the opening request.
    pub fn new(
        mission: MissionSpec,
        system_prompt: impl Into<String>,
        client: C,
        executor: E,
        observer: O,
        spill: OutputSpillManager,
        settings: MissionSettings,
    ) -> Self {
        let conversation = Conversation::seeded(system_prompt, opening_prompt(&mission));
        Self {
            mission,
            client,
            executor,
            observer,
            spill,
            settings,
            conversation,
            history: MissionHistory::new(),
        }
    }

    /// Run steps until a terminal action or the step limit.
    #[instrument(skip_all, fields(target = %self.mission.target()))]
    pub fn run(mut self) -> Result<MissionOutcome> {
        self.observer.mission_started(&self.mission);
        let stop = loop {
            if let Some(max_steps) = self.settings.max_steps
                && self.history.len() >= max_steps as usize
            {
                warn!(max_steps, "step limit reached without a terminal action");
                let status = format!("step limit of {max_steps} reached");
                self.observer.mission_finished(None, &status);
                break MissionStop::StepLimit { max_steps };
            }
            if let Some(outcome) = self.step()? {
                break MissionStop::Terminal(outcome);
            }
        };
        info!(steps = self.history.len(), ?stop, "mission loop finished");
        Ok(MissionOutcome {
            stop,
            history: self.history,
            conversation: self.conversation,
        })
    }

    /// One iteration. Returns the outcome when the step was terminal.
    fn step(&mut self) -> Result<Option<Outcome>> {
        let next = self.history.len() + 1;
        let next = u32::try_from(next).unwrap_or(u32::MAX);
        self.observer.step_started(next);

        let action = match self.client.send(self.conversation.messages()) {
            ModelReply::Text(text) => action::parse(&text),
            ModelReply::Fallback(action) => action,
        };
        self.observer.thought(next, &action.thought);

        let step = self.history.begin_step(&action)?;
        if let Some(outcome) = action.terminal() {
            self.observer
                .mission_finished(Some(outcome), final_status(&self.history));
            return Ok(Some(outcome));
        }

        self.observer.executing(step, &action.command);
        let result = self
            .executor
            .execute(&action.command, self.settings.command_timeout);
        let chars = result.chars().count();
        debug!(step, chars, "command finished");

        let (feedback, pointer) = match self.spill.process(step, &result) {
            SpillOutcome::Inline(inline) => {
                self.observer.result_inline(step, chars);
                (inline_feedback(&inline), None)
            }
            SpillOutcome::Spilled { pointer, note } => {
                self.observer.result_spilled(step, chars, &pointer);
                (note, Some(pointer))
            }
            SpillOutcome::Unsaved { note } => {
                self.observer.result_unsaved(step, chars);
                (note, None)
            }
        };
        self.history.complete_step(step, result, pointer)?;

        self.conversation
            .push(ChatMessage::assistant(action.to_json()));
        self.conversation.push(ChatMessage::user(feedback));
        Ok(None)
    }
}
