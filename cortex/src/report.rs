//! Post-mission report synthesis.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::console::MissionObserver;
use crate::core::history::MissionHistory;
use crate::core::report::{Report, final_status, narrative_eligible, render_log, select_evidence};
use crate::core::types::{ChatMessage, MissionSpec};
use crate::llm::{LanguageModelClient, ModelReply};
use crate::prompt::PromptEngine;

const NOT_ELIGIBLE_NOTE: &str =
    "Mission did not complete successfully or had no steps. Generating a basic summary.";

/// Turns a finished mission into a [`Report`].
pub struct ReportSynthesizer<'a, C> {
    client: C,
    prompts: &'a PromptEngine,
}

impl<'a, C: LanguageModelClient> ReportSynthesizer<'a, C> {
    pub fn new(client: C, prompts: &'a PromptEngine) -> Self {
        Self { client, prompts }
    }

    /// Ask the model for a narrative when the mission succeeded with evidence,
    /// otherwise summarize locally without a model call.
    #[instrument(skip_all, fields(steps = history.len()))]
    pub fn generate(&self, mission: &MissionSpec, history: &MissionHistory) -> Result<Report> {
        if !narrative_eligible(history) {
            info!("mission not eligible for a narrative report");
            return Ok(Report::summary(
                mission,
                final_status(history),
                NOT_ELIGIBLE_NOTE,
            ));
        }

        let prompt =
            self.prompts
                .report_prompt(mission, &render_log(history), &select_evidence(history))?;
        match self.client.send(&[ChatMessage::user(prompt)]) {
            ModelReply::Text(text) => Ok(Report::Narrative { text }),
            ModelReply::Fallback(action) => {
                warn!(thought = %action.thought, "report request degraded");
                Ok(Report::summary(
                    mission,
                    final_status(history),
                    format!("Report generation failed: {}", action.thought),
                ))
            }
        }
    }

    /// Generate the report and hand it to `observer`.
    pub fn generate_and_render<O: MissionObserver>(
        &self,
        mission: &MissionSpec,
        history: &MissionHistory,
        observer: &O,
    ) -> Result<Report> {
        observer.report_started();
        let report = self.generate(mission, history)?;
        observer.report_ready(&report);
        Ok(report)
    }
}
