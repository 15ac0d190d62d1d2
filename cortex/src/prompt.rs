//! Prompt rendering for the mission loop and report synthesis.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::report::{EXECUTIVE_SUMMARY, PROOF_OF_CONCEPT};
use crate::core::types::{FINISH_FAILURE, FINISH_SUCCESS, MissionSpec};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const REPORT_TEMPLATE: &str = include_str!("prompts/report.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("report", REPORT_TEMPLATE)
            .expect("report template should be valid");
        Self { env }
    }

    /// Persona and operating rules seeded as the first conversation turn.
    pub fn system_prompt(&self, spill_threshold: usize) -> Result<String> {
        let rendered = self.env.get_template("system")?.render(context! {
            success => FINISH_SUCCESS,
            failure => FINISH_FAILURE,
            spill_threshold => spill_threshold,
        })?;
        Ok(rendered)
    }

    /// Single user turn asking for the final narrative report.
    pub fn report_prompt(
        &self,
        mission: &MissionSpec,
        mission_log: &str,
        evidence: &str,
    ) -> Result<String> {
        let rendered = self.env.get_template("report")?.render(context! {
            target => mission.target(),
            objective => mission.objective(),
            mission_log => mission_log,
            evidence => evidence,
            executive_summary => EXECUTIVE_SUMMARY,
            proof_of_concept => PROOF_OF_CONCEPT,
        })?;
        Ok(rendered)
    }
}

/// Opening user turn stating target and objective.
pub fn opening_prompt(mission: &MissionSpec) -> String {
    format!(
        "The target is '{}' and the objective is '{}'. Please begin.",
        mission.target(),
        mission.objective()
    )
}

/// User turn carrying an inline command result.
pub fn inline_feedback(result: &str) -> String {
    format!(
        "The result of your last command was:\n---\n{result}\n---\nBased on this full result, what is your next step?"
    )
}
