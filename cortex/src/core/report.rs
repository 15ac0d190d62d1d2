//! Pure helpers for post-mission report synthesis.

use serde::Serialize;

use super::history::MissionHistory;
use super::types::{MissionSpec, Outcome};

/// Literal title of the first required report section.
pub const EXECUTIVE_SUMMARY: &str = "Executive Summary";
/// Literal title of the second required report section.
pub const PROOF_OF_CONCEPT: &str = "Proof of Concept (PoC)";

const NO_EVIDENCE: &str = "No direct evidence captured.";

/// Final product of a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    /// Model-written markdown document.
    Narrative { text: String },
    /// Minimal summary produced without consulting the model.
    Summary {
        target: String,
        objective: String,
        final_status: String,
        note: String,
    },
}

impl Report {
    pub fn summary(mission: &MissionSpec, final_status: &str, note: impl Into<String>) -> Self {
        Report::Summary {
            target: mission.target().to_string(),
            objective: mission.objective().to_string(),
            final_status: final_status.to_string(),
            note: note.into(),
        }
    }

    pub fn is_narrative(&self) -> bool {
        matches!(self, Report::Narrative { .. })
    }
}

/// Whether the history qualifies for a narrative report.
pub fn narrative_eligible(history: &MissionHistory) -> bool {
    history.outcome() == Some(Outcome::Success) && history.len() >= 2
}

/// Final command of the mission, or `UNKNOWN` for an empty history.
pub fn final_status(history: &MissionHistory) -> &str {
    history
        .last()
        .map(|record| record.command.as_str())
        .unwrap_or("UNKNOWN")
}

/// Compact textual log of every step for the report prompt.
pub fn render_log(history: &MissionHistory) -> String {
    history
        .records()
        .iter()
        .map(|record| match record.terminal() {
            Some(_) => format!(
                "Step {}: Mission finished with status: {}.",
                record.step, record.command
            ),
            None => format!(
                "Step {}:\n- Thought: {}\n- Command Executed: {}",
                record.step, record.thought, record.command
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Evidence for the PoC section, taken from the penultimate step.
///
/// A spilled result is referenced by its file; its content never reaches the
/// report prompt.
pub fn select_evidence(history: &MissionHistory) -> String {
    let Some(record) = history.penultimate() else {
        return NO_EVIDENCE.to_string();
    };
    if let Some(pointer) = &record.result_pointer {
        return format!("Evidence is located in the file: {pointer}");
    }
    match record.result.trim() {
        "" => NO_EVIDENCE.to_string(),
        evidence => evidence.to_string(),
    }
}

/// Presentational class of one rendered report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A fence marker opening or closing a code block.
    Fence,
    /// A line inside a fenced block.
    Code,
    /// The `# ` document title.
    Title,
    /// A `## ` section heading.
    Section,
    Plain,
}

/// Classify each line of a report for display.
pub fn classify_lines(text: &str) -> Vec<(LineKind, &str)> {
    let mut in_fence = false;
    text.lines()
        .map(|line| {
            let kind = if line.trim().starts_with("```") {
                in_fence = !in_fence;
                LineKind::Fence
            } else if in_fence {
                LineKind::Code
            } else if line.starts_with("# ") {
                LineKind::Title
            } else if line.starts_with("## ") {
                LineKind::Section
            } else {
                LineKind::Plain
            };
            (kind, line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Action;

    fn history(steps: &[(&str, &str, &str)], terminal: Option<&str>) -> MissionHistory {
        let mut history = MissionHistory::new();
        for (thought, command, result) in steps {
            let step = history
                .begin_step(&Action::new(*thought, *command))
                .expect("begin");
            history
                .complete_step(step, result.to_string(), None)
                .expect("complete");
        }
        if let Some(sentinel) = terminal {
            history
                .begin_step(&Action::new("wrap up", sentinel))
                .expect("terminal");
        }
        history
    }

    #[test]
    fn eligibility_requires_success_and_two_records() {
        assert!(!narrative_eligible(&MissionHistory::new()));
        assert!(!narrative_eligible(&history(&[], Some("FINISH_SUCCESS"))));
        assert!(!narrative_eligible(&history(
            &[("scan", "nmap", "open")],
            Some("FINISH_FAILURE")
        )));
        assert!(!narrative_eligible(&history(&[("scan", "nmap", "open")], None)));
        assert!(narrative_eligible(&history(
            &[("scan", "nmap", "open")],
            Some("FINISH_SUCCESS")
        )));
    }

    #[test]
    fn final_status_defaults_to_unknown() {
        assert_eq!(final_status(&MissionHistory::new()), "UNKNOWN");
        assert_eq!(
            final_status(&history(&[], Some("FINISH_FAILURE"))),
            "FINISH_FAILURE"
        );
    }

    #[test]
    fn log_renders_steps_and_terminal_note() {
        let log = render_log(&history(
            &[("scan ports", "nmap -F host", "80/tcp open")],
            Some("FINISH_SUCCESS"),
        ));
        assert_eq!(
            log,
            "Step 1:\n- Thought: scan ports\n- Command Executed: nmap -F host\nStep 2: Mission finished with status: FINISH_SUCCESS."
        );
    }

    #[test]
    fn evidence_prefers_trimmed_result() {
        let h = history(&[("a", "id", "  uid=0(root)\n")], Some("FINISH_SUCCESS"));
        assert_eq!(select_evidence(&h), "uid=0(root)");
    }

    #[test]
    fn spilled_evidence_is_referenced_by_file_not_content() {
        let big = "Z".repeat(40_000);
        let mut h = MissionHistory::new();
        let step = h.begin_step(&Action::new("a", "cat big")).expect("begin");
        h.complete_step(step, big.clone(), Some("output_step_1.log".into()))
            .expect("complete");
        h.begin_step(&Action::new("done", "FINISH_SUCCESS"))
            .expect("terminal");

        let evidence = select_evidence(&h);
        assert_eq!(evidence, "Evidence is located in the file: output_step_1.log");
        assert!(!evidence.contains('Z'));
    }

    #[test]
    fn evidence_placeholder_when_nothing_captured() {
        let h = history(&[("a", "true", "")], Some("FINISH_SUCCESS"));
        assert_eq!(select_evidence(&h), NO_EVIDENCE);
    }

    #[test]
    fn classifies_report_lines() {
        let text = "# Report\nintro\n## Executive Summary\n```\n# not a title\n```\ntail";
        let kinds: Vec<LineKind> = classify_lines(text).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Title,
                LineKind::Plain,
                LineKind::Section,
                LineKind::Fence,
                LineKind::Code,
                LineKind::Fence,
                LineKind::Plain,
            ]
        );
    }
}
