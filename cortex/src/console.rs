//! Operator-facing presentation of a mission.
//!
//! The loop and the report synthesizer only talk to [`MissionObserver`]; the
//! terminal rendering and the optional plain-text transcript live here.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::warn;

use crate::core::report::{LineKind, Report, classify_lines};
use crate::core::types::{FINISH_SUCCESS, MissionSpec, Outcome};

const RULE_WIDTH: usize = 80;

/// Receives mission progress events. Every method defaults to a no-op.
pub trait MissionObserver {
    fn mission_started(&self, _mission: &MissionSpec) {}
    fn step_started(&self, _step: u32) {}
    fn thought(&self, _step: u32, _thought: &str) {}
    fn executing(&self, _step: u32, _command: &str) {}
    fn result_inline(&self, _step: u32, _chars: usize) {}
    fn result_spilled(&self, _step: u32, _chars: usize, _pointer: &str) {}
    /// The result was over the threshold but writing the spill file failed.
    fn result_unsaved(&self, _step: u32, _chars: usize) {}
    /// `outcome` is `None` when the mission stopped without a terminal action.
    fn mission_finished(&self, _outcome: Option<Outcome>, _final_status: &str) {}
    fn report_started(&self) {}
    fn report_ready(&self, _report: &Report) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl MissionObserver for NullObserver {}

impl<T: MissionObserver + ?Sized> MissionObserver for &T {
    fn mission_started(&self, mission: &MissionSpec) {
        (**self).mission_started(mission);
    }
    fn step_started(&self, step: u32) {
        (**self).step_started(step);
    }
    fn thought(&self, step: u32, thought: &str) {
        (**self).thought(step, thought);
    }
    fn executing(&self, step: u32, command: &str) {
        (**self).executing(step, command);
    }
    fn result_inline(&self, step: u32, chars: usize) {
        (**self).result_inline(step, chars);
    }
    fn result_spilled(&self, step: u32, chars: usize, pointer: &str) {
        (**self).result_spilled(step, chars, pointer);
    }
    fn result_unsaved(&self, step: u32, chars: usize) {
        (**self).result_unsaved(step, chars);
    }
    fn mission_finished(&self, outcome: Option<Outcome>, final_status: &str) {
        (**self).mission_finished(outcome, final_status);
    }
    fn report_started(&self) {
        (**self).report_started();
    }
    fn report_ready(&self, report: &Report) {
        (**self).report_ready(report);
    }
}

/// Colored terminal output, optionally duplicated as plain text to a transcript file.
pub struct TerminalConsole {
    transcript: RefCell<Option<BufWriter<File>>>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            transcript: RefCell::new(None),
        }
    }

    /// Also append every printed line, without colors, to `path`.
    pub fn with_transcript(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("create transcript {}", path.display()))?;
        Ok(Self {
            transcript: RefCell::new(Some(BufWriter::new(file))),
        })
    }

    /// Print the startup banner and safety warning.
    pub fn banner(&self) {
        self.line(
            "--- AI CYBER AGENT FRAMEWORK ---".magenta().bold(),
            "--- AI CYBER AGENT FRAMEWORK ---",
        );
        let rule = "=".repeat(60);
        self.plain(&format!("\n{rule}"));
        let warning = "Commands proposed by the model run unreviewed on this machine.\n\
                       PROCEED ONLY IF YOU ARE USING A DISPOSABLE VIRTUAL MACHINE.";
        self.line(warning.red(), warning);
        self.plain(&format!("{rule}\n"));
    }

    fn line(&self, styled: impl std::fmt::Display, plain: &str) {
        println!("{styled}");
        self.record(plain);
    }

    fn plain(&self, text: &str) {
        self.line(text, text);
    }

    fn rule(&self, title: &str, color: fn(&str) -> colored::ColoredString) {
        let rule = "=".repeat(RULE_WIDTH);
        let text = format!("\n{rule}\n{title}\n{rule}");
        self.line(color(&text).bold(), &text);
    }

    fn record(&self, plain: &str) {
        let mut guard = self.transcript.borrow_mut();
        let Some(writer) = guard.as_mut() else {
            return;
        };
        if let Err(err) = writeln!(writer, "{plain}").and_then(|()| writer.flush()) {
            warn!(err = %err, "transcript write failed, disabling transcript");
            *guard = None;
        }
    }

    fn render_narrative(&self, text: &str) {
        for (kind, line) in classify_lines(text) {
            match kind {
                LineKind::Fence => self.line(line.dimmed(), line),
                LineKind::Code => self.line(line.green(), line),
                LineKind::Title => self.line(line.cyan().bold(), line),
                LineKind::Section => self.line(line.yellow().bold(), line),
                LineKind::Plain => self.plain(line),
            }
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionObserver for TerminalConsole {
    fn mission_started(&self, mission: &MissionSpec) {
        self.line(
            "\n--- STARTING MISSION ---".cyan().bold(),
            "\n--- STARTING MISSION ---",
        );
        self.line(
            format!("{} {}", "Target:".bold(), mission.target()),
            &format!("Target: {}", mission.target()),
        );
        self.line(
            format!("{} {}", "Objective:".bold(), mission.objective()),
            &format!("Objective: {}", mission.objective()),
        );
        self.plain("--------------------------\n");
    }

    fn step_started(&self, step: u32) {
        let header = format!("\n--- STEP {step} ---");
        self.line(header.magenta().bold(), &header);
        self.line("[*] Thinking...".cyan(), "[*] Thinking...");
    }

    fn thought(&self, _step: u32, thought: &str) {
        self.line(
            format!("{} {}", "[+] THOUGHT:".green().bold(), thought.green()),
            &format!("[+] THOUGHT: {thought}"),
        );
    }

    fn executing(&self, _step: u32, command: &str) {
        self.line(
            format!("\n{} {}", "[>>] EXECUTING:".yellow().bold(), command),
            &format!("\n[>>] EXECUTING: {command}"),
        );
    }

    fn result_inline(&self, _step: u32, chars: usize) {
        let text = format!("[<<] FULL RESULT SENT TO AI ({chars} characters)");
        self.line(text.blue().bold(), &text);
    }

    fn result_spilled(&self, _step: u32, chars: usize, pointer: &str) {
        let text =
            format!("[<<] RESULT IS TOO LARGE ({chars} chars). Saved to '{pointer}'. Informing AI.");
        self.line(text.blue().bold(), &text);
    }

    fn result_unsaved(&self, _step: u32, chars: usize) {
        let text = format!(
            "[<<] RESULT IS TOO LARGE ({chars} chars) AND COULD NOT BE SAVED. Informing AI."
        );
        self.line(text.red().bold(), &text);
    }

    fn mission_finished(&self, outcome: Option<Outcome>, final_status: &str) {
        let text = format!("\n--- MISSION COMPLETE --- \nFinal Status: {final_status}");
        match outcome {
            Some(Outcome::Success) => self.line(text.green().bold(), &text),
            _ => self.line(text.red().bold(), &text),
        }
    }

    fn report_started(&self) {
        self.rule("Generating Final Narrative Report...", |s| s.cyan());
    }

    fn report_ready(&self, report: &Report) {
        match report {
            Report::Narrative { text } => {
                self.rule("FINAL MISSION REPORT", |s| s.green());
                self.render_narrative(text);
                self.rule("END OF REPORT", |s| s.cyan());
            }
            Report::Summary {
                target,
                objective,
                final_status,
                note,
            } => {
                self.line(
                    format!("{} {}", "**Target:**".bold(), target),
                    &format!("**Target:** {target}"),
                );
                self.line(
                    format!("{} {}", "**Objective:**".bold(), objective),
                    &format!("**Objective:** {objective}"),
                );
                let styled = if final_status == FINISH_SUCCESS {
                    final_status.green()
                } else {
                    final_status.red()
                };
                self.line(
                    format!("{} {}", "**Final Result:**".bold(), styled),
                    &format!("**Final Result:** {final_status}"),
                );
                self.line(note.yellow(), note);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn transcript_receives_plain_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("session.log");
        let console = TerminalConsole::with_transcript(&path).expect("console");
        let mission = MissionSpec::new("example.com", "identify open ports").expect("spec");

        console.mission_started(&mission);
        console.step_started(1);
        console.thought(1, "scan");
        console.result_unsaved(1, 40_000);
        console.report_ready(&Report::Narrative {
            text: "# Title\n## Executive Summary\n```\n80/tcp\n```".into(),
        });

        let transcript = fs::read_to_string(&path).expect("read");
        assert!(transcript.contains("Target: example.com"));
        assert!(transcript.contains("--- STEP 1 ---"));
        assert!(transcript.contains("[+] THOUGHT: scan"));
        assert!(transcript.contains("(40000 chars) AND COULD NOT BE SAVED"));
        assert!(!transcript.contains("Saved to"));
        assert!(transcript.contains("## Executive Summary"));
        assert!(!transcript.contains('\u{1b}'));
    }

    #[test]
    fn missing_transcript_dir_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(TerminalConsole::with_transcript(&temp.path().join("no/such/dir/log")).is_err());
    }
}
