//! Scripted test doubles for the mission loop seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::console::MissionObserver;
use crate::core::report::Report;
use crate::core::types::{Action, ChatMessage, MissionSpec, Outcome};
use crate::io::shell::CommandExecutor;
use crate::llm::retry::Sleeper;
use crate::llm::{Backend, BackendError, LanguageModelClient, ModelReply};

/// Backend returning a fixed sequence of results, one per call.
pub struct ScriptedBackend {
    script: RefCell<VecDeque<Result<String, BackendError>>>,
    calls: Cell<u32>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, BackendError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, _messages: &[ChatMessage]) -> Result<String, BackendError> {
        self.calls.set(self.calls.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("script exhausted".into())))
    }
}

/// Sleeper that records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits.borrow().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

/// Client answering from a queue of replies and recording every conversation sent.
///
/// Once the queue is empty it answers with [`Action::backend_unreachable`], which
/// ends any mission loop.
#[derive(Default)]
pub struct ScriptedClient {
    replies: RefCell<VecDeque<ModelReply>>,
    sent: RefCell<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Convenience constructor from raw reply texts.
    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|text| ModelReply::Text(text.into()))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.sent.borrow().len()
    }

    /// Conversations passed to each call, in order.
    pub fn sent(&self) -> Vec<Vec<ChatMessage>> {
        self.sent.borrow().clone()
    }
}

impl LanguageModelClient for ScriptedClient {
    fn send(&self, messages: &[ChatMessage]) -> ModelReply {
        self.sent.borrow_mut().push(messages.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ModelReply::Fallback(Action::backend_unreachable()))
    }
}

/// Executor returning canned outputs in order and recording each command.
#[derive(Default)]
pub struct ScriptedExecutor {
    outputs: RefCell<VecDeque<String>>,
    commands: RefCell<Vec<(String, Duration)>>,
}

impl ScriptedExecutor {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: RefCell::new(outputs.into_iter().map(Into::into).collect()),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Commands executed so far.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.commands
            .borrow()
            .iter()
            .map(|(_, timeout)| *timeout)
            .collect()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &str, timeout: Duration) -> String {
        self.commands
            .borrow_mut()
            .push((command.to_string(), timeout));
        self.outputs.borrow_mut().pop_front().unwrap_or_default()
    }
}

/// Observer that keeps a compact log line per event.
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<String>>,
    report: RefCell<Option<Report>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn report(&self) -> Option<Report> {
        self.report.borrow().clone()
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl MissionObserver for RecordingObserver {
    fn mission_started(&self, mission: &MissionSpec) {
        self.push(format!("start {}", mission.target()));
    }

    fn step_started(&self, step: u32) {
        self.push(format!("step {step}"));
    }

    fn thought(&self, step: u32, thought: &str) {
        self.push(format!("thought {step} {thought}"));
    }

    fn executing(&self, step: u32, command: &str) {
        self.push(format!("exec {step} {command}"));
    }

    fn result_inline(&self, step: u32, chars: usize) {
        self.push(format!("inline {step} {chars}"));
    }

    fn result_spilled(&self, step: u32, chars: usize, pointer: &str) {
        self.push(format!("spilled {step} {chars} {pointer}"));
    }

    fn result_unsaved(&self, step: u32, chars: usize) {
        self.push(format!("unsaved {step} {chars}"));
    }

    fn mission_finished(&self, outcome: Option<Outcome>, final_status: &str) {
        self.push(format!("finished {outcome:?} {final_status}"));
    }

    fn report_started(&self) {
        self.push("report".to_string());
    }

    fn report_ready(&self, report: &Report) {
        self.push(format!("report ready narrative={}", report.is_narrative()));
        *self.report.borrow_mut() = Some(report.clone());
    }
}
