//! Shared deterministic types for the mission loop.
//!
//! These types define the contracts between the controller, the parser and the
//! report synthesizer. They hold no I/O handles.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Sentinel command ending a mission successfully.
pub const FINISH_SUCCESS: &str = "FINISH_SUCCESS";
/// Sentinel command ending a mission as a failure.
pub const FINISH_FAILURE: &str = "FINISH_FAILURE";

/// Immutable mission parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionSpec {
    target: String,
    objective: String,
}

impl MissionSpec {
    /// Build a mission, rejecting blank target or objective.
    pub fn new(target: impl Into<String>, objective: impl Into<String>) -> Result<Self> {
        let target = target.into();
        let objective = objective.into();
        if target.trim().is_empty() {
            bail!("mission target must not be empty");
        }
        if objective.trim().is_empty() {
            bail!("mission objective must not be empty");
        }
        Ok(Self { target, objective })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }
}

/// Chat role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged turn, serialized exactly as both backends expect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only conversation sent to the model on every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Seed a conversation with the persona prompt and the opening request.
    pub fn seeded(system_prompt: impl Into<String>, opening: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(opening)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// How a mission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// The sentinel command associated with this outcome.
    pub fn sentinel(self) -> &'static str {
        match self {
            Outcome::Success => FINISH_SUCCESS,
            Outcome::Failure => FINISH_FAILURE,
        }
    }
}

/// Decoded intent for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub thought: String,
    pub command: String,
}

impl Action {
    pub fn new(thought: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            command: command.into(),
        }
    }

    /// Returns the outcome if `command` is a terminal sentinel.
    pub fn terminal(&self) -> Option<Outcome> {
        terminal_outcome(&self.command)
    }

    /// Replacement for a reply that could not be decoded.
    pub fn malformed_response() -> Self {
        Self::new(
            "The AI's response was not valid JSON. I will try again, ensuring my output is perfectly formatted.",
            "echo 'AI response has invalid format.'",
        )
    }

    /// Replacement for a request the backend rejected as malformed (HTTP 400).
    pub fn context_too_large() -> Self {
        Self::new(
            "The previous API request failed with a 400 error, likely because the context was too large. I need to proceed with a different approach, perhaps by summarizing previous findings or trying a less verbose command.",
            "echo 'API request failed, retrying with a different strategy.'",
        )
    }

    /// Replacement once every backend attempt has failed.
    pub fn backend_unreachable() -> Self {
        Self::new(
            "Critical API connection error. Check internet/DNS.",
            FINISH_FAILURE,
        )
    }

    /// Canonical JSON form replayed to the model as its own assistant turn.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "thought": self.thought, "command": self.command }).to_string()
    }
}

/// Map a command string to a terminal outcome, if it is a sentinel.
pub fn terminal_outcome(command: &str) -> Option<Outcome> {
    match command {
        FINISH_SUCCESS => Some(Outcome::Success),
        FINISH_FAILURE => Some(Outcome::Failure),
        _ => None,
    }
}
