//! Decoding of raw model replies into [`Action`]s.

use serde::Deserialize;
use tracing::warn;

use super::types::Action;

const DEFAULT_THOUGHT: &str = "No thought recorded.";

/// Result of decoding a model reply before fallback substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAction {
    Ok(Action),
    ParseFailure(String),
}

impl ParsedAction {
    /// Collapse into an executable action, substituting the diagnostic no-op on failure.
    pub fn into_action(self) -> Action {
        match self {
            ParsedAction::Ok(action) => action,
            ParsedAction::ParseFailure(reason) => {
                warn!(%reason, "model reply was not a valid action");
                Action::malformed_response()
            }
        }
    }
}

#[derive(Deserialize)]
struct WireAction {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    command: Option<String>,
}

/// Decode `raw` as a `{thought, command}` object.
///
/// Missing keys fall back to defaults; anything that is not a JSON object with
/// string-valued keys is a parse failure.
pub fn decode(raw: &str) -> ParsedAction {
    match serde_json::from_str::<WireAction>(raw) {
        Ok(wire) => ParsedAction::Ok(Action {
            thought: wire.thought.unwrap_or_else(|| DEFAULT_THOUGHT.to_string()),
            command: wire.command.unwrap_or_default(),
        }),
        Err(err) => ParsedAction::ParseFailure(format!("{err} (received: {raw})")),
    }
}

/// Decode `raw` into an action. Never fails.
pub fn parse(raw: &str) -> Action {
    decode(raw).into_action()
}
