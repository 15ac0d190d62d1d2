//! Local model server backend (`/api/chat`, non-streamed, JSON-constrained).

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Backend, BackendError, check_status, http_client};
use crate::core::types::ChatMessage;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Unauthenticated local chat server.
pub struct LocalBackend {
    http: reqwest::blocking::Client,
    chat_url: String,
    model: String,
}

impl LocalBackend {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let response = self
            .http
            .post(&self.chat_url)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: false,
                format: "json",
            })
            .send()?;
        let body: ChatResponse = check_status(response)?.json()?;
        let content = body
            .message
            .map(|message| message.content)
            .ok_or_else(|| BackendError::Decode("missing message.content".into()))?;
        debug!(chars = content.len(), "received chat reply");
        Ok(content)
    }
}
