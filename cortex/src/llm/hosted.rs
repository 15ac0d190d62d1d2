//! Hosted multi-model gateway backend (OpenAI-style chat completions).

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Backend, BackendError, check_status, http_client};
use crate::core::types::ChatMessage;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Bearer-authenticated chat-completions endpoint.
pub struct HostedBackend {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HostedBackend {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

impl Backend for HostedBackend {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()?;
        let body: CompletionResponse = check_status(response)?.json()?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Decode("missing choices[0].message.content".into()))?;
        debug!(chars = content.len(), "received completion");
        Ok(content)
    }
}
