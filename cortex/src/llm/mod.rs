//! Language model client abstraction.
//!
//! A [`Backend`] performs exactly one request against one protocol and reports
//! failures as typed [`BackendError`]s. [`retry::RetryingClient`] wraps any
//! backend with the shared retry/backoff policy and reply normalization, and is
//! what the mission loop talks to through [`LanguageModelClient`].

use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::types::{Action, ChatMessage};

pub mod hosted;
pub mod local;
pub mod retry;

/// Maximum response body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 500;

/// Reply handed back to the mission loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// Normalized model text, still to be decoded.
    Text(String),
    /// Synthesized action standing in for a reply the backend could not produce.
    Fallback(Action),
}

/// Anything that can answer a conversation.
pub trait LanguageModelClient {
    /// Send the full conversation and return the model's reply. Never fails.
    fn send(&self, messages: &[ChatMessage]) -> ModelReply;
}

/// Failure of a single backend request.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The server answered with a non-success status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    /// The request never produced a response (DNS, connect, timeout...).
    #[error("transport error: {0}")]
    Transport(String),
    /// A success response did not carry a reply where the protocol puts it.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// A 400 means the request itself is unacceptable; retrying cannot help.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, BackendError::Status { code: 400, .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// One request/response exchange with a model server.
pub trait Backend {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Send `messages` once and return the raw reply text.
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;
}

impl<T: LanguageModelClient + ?Sized> LanguageModelClient for &T {
    fn send(&self, messages: &[ChatMessage]) -> ModelReply {
        (**self).send(messages)
    }
}

impl<T: Backend + ?Sized> Backend for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        (**self).complete(messages)
    }
}

impl<T: Backend + ?Sized> Backend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        (**self).complete(messages)
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("build http client")
}

/// Turn a non-success response into [`BackendError::Status`].
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let cut = (0..=ERROR_BODY_LIMIT)
            .rev()
            .find(|idx| body.is_char_boundary(*idx))
            .unwrap_or(0);
        body.truncate(cut);
        body.push_str("...");
    }
    Err(BackendError::Status {
        code: status.as_u16(),
        body,
    })
}
