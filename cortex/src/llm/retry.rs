//! Retry-with-backoff wrapper shared by every backend.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{Backend, LanguageModelClient, ModelReply};
use crate::core::fence::strip_code_fence;
use crate::core::types::{Action, ChatMessage};

/// Suspends the calling thread between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Attempt budget and linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// [`LanguageModelClient`] that retries transient backend failures.
///
/// A 400 short-circuits to [`Action::context_too_large`]; exhausting the
/// attempt budget yields [`Action::backend_unreachable`]. Successful replies are
/// fence-stripped before they are returned.
pub struct RetryingClient<B, S = ThreadSleeper> {
    backend: B,
    policy: RetryPolicy,
    sleeper: S,
}

impl<B: Backend> RetryingClient<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self::with_sleeper(backend, policy, ThreadSleeper)
    }
}

impl<B: Backend, S: Sleeper> RetryingClient<B, S> {
    pub fn with_sleeper(backend: B, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            backend,
            policy,
            sleeper,
        }
    }
}

impl<B: Backend, S: Sleeper> LanguageModelClient for RetryingClient<B, S> {
    fn send(&self, messages: &[ChatMessage]) -> ModelReply {
        let max = self.policy.max_attempts.max(1);
        for attempt in 1..=max {
            match self.backend.complete(messages) {
                Ok(text) => return ModelReply::Text(strip_code_fence(&text)),
                Err(err) if err.is_bad_request() => {
                    error!(backend = self.backend.name(), err = %err, "request rejected as malformed, likely too large");
                    return ModelReply::Fallback(Action::context_too_large());
                }
                Err(err) => {
                    warn!(backend = self.backend.name(), attempt, max, err = %err, "model request failed");
                }
            }
            if attempt < max {
                let wait = self.policy.backoff(attempt);
                info!(wait_secs = wait.as_secs(), "retrying after backoff");
                self.sleeper.sleep(wait);
            }
        }
        error!(backend = self.backend.name(), "maximum connection retries reached");
        ModelReply::Fallback(Action::backend_unreachable())
    }
}
