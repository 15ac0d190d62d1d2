//! Mission configuration, optionally loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Model backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Hosted chat-completions gateway (bearer-token authenticated).
    Openrouter,
    /// Local model server speaking the `/api/chat` protocol.
    Ollama,
}

/// Cortex configuration (TOML).
///
/// Missing fields default to the values the mission loop was designed around.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CortexConfig {
    pub provider: Provider,

    /// Model identifier. Defaults to the hosted model; required for `ollama`.
    pub model: Option<String>,

    /// Hosted chat-completions endpoint.
    pub openrouter_url: String,

    /// Base URL of the local model server.
    pub ollama_url: String,

    /// Per-request network timeout.
    pub request_timeout_secs: u64,

    /// Wall-clock budget for each executed command.
    pub command_timeout_secs: u64,

    /// Total backend attempts per model call.
    pub max_attempts: u32,

    /// Wait after failed attempt `i` is `backoff_base_secs * i`.
    pub backoff_base_secs: u64,

    /// Results longer than this many characters are spilled to a file.
    pub spill_threshold_chars: usize,

    /// Directory receiving `output_step_{n}.log` files.
    pub spill_dir: PathBuf,

    /// Per-stream cap on captured command output held in memory.
    pub output_limit_bytes: usize,

    /// Optional step cap. Unset means the model alone decides when to stop.
    pub max_steps: Option<u32>,
}

pub const DEFAULT_HOSTED_MODEL: &str = "anthropic/claude-3.7-sonnet";
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Openrouter,
            model: None,
            openrouter_url: DEFAULT_OPENROUTER_URL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            request_timeout_secs: 180,
            command_timeout_secs: 600,
            max_attempts: 3,
            backoff_base_secs: 5,
            spill_threshold_chars: 30_000,
            spill_dir: PathBuf::from("."),
            output_limit_bytes: 64 * 1024 * 1024,
            max_steps: None,
        }
    }
}

impl CortexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.max_steps == Some(0) {
            return Err(anyhow!("max_steps must be > 0 when set"));
        }
        if self.provider == Provider::Ollama
            && self.model.as_deref().is_none_or(|m| m.trim().is_empty())
        {
            return Err(anyhow!("a model name is required for the ollama provider"));
        }
        Ok(())
    }

    /// Model identifier to send, falling back to the hosted default.
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_HOSTED_MODEL)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CortexConfig::default()`. Validation is left
/// to the caller so command-line overrides can be applied first.
pub fn load_config(path: &Path) -> Result<CortexConfig> {
    if !path.exists() {
        return Ok(CortexConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
