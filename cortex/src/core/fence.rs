//! Markdown code-fence normalization for model replies.

use std::sync::LazyLock;

use regex::Regex;

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json(.*?)(?:```|\z)").expect("valid fence regex"));

/// Strip documentation-style fences wrapped around a reply.
///
/// A ```` ```json ```` block anywhere in the reply wins and its body is returned
/// trimmed. Otherwise a reply that is entirely wrapped in a plain fence is
/// unwrapped. Anything else is returned trimmed.
pub fn strip_code_fence(reply: &str) -> String {
    if let Some(caps) = JSON_FENCE_RE.captures(reply) {
        return caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
    }
    let trimmed = reply.trim();
    if trimmed.len() >= 6 && trimmed.starts_with("```") && trimmed.ends_with("```") {
        return trimmed[3..trimmed.len() - 3].trim().to_string();
    }
    trimmed.to_string()
}
