//! Generation request/result types shared by the executor and its provider
//! clients.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system" | "user" | "assistant" — passed through to the provider.
    pub role: String,
    pub content: String,
}

/// The caller's generation payload. Sent identically to the primary and, on
/// failure, the backup provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// When set, the output must parse as JSON; an unparsable response
    /// (after one local repair attempt) counts as a provider failure.
    #[serde(default)]
    pub json_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// What the executor hands back to the feature handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub model_used: String,
    pub provider_used: String,
    pub usage: TokenUsage,
}

/// One local repair attempt for structured output: strip markdown fences and
/// slice out the outermost JSON value. Returns the repaired string only if
/// it actually parses; `None` means the response stays a failure and the
/// executor moves on to the backup.
pub fn repair_json(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    // Models under json instructions most often wrap the payload in a
    // ```json fence or lead with prose; slicing the outermost bracket pair
    // recovers both.
    let candidate = match (trimmed.find(['{', '[']), trimmed.rfind(['}', ']'])) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => return None,
    };

    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .map(|_| candidate.to_string())
}
