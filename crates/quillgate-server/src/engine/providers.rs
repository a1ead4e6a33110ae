//! Provider HTTP clients.
//!
//! Every supported provider speaks the OpenAI-compatible chat-completions
//! shape (OpenAI natively, Anthropic via its compatibility endpoint), so one
//! client type covers the registry and per-provider differences reduce to a
//! base URL and a credential.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use quillgate_core::config::Config;
use quillgate_core::generation::{ChatMessage, GenerationRequest, TokenUsage};

/// Why a single provider call failed. These never reach the caller
/// directly — the executor folds them into its fallback decision.
#[derive(Debug, Error)]
pub enum ProviderCallError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx but the payload didn't have the expected shape, or json_mode
    /// output stayed unparsable after the one local repair attempt.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The resolved route names a provider with no configured client.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// A provider's successful answer. `usage` is `None` when the provider did
/// not report token metadata; the executor estimates from text length.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// One upstream generation backend.
///
/// Blocking HTTP I/O with provider-side timeouts; implementations must not
/// retry internally — retry policy (exactly one backup attempt) belongs to
/// the executor.
#[async_trait]
pub trait GenerationProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderCallError>;
}

// ---- OpenAI-compatible wire types -----------------------------------------

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

/// Client for one OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderCallError> {
        let body = ChatCompletionRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let url = url::Url::parse(&format!("{}/chat/completions", self.base_url))
            .map_err(|e| ProviderCallError::Transport(format!("invalid base url: {e}")))?;
        let mut request_builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderCallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderCallError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderCallError::Malformed("no choices in response".to_string()))?;

        debug!(provider = %self.name, model, "provider call succeeded");

        Ok(ProviderResponse {
            content,
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

/// Provider clients keyed by the names used in routing settings.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn GenerationProvider>>,
}

impl ProviderRegistry {
    /// Build the real HTTP registry from config: one OpenAI-compatible
    /// client per configured provider.
    pub fn from_config(config: &Config) -> Self {
        let timeout = config.provider_timeout();
        let mut registry = Self::default();
        registry.insert(Arc::new(OpenAiCompatProvider::new(
            "openai",
            &config.openai_base_url,
            config.openai_api_key.clone(),
            timeout,
        )));
        registry.insert(Arc::new(OpenAiCompatProvider::new(
            "anthropic",
            &config.anthropic_base_url,
            config.anthropic_api_key.clone(),
            timeout,
        )));
        registry
    }

    pub fn insert(&mut self, provider: Arc<dyn GenerationProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationProvider>> {
        self.providers.get(name).cloned()
    }
}
