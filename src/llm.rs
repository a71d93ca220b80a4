// src/llm.rs

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSection;
use crate::error::{Result, ScanError};

/// Model identifiers known to the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelName {
    #[default]
    Turbo,
    TurboInstruct,
    Gpt4,
    Gpt4Turbo,
    Gpt4Preview1106,
}

/// The two invocation shapes an LLM endpoint accepts: a structured
/// role-tagged message list, or a single flat prompt string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Chat,
    Completion,
}

impl ModelName {
    /// The identifier sent over the wire.
    pub fn id(&self) -> &'static str {
        match self {
            ModelName::Turbo => "gpt-3.5-turbo",
            ModelName::TurboInstruct => "gpt-3.5-turbo-instruct",
            ModelName::Gpt4 => "gpt-4",
            ModelName::Gpt4Turbo => "gpt-4-turbo",
            ModelName::Gpt4Preview1106 => "gpt-4-1106-preview",
        }
    }

    /// Which invocation shape this model requires. Each model maps to
    /// exactly one kind; adding a model is one arm here and one in [`id`].
    ///
    /// [`id`]: ModelName::id
    pub fn kind(&self) -> CompletionKind {
        match self {
            ModelName::TurboInstruct => CompletionKind::Completion,
            ModelName::Turbo
            | ModelName::Gpt4
            | ModelName::Gpt4Turbo
            | ModelName::Gpt4Preview1106 => CompletionKind::Chat,
        }
    }
}

impl FromStr for ModelName {
    type Err = ScanError;

    /// Accepts the wire identifier or a short alias. An identifier the
    /// table does not know is an explicit error, never a guessed default.
    fn from_str(s: &str) -> Result<ModelName> {
        match s.trim().to_lowercase().as_str() {
            "gpt-3.5-turbo" | "turbo" => Ok(ModelName::Turbo),
            "gpt-3.5-turbo-instruct" | "turbo-instruct" => Ok(ModelName::TurboInstruct),
            "gpt-4" => Ok(ModelName::Gpt4),
            "gpt-4-turbo" => Ok(ModelName::Gpt4Turbo),
            "gpt-4-1106-preview" => Ok(ModelName::Gpt4Preview1106),
            other => Err(ScanError::UnsupportedModel(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    temperature: f64,
    // The legacy endpoint defaults to 16 tokens, far too few for a receipt.
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
}

/// The LLM client boundary: the two call shapes, nothing more.
///
/// Implementors encapsulate transport and vendor details; the dispatcher
/// stays decoupled from any particular HTTP client. Retry policy, if any,
/// belongs to the implementor, not the core.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse>;

    async fn complete(&self, model: &str, prompt: &str) -> Result<CompletionResponse>;
}

/// Select the invocation shape for `model`, call the client, and extract
/// the raw textual response.
pub async fn invoke(client: &dyn LlmClient, model: ModelName, prompt: &str) -> Result<String> {
    debug!(model = model.id(), kind = ?model.kind(), prompt_len = prompt.len(), "Dispatching to LLM");

    let content = match model.kind() {
        CompletionKind::Chat => client
            .chat(model.id(), vec![ChatMessage::user(prompt)])
            .await?
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content),
        CompletionKind::Completion => client
            .complete(model.id(), prompt)
            .await?
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text),
    };

    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ScanError::EmptyModelResponse),
    }
}

/// Client for an OpenAI-compatible HTTP API.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ScanError::upstream)?;
        Ok(OpenAiClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Resolve the config section into a ready client. The API key comes
    /// from the environment variable the config names.
    pub fn from_config(llm: &LlmSection) -> Result<Self> {
        let api_key = std::env::var(&llm.api_key_env)
            .map_err(|_| ScanError::UpstreamCallFailed(
                format!("{} env var not set", llm.api_key_env).into(),
            ))?;
        OpenAiClient::new(&llm.base_url, api_key, Duration::from_secs(llm.timeout_secs))
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(ScanError::upstream)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::UpstreamCallFailed(
                format!("API error {status}: {body}").into(),
            ));
        }

        response.json().await.map_err(ScanError::upstream)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse> {
        self.post_json(
            "/chat/completions",
            &ChatRequest {
                model: model.to_string(),
                messages,
                temperature: 0.0,
            },
        )
        .await
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<CompletionResponse> {
        self.post_json(
            "/completions",
            &CompletionRequest {
                model: model.to_string(),
                prompt: prompt.to_string(),
                temperature: 0.0,
                max_tokens: 2048,
            },
        )
        .await
    }
}
