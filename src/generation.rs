//! Generation boundary: turning assembled context into prose.
//!
//! The engine only depends on the [`Generator`] trait and treats the call
//! as an opaque, failable external step: a failure is recovered with the
//! deterministic fallback response, never surfaced to the end user as a
//! hard error. [`ChatClient`] is the shipped implementation, an
//! OpenAI-compatible chat-completions client (Groq by default, matching
//! any provider that exposes `/v1/chat/completions`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};

/// Default chat-completions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Produces a prose answer from an assembled prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Generation endpoint configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl GenerationConfig {
    /// Resolve from `ASKDOCS_LLM_BASE_URL`, `ASKDOCS_LLM_MODEL` and
    /// `GROQ_API_KEY` (or `ASKDOCS_API_KEY`), with defaults for the rest.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ASKDOCS_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("ASKDOCS_LLM_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_key: std::env::var("GROQ_API_KEY")
                .or_else(|_| std::env::var("ASKDOCS_API_KEY"))
                .ok(),
        }
    }
}

/// OpenAI-compatible chat completions client.
pub struct ChatClient {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl ChatClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                Error::Generation(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { client, config })
    }

    /// Build a client from the environment, or `None` when no API key is
    /// configured; queries then answer through the fallback path.
    pub fn from_env() -> Result<Option<Self>> {
        let config = GenerationConfig::from_env();
        if config.api_key.is_none() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request =
                request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value =
            response.json().await.map_err(|e| {
                Error::Generation(format!("failed to parse response: {e}"))
            })?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                Error::Generation(format!(
                    "unexpected response structure: {response_body}"
                ))
            })?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(vec![ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        }])
        .await
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

/// Assemble the generation prompt from the retrieved context and the
/// user's question.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an expert document analyst. Answer the user's question \
         using the provided context from multiple documents.\n\n\
         CONTEXT INFORMATION:\n{context}\n\n\
         USER QUESTION: {query}\n\n\
         INSTRUCTIONS:\n\
         1. Answer from ALL relevant information in the context\n\
         2. Synthesize across documents when the question spans sources\n\
         3. Include specific details and examples when available\n\
         4. State clearly when the context is incomplete\n\
         5. Cite documents or pages when referencing information\n\n\
         ANSWER:"
    )
}
