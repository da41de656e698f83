use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Provider, RetryPolicy, build_client, post_json};
use crate::errors::ProviderError;

/// Ollama client for interacting with a local Ollama server
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model used by `test_connection`
    model: String,
    /// HTTP retry settings
    policy: RetryPolicy,
}

impl std::fmt::Debug for Ollama {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ollama")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Model options
#[derive(Debug, Default, Serialize)]
pub struct ChatOptions {
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name
    model: String,
    /// Conversation so far
    messages: Vec<ChatMessage>,
    /// Reply format; `json` constrains the model to a JSON value
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
    /// Streaming is always off; the client expects one JSON object
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// The assistant message
    pub message: ChatMessage,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            format: None,
            options: None,
            stream: false,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(ChatOptions::default).temperature = Some(temperature);
        self
    }

    /// Set the reply format
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

impl Ollama {
    /// Create a client from a base URL such as `http://localhost:11434`
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout),
            model: model.into(),
            policy,
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        post_json(&self.client, "Ollama", &url, HeaderMap::new(), &request, self.policy).await
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage {
                role: "user".to_string(),
                content: "Hello".to_string(),
            }],
        );
        self.complete(request).await?;
        Ok(())
    }

    fn extract_text(response: &ChatResponse) -> String {
        response.message.content.clone()
    }
}
