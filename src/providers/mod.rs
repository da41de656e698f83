/*!
 * Provider implementations for different LLM chat services.
 *
 * This module contains client implementations for the supported providers:
 * - OpenAI: chat completions API, or any compatible server
 * - Anthropic: messages API
 * - Ollama: local LLM server
 *
 * All clients share the same HTTP retry loop: transient failures (network
 * errors, 429, 5xx) are retried with exponential backoff, everything else is
 * returned immediately.
 */

use async_trait::async_trait;
use log::warn;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::ProviderError;

pub mod anthropic;
pub mod ollama;
pub mod openai;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the translator.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Retry and pacing settings shared by every client
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Base backoff, doubled on each retry
    pub backoff_base_ms: u64,
    /// Requests per minute; paces retries when set
    pub rate_limit: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 1000,
            rate_limit: None,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        let paced = self.rate_limit.map(|rpm| 60_000 / rpm.max(1) as u64).unwrap_or(0);
        Duration::from_millis(exp.max(paced))
    }
}

/// Build an HTTP client with a request timeout
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

/// Map a non-success HTTP status onto a provider error
fn status_error(provider: &str, status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::AuthenticationError(format!("{} rejected credentials: {}", provider, body))
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(format!("{}: {}", provider, body)),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        },
    }
}

/// POST a JSON body and decode a JSON response, retrying transient failures
pub(crate) async fn post_json<Req, Resp>(
    client: &Client,
    provider: &str,
    url: &str,
    headers: HeaderMap,
    body: &Req,
    policy: RetryPolicy,
) -> Result<Resp, ProviderError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let mut attempt = 0;

    loop {
        let result = send_once(client, provider, url, headers.clone(), body).await;

        match result {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                warn!(
                    "{} request failed ({}), retry {}/{} in {:?}",
                    provider, e, attempt, policy.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once<Req, Resp>(
    client: &Client,
    provider: &str,
    url: &str,
    headers: HeaderMap,
    body: &Req,
) -> Result<Resp, ProviderError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_connect() {
                ProviderError::ConnectionError(format!("{}: {}", provider, e))
            } else {
                ProviderError::RequestFailed(format!("{}: {}", provider, e))
            }
        })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::RequestFailed(format!("{}: {}", provider, e)))?;

    if !status.is_success() {
        return Err(status_error(provider, status, text));
    }

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        ProviderError::ParseError(format!("{} response: {} ({})", provider, e, preview))
    })
}
