use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::util::retry::{RetryConfig, is_retryable_error};

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub web_grounded: bool,
}

/// The text-completion interface for an external LLM provider; the core
/// depends only on this trait.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// # Errors
    /// Returns an error after the configured retry budget is exhausted or on
    /// a missing credential.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

pub struct HttpLlmClient {
    client: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpLlmClient {
    /// # Errors
    /// Returns an error when the base URL cannot be parsed.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build().context("failed to build LLM client")?,
            base_url: Url::parse(base_url).context("invalid LLM base URL")?,
            api_key,
            timeout,
            retry: RetryConfig::default(),
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let endpoint = self.base_url.join("v1/complete").context("invalid completion endpoint")?;

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(endpoint.clone())
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => {
                        let body: CompletionResponse =
                            response.json().await.context("malformed LLM completion response")?;
                        return Ok(body.text);
                    }
                    Err(error) if is_retryable_error(&error) && self.retry.can_retry(attempt) => {
                        attempt += 1;
                        warn!(attempt, error = %error, "retrying LLM completion");
                        tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    }
                    Err(error) => return Err(error).context("LLM completion failed"),
                },
                Err(error) if is_retryable_error(&error) && self.retry.can_retry(attempt) => {
                    attempt += 1;
                    warn!(attempt, error = %error, "retrying LLM completion");
                    tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                }
                Err(error) => return Err(error).context("LLM completion request failed"),
            }
        }
    }
}
