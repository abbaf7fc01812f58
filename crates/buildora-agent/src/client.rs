//! Streaming chat-completions client
//!
//! Opens one streaming request per session. Rate limits and server errors are
//! retried with exponential backoff before any byte of the body is read; once
//! streaming has begun a fault fails the session instead.

use buildora_core::{BuildoraError, GenerationConfig, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::session::GenerationSession;
use crate::types::{ChatMessage, ChatRequest};

const APP_TITLE: &str = "Buildora";
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Client for an OpenRouter-compatible endpoint
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
    initial_backoff: Duration,
}

impl GenerationClient {
    /// Build a client, resolving the API key up front
    pub fn from_config(config: GenerationConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Ok(Self::with_api_key(config, api_key))
    }

    pub fn with_api_key(config: GenerationConfig, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    /// Override the first retry delay
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            frequency_penalty: self.config.frequency_penalty,
            presence_penalty: self.config.presence_penalty,
            stream: true,
        }
    }

    /// Send the request and return the response once its status is a success
    async fn open(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            tracing::debug!(
                "Sending generation request to {} (attempt {})",
                self.config.endpoint,
                retries + 1
            );

            let response = self
                .http
                .post(&self.config.endpoint)
                .bearer_auth(&self.api_key)
                .header("X-Title", APP_TITLE)
                .json(request)
                .send()
                .await
                .map_err(|e| BuildoraError::Network(format!("Failed to send request: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 401 {
                return Err(BuildoraError::Auth(format!(
                    "Invalid API key. Check the key in {}.",
                    self.config.api_key_env
                )));
            }

            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && retries < self.config.max_retries {
                retries += 1;
                let wait = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff)
                    .min(MAX_BACKOFF);

                tracing::warn!(
                    "Generation endpoint returned {}. Waiting {:?} before retry {}/{}",
                    status,
                    wait,
                    retries,
                    self.config.max_retries
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(BuildoraError::Api(format!(
                "API error {}: {}",
                status, error_text
            )));
        }
    }

    /// Run `session` against the endpoint until it is Done, Failed or Cancelled
    ///
    /// Returns the full generated text on success.
    pub async fn generate(
        &self,
        session: &mut GenerationSession,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = self.request(messages);
        session.status(format!("Target model: {}", request.model));
        session.status("Sending generation request...");
        session.start();

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.open(&request) => Some(opened),
        };
        let response = match opened {
            None => {
                session.cancel();
                return Err(BuildoraError::Cancelled);
            }
            Some(Err(e)) => {
                session.fail(&e);
                return Err(e);
            }
            Some(Ok(response)) => response,
        };

        session.status("Receiving stream...");
        session.consume(response.bytes_stream(), cancel).await?;

        tracing::info!(
            chars = session.raw().len(),
            skipped = session.skipped_frames(),
            "Generation complete"
        );
        Ok(session.raw().to_string())
    }
}
