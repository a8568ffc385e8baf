//! OpenAI-style adapter
//!
//! Connecting records the session config; each turn is a POST to the
//! Responses endpoint:
//!
//! ```text
//! POST /v1/responses
//! Authorization: Bearer sk-...
//! {"model": "<fallback model>", "input": "<text>"}
//! ```
//!
//! The text comes back as `output_text`, or as `output[0].content[0].text`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tokio::sync::Mutex;
use url::Url;

use super::{LlmProviderAdapter, LlmResponse, RealtimeConnectionConfig};
use crate::credentials::CredentialProvider;
use crate::error::{AgentError, AgentResult};
use crate::security::{self, sanitizer, NetworkAllowlist};

/// Single-turn endpoint
pub const DEFAULT_FALLBACK_ENDPOINT: &str = "https://api.openai.com/v1/responses";

/// Model used for single-turn requests
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4.1-mini";

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Adapter for the `openai` provider
pub struct OpenAiProviderAdapter {
    client: Client,
    endpoint: Url,
    model: String,
    allowlist: NetworkAllowlist,
    active: Mutex<Option<RealtimeConnectionConfig>>,
}

impl OpenAiProviderAdapter {
    /// Adapter posting turns to `endpoint` with `model`
    pub fn new(endpoint: Url, model: impl Into<String>, allowlist: NetworkAllowlist) -> Self {
        OpenAiProviderAdapter {
            client: Client::new(),
            endpoint,
            model: model.into(),
            allowlist,
            active: Mutex::new(None),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies)
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Whether a connection is active
    pub async fn is_connected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    async fn post_turn(&self, api_key: &str, input: &str) -> AgentResult<String> {
        self.allowlist.validate(&self.endpoint)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&ResponsesRequest {
                model: &self.model,
                input,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "model request failed");
            return Err(AgentError::NetworkFailure(status.as_u16()));
        }

        let body = response.bytes().await?;
        let json: Value =
            serde_json::from_slice(&body).map_err(|_| AgentError::UnsupportedResponse)?;
        extract_text(&json).ok_or(AgentError::UnsupportedResponse)
    }
}

/// Known response shapes, in order
fn extract_text(json: &Value) -> Option<String> {
    let direct = json.get("output_text").and_then(Value::as_str);
    let nested = || json.pointer("/output/0/content/0/text").and_then(Value::as_str);

    direct
        .filter(|t| !t.is_empty())
        .or_else(|| nested().filter(|t| !t.is_empty()))
        .map(str::to_string)
}

#[async_trait]
impl LlmProviderAdapter for OpenAiProviderAdapter {
    async fn connect_realtime(&self, config: RealtimeConnectionConfig) -> AgentResult<()> {
        if config.provider != CredentialProvider::OpenAi {
            return Err(AgentError::Other(format!(
                "OpenAI adapter does not support provider {}",
                config.provider
            )));
        }

        let api_key = sanitizer::normalize(&config.api_key, CredentialProvider::OpenAi);
        if !security::validate_api_key_format(CredentialProvider::OpenAi, &api_key) {
            return Err(AgentError::InvalidCredentialFormat(CredentialProvider::OpenAi));
        }

        let session_id = config.session_id;
        *self.active.lock().await = Some(RealtimeConnectionConfig { api_key, ..config });
        tracing::debug!(%session_id, "provider connected");
        Ok(())
    }

    async fn send_text(&self, input: &str) -> AgentResult<LlmResponse> {
        let config = self
            .active
            .lock()
            .await
            .clone()
            .ok_or(AgentError::ProviderNotConnected)?;

        tracing::debug!(
            session_id = %config.session_id,
            input = %security::fingerprint(input),
            input_len = input.len(),
            "sending turn"
        );

        let started = Instant::now();
        let text = self.post_turn(&config.api_key, input).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(LlmResponse { text, latency_ms })
    }

    async fn close(&self) {
        if self.active.lock().await.take().is_some() {
            tracing::debug!("provider connection closed");
        }
    }
}
