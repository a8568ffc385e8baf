//! LLM provider adapters
//!
//! A "realtime connection" is a logical, session-scoped channel. Adapters
//! keep the active [`RealtimeConnectionConfig`] and answer single turns
//! against it; the orchestrator rebuilds and reconnects when an adapter
//! reports [`AgentError::ProviderNotConnected`](crate::AgentError::ProviderNotConnected).

pub mod openai;

pub use openai::{OpenAiProviderAdapter, DEFAULT_FALLBACK_ENDPOINT, DEFAULT_FALLBACK_MODEL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::credentials::CredentialProvider;
use crate::error::AgentResult;

/// Parameters for one connect (or reconnect) attempt
#[derive(Clone, PartialEq, Eq)]
pub struct RealtimeConnectionConfig {
    /// Credential namespace the key belongs to
    pub provider: CredentialProvider,
    /// Realtime model identifier
    pub model: String,
    /// Bearer token
    pub api_key: String,
    /// Conversation the connection is scoped to
    pub session_id: Uuid,
    /// Free-form connection metadata
    pub metadata: BTreeMap<String, String>,
}

impl fmt::Debug for RealtimeConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConnectionConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &crate::security::REDACTION_MARKER)
            .field("session_id", &self.session_id)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// One model turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Response text
    pub text: String,
    /// Round-trip time of the request
    pub latency_ms: u64,
}

/// LLM provider contract
#[async_trait]
pub trait LlmProviderAdapter: Send + Sync {
    /// Replace any active connection with one for `config`
    async fn connect_realtime(&self, config: RealtimeConnectionConfig) -> AgentResult<()>;

    /// Single-turn text exchange over the active connection
    async fn send_text(&self, input: &str) -> AgentResult<LlmResponse>;

    /// Drop the active connection; idempotent
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_key() {
        let config = RealtimeConnectionConfig {
            provider: CredentialProvider::OpenAi,
            model: "gpt-4o-realtime-preview".to_string(),
            api_key: "sk-supersecretsupersecret".to_string(),
            session_id: Uuid::new_v4(),
            metadata: BTreeMap::new(),
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
