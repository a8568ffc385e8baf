//! Credential storage
//!
//! Two tiers:
//! - [`SecureKeyValueStore`]: raw bytes keyed by account name. This is the
//!   "secure tier" backed by the OS keychain in production
//!   ([`KeychainStore`]) or by process memory ([`InMemoryKeyValueStore`]).
//! - [`CredentialStore`]: provider-keyed API keys on top of a secure tier.
//!   Keys are sanitized on the way in and on the way out, so callers always
//!   see the canonical token.

pub mod keychain;

pub use keychain::KeychainStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AgentError, AgentResult};
use crate::security::sanitizer;

/// Service the credentials are filed under in the OS keychain
pub const DEFAULT_CREDENTIAL_SERVICE: &str = "wakeline.credentials";

/// A named external credential namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialProvider {
    /// LLM vendor, `sk-` prefixed keys
    #[serde(rename = "openai")]
    OpenAi,
    /// Speech synthesis vendor
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

impl CredentialProvider {
    /// Every provider, in display order
    pub const ALL: [CredentialProvider; 2] =
        [CredentialProvider::OpenAi, CredentialProvider::ElevenLabs];

    /// Wire name, also used as the secure-tier account
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialProvider::OpenAi => "openai",
            CredentialProvider::ElevenLabs => "elevenlabs",
        }
    }
}

impl fmt::Display for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(CredentialProvider::OpenAi),
            "elevenlabs" => Ok(CredentialProvider::ElevenLabs),
            other => Err(AgentError::Other(format!("Unknown provider: {}", other))),
        }
    }
}

/// Secure keyed byte store (OS keychain contract)
#[async_trait]
pub trait SecureKeyValueStore: Send + Sync {
    /// Read an entry; `None` when absent
    async fn get(&self, account: &str) -> AgentResult<Option<Vec<u8>>>;

    /// Create or replace an entry
    async fn set(&self, account: &str, value: &[u8]) -> AgentResult<()>;

    /// Delete an entry; deleting a missing entry is not an error
    async fn delete(&self, account: &str) -> AgentResult<()>;
}

/// Process-local secure tier
///
/// Nothing survives the process. Used by tests and `--ephemeral` runs.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureKeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, account: &str) -> AgentResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(account).cloned())
    }

    async fn set(&self, account: &str, value: &[u8]) -> AgentResult<()> {
        self.entries
            .lock()
            .await
            .insert(account.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, account: &str) -> AgentResult<()> {
        self.entries.lock().await.remove(account);
        Ok(())
    }
}

/// Provider-keyed API key storage
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store (or replace) the key for a provider
    async fn set_key(&self, provider: CredentialProvider, key: &str) -> AgentResult<()>;

    /// Read the key for a provider; `None` when nothing usable is stored
    async fn get_key(&self, provider: CredentialProvider) -> AgentResult<Option<String>>;

    /// Forget the key for a provider
    async fn remove_key(&self, provider: CredentialProvider) -> AgentResult<()>;
}

/// [`CredentialStore`] over any secure tier
#[derive(Clone)]
pub struct SecureCredentialStore {
    backend: Arc<dyn SecureKeyValueStore>,
}

impl SecureCredentialStore {
    /// Store credentials in `backend`
    pub fn new(backend: Arc<dyn SecureKeyValueStore>) -> Self {
        SecureCredentialStore { backend }
    }

    /// Credentials that live only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyValueStore::new()))
    }
}

#[async_trait]
impl CredentialStore for SecureCredentialStore {
    async fn set_key(&self, provider: CredentialProvider, key: &str) -> AgentResult<()> {
        let normalized = sanitizer::normalize(key, provider);
        if normalized.is_empty() {
            return Err(AgentError::InvalidCredentialFormat(provider));
        }

        self.backend
            .set(provider.as_str(), normalized.as_bytes())
            .await?;
        tracing::info!(provider = %provider, "stored credential");
        Ok(())
    }

    async fn get_key(&self, provider: CredentialProvider) -> AgentResult<Option<String>> {
        let Some(bytes) = self.backend.get(provider.as_str()).await? else {
            return Ok(None);
        };

        let raw = String::from_utf8(bytes).map_err(|_| AgentError::StorageCorrupted)?;
        let normalized = sanitizer::normalize(&raw, provider);
        Ok(if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        })
    }

    async fn remove_key(&self, provider: CredentialProvider) -> AgentResult<()> {
        self.backend.delete(provider.as_str()).await?;
        tracing::info!(provider = %provider, "removed credential");
        Ok(())
    }
}
