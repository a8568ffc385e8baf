//! OS keychain secure tier
//!
//! - macOS: Keychain Services via `security-framework`
//! - Linux: Secret Service (GNOME Keyring, KWallet) via `secret-service`
//! - elsewhere: every call fails; use `--ephemeral` or inject another tier
//!
//! Values are stored hex encoded because both backends prefer text secrets.

use async_trait::async_trait;

use super::SecureKeyValueStore;
use crate::error::{AgentError, AgentResult};

/// Secure tier backed by the platform keychain
#[derive(Clone, Debug)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    /// Entries are filed under `service`, one account per key
    pub fn new(service: impl Into<String>) -> Self {
        KeychainStore {
            service: service.into(),
        }
    }

    /// Keychain service name
    pub fn service(&self) -> &str {
        &self.service
    }
}

#[async_trait]
impl SecureKeyValueStore for KeychainStore {
    async fn get(&self, account: &str) -> AgentResult<Option<Vec<u8>>> {
        match platform::get(&self.service, account).await? {
            Some(hex_str) => hex::decode(hex_str.trim())
                .map(Some)
                .map_err(|_| AgentError::StorageCorrupted),
            None => Ok(None),
        }
    }

    async fn set(&self, account: &str, value: &[u8]) -> AgentResult<()> {
        platform::set(&self.service, account, &hex::encode(value)).await
    }

    async fn delete(&self, account: &str) -> AgentResult<()> {
        platform::delete(&self.service, account).await
    }
}

fn keychain_error(context: &str, err: impl std::fmt::Display) -> AgentError {
    AgentError::Other(format!("Keychain {} failed: {}", context, err))
}

// ============================================================================
// macOS implementation using security-framework
// ============================================================================

#[cfg(target_os = "macos")]
mod platform {
    use security_framework::passwords::{
        delete_generic_password, get_generic_password, set_generic_password,
    };

    use super::*;

    /// errSecItemNotFound
    const ITEM_NOT_FOUND: i32 = -25300;

    pub async fn get(service: &str, account: &str) -> AgentResult<Option<String>> {
        match get_generic_password(service, account) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| AgentError::StorageCorrupted),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(keychain_error("read", e)),
        }
    }

    pub async fn set(service: &str, account: &str, value: &str) -> AgentResult<()> {
        // set_generic_password replaces an existing item
        set_generic_password(service, account, value.as_bytes())
            .map_err(|e| keychain_error("write", e))
    }

    pub async fn delete(service: &str, account: &str) -> AgentResult<()> {
        match delete_generic_password(service, account) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(()),
            Err(e) => Err(keychain_error("delete", e)),
        }
    }
}

// ============================================================================
// Linux implementation using secret-service
// ============================================================================

#[cfg(target_os = "linux")]
mod platform {
    use secret_service::{EncryptionType, SecretService};

    use super::*;

    pub async fn get(service: &str, account: &str) -> AgentResult<Option<String>> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| keychain_error("connect", e))?;

        let items = ss
            .search_items(
                [("service", service), ("account", account)]
                    .into_iter()
                    .collect(),
            )
            .await
            .map_err(|e| keychain_error("search", e))?;

        let Some(item) = items.unlocked.first().or(items.locked.first()) else {
            return Ok(None);
        };

        if item.is_locked().await.unwrap_or(true) {
            item.unlock().await.map_err(|e| keychain_error("unlock", e))?;
        }

        let secret = item
            .get_secret()
            .await
            .map_err(|e| keychain_error("read", e))?;

        String::from_utf8(secret)
            .map(Some)
            .map_err(|_| AgentError::StorageCorrupted)
    }

    pub async fn set(service: &str, account: &str, value: &str) -> AgentResult<()> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| keychain_error("connect", e))?;

        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| keychain_error("collection lookup", e))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| keychain_error("unlock", e))?;
        }

        collection
            .create_item(
                &format!("{} {}", service, account),
                [("service", service), ("account", account)]
                    .into_iter()
                    .collect(),
                value.as_bytes(),
                true, // Replace if exists
                "text/plain",
            )
            .await
            .map_err(|e| keychain_error("write", e))?;

        Ok(())
    }

    pub async fn delete(service: &str, account: &str) -> AgentResult<()> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| keychain_error("connect", e))?;

        let items = ss
            .search_items(
                [("service", service), ("account", account)]
                    .into_iter()
                    .collect(),
            )
            .await
            .map_err(|e| keychain_error("search", e))?;

        for item in items.unlocked.iter().chain(items.locked.iter()) {
            item.delete()
                .await
                .map_err(|e| keychain_error("delete", e))?;
        }

        Ok(())
    }
}

// ============================================================================
// Fallback for unsupported platforms
// ============================================================================

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
mod platform {
    use super::*;

    fn unsupported() -> AgentError {
        AgentError::Other(
            "Keychain not supported on this platform. Run with --ephemeral.".to_string(),
        )
    }

    pub async fn get(_service: &str, _account: &str) -> AgentResult<Option<String>> {
        Err(unsupported())
    }

    pub async fn set(_service: &str, _account: &str, _value: &str) -> AgentResult<()> {
        Err(unsupported())
    }

    pub async fn delete(_service: &str, _account: &str) -> AgentResult<()> {
        Err(unsupported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name() {
        let store = KeychainStore::new("wakeline.test");
        assert_eq!(store.service(), "wakeline.test");
    }

    #[test]
    fn test_keychain_error_message() {
        let err = keychain_error("read", "locked");
        assert_eq!(
            err,
            AgentError::Other("Keychain read failed: locked".to_string())
        );
    }
}
