//! File-backed encrypted memory store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::cipher::MemoryKey;
use super::{LocalMemoryStore, MemoryQueryContext, MemoryRecord};
use crate::credentials::SecureKeyValueStore;
use crate::error::{AgentError, AgentResult};

/// Secure-tier account holding the 32-byte memory key
pub const MEMORY_KEY_ACCOUNT: &str = "memory-encryption-key";

/// Summaries sealed in one file, key kept in a secure tier
///
/// Every operation runs under one lock: load, modify, and atomic replace of
/// the whole file happen without interleaving. The key is loaded (or
/// generated) on first use and cached until the store is dropped.
pub struct EncryptedMemoryStore {
    path: PathBuf,
    key_store: Arc<dyn SecureKeyValueStore>,
    key: Mutex<Option<MemoryKey>>,
}

impl EncryptedMemoryStore {
    /// Store records at `path`, keyed by [`MEMORY_KEY_ACCOUNT`] in `key_store`
    pub fn new(path: impl Into<PathBuf>, key_store: Arc<dyn SecureKeyValueStore>) -> Self {
        EncryptedMemoryStore {
            path: path.into(),
            key_store,
            key: Mutex::new(None),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_or_create_key(&self, cached: &mut Option<MemoryKey>) -> AgentResult<MemoryKey> {
        if let Some(key) = cached {
            return Ok(key.clone());
        }

        let key = match self.key_store.get(MEMORY_KEY_ACCOUNT).await? {
            Some(bytes) => match MemoryKey::from_slice(&bytes) {
                Some(key) => key,
                None => self.store_new_key().await?,
            },
            None => self.store_new_key().await?,
        };

        *cached = Some(key.clone());
        Ok(key)
    }

    async fn store_new_key(&self) -> AgentResult<MemoryKey> {
        let key = MemoryKey::generate();
        self.key_store.set(MEMORY_KEY_ACCOUNT, key.as_bytes()).await?;
        tracing::info!("generated memory encryption key");
        Ok(key)
    }

    async fn load_records(&self, key: &MemoryKey) -> AgentResult<Vec<MemoryRecord>> {
        let sealed = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read", e)),
        };
        if sealed.is_empty() {
            return Ok(Vec::new());
        }

        let plaintext = key.open(&sealed)?;
        serde_json::from_slice(&plaintext).map_err(|_| AgentError::StorageCorrupted)
    }

    async fn persist(&self, key: &MemoryKey, records: &[MemoryRecord]) -> AgentResult<()> {
        let payload = serde_json::to_vec(records)
            .map_err(|e| AgentError::Other(format!("Memory encoding failed: {}", e)))?;
        let sealed = key.seal(&payload)?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error("create directory", e))?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &sealed)
            .await
            .map_err(|e| io_error("write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace", e))
    }
}

fn io_error(context: &str, err: std::io::Error) -> AgentError {
    AgentError::Other(format!("Memory store {} failed: {}", context, err))
}

#[async_trait]
impl LocalMemoryStore for EncryptedMemoryStore {
    async fn save_summary(
        &self,
        session_id: Uuid,
        summary: &str,
        tags: &[String],
    ) -> AgentResult<()> {
        let mut cached = self.key.lock().await;
        let key = self.load_or_create_key(&mut cached).await?;

        let mut records = self.load_records(&key).await?;
        records.push(MemoryRecord::new(session_id, summary, tags.to_vec()));
        self.persist(&key, &records).await?;

        tracing::debug!(%session_id, total = records.len(), "saved memory record");
        Ok(())
    }

    async fn query(&self, context: &MemoryQueryContext) -> AgentResult<Vec<MemoryRecord>> {
        let mut cached = self.key.lock().await;
        let key = self.load_or_create_key(&mut cached).await?;
        let records = self.load_records(&key).await?;
        Ok(context.apply(records))
    }

    async fn delete_all(&self) -> AgentResult<()> {
        let _guard = self.key.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "purged memory store");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", e)),
        }
    }
}
