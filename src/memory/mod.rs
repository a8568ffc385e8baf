//! Local conversation memory
//!
//! Append-only session summaries with keyword recall. [`EncryptedMemoryStore`]
//! keeps them in one sealed file on disk; [`InMemoryMemoryStore`] keeps them
//! for the life of the process.

pub mod cipher;
pub mod encrypted;

pub use cipher::MemoryKey;
pub use encrypted::{EncryptedMemoryStore, MEMORY_KEY_ACCOUNT};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AgentResult;

/// Result limit when none is given
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// One remembered conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Record id
    pub id: Uuid,
    /// Conversation this summary belongs to
    pub session_id: Uuid,
    /// When the record was appended
    pub created_at: DateTime<Utc>,
    /// Free-text summary
    pub summary: String,
    /// Tags given when the conversation ended
    pub tags: Vec<String>,
}

impl MemoryRecord {
    /// New record stamped now
    pub fn new(session_id: Uuid, summary: impl Into<String>, tags: Vec<String>) -> Self {
        MemoryRecord {
            id: Uuid::new_v4(),
            session_id,
            created_at: Utc::now(),
            summary: summary.into(),
            tags,
        }
    }
}

/// Keyword filter plus result limit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryQueryContext {
    keywords: Vec<String>,
    limit: usize,
}

impl MemoryQueryContext {
    /// `limit` is clamped to at least 1; blank keywords are dropped
    pub fn new(keywords: Vec<String>, limit: usize) -> Self {
        MemoryQueryContext {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            limit: limit.max(1),
        }
    }

    /// Most recent records, no filter
    pub fn recent(limit: usize) -> Self {
        Self::new(Vec::new(), limit)
    }

    /// Lower-cased keywords
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Maximum number of records returned
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Any keyword occurs in the summary or equals a tag (case-insensitive)
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let summary = record.summary.to_lowercase();
        let tags: Vec<String> = record.tags.iter().map(|t| t.to_lowercase()).collect();
        self.keywords
            .iter()
            .any(|k| summary.contains(k.as_str()) || tags.contains(k))
    }

    /// Filter, newest first, truncate
    pub fn apply(&self, records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
        let mut matched: Vec<MemoryRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(self.limit);
        matched
    }
}

impl Default for MemoryQueryContext {
    fn default() -> Self {
        Self::recent(DEFAULT_QUERY_LIMIT)
    }
}

/// Persistent summary store
#[async_trait]
pub trait LocalMemoryStore: Send + Sync {
    /// Append a summary for a session
    async fn save_summary(&self, session_id: Uuid, summary: &str, tags: &[String])
        -> AgentResult<()>;

    /// Matching records, newest first
    async fn query(&self, context: &MemoryQueryContext) -> AgentResult<Vec<MemoryRecord>>;

    /// Forget every record
    async fn delete_all(&self) -> AgentResult<()>;
}

/// Process-local store with the same query semantics
#[derive(Default)]
pub struct InMemoryMemoryStore {
    records: Mutex<Vec<MemoryRecord>>,
}

impl InMemoryMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalMemoryStore for InMemoryMemoryStore {
    async fn save_summary(
        &self,
        session_id: Uuid,
        summary: &str,
        tags: &[String],
    ) -> AgentResult<()> {
        self.records
            .lock()
            .await
            .push(MemoryRecord::new(session_id, summary, tags.to_vec()));
        Ok(())
    }

    async fn query(&self, context: &MemoryQueryContext) -> AgentResult<Vec<MemoryRecord>> {
        let records = self.records.lock().await.clone();
        Ok(context.apply(records))
    }

    async fn delete_all(&self) -> AgentResult<()> {
        self.records.lock().await.clear();
        Ok(())
    }
}
