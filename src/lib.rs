//! # Wakeline
//!
//! Hands-free voice agent sessions: arm a wake word, open a conversation
//! with a remote model, suspend in the background, remember what was said.
//!
//! ## Features
//!
//! - **Lifecycle state machine** with totally ordered transitions
//! - **Wake-word matching** over finalized transcripts
//! - **Credential hygiene**: pasted keys are sanitized, secrets are redacted
//! - **Encrypted local memory** (ChaCha20-Poly1305, key in the OS keychain)
//! - **Transparent reconnect** when the provider drops a session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wakeline::{
//!     build_live_agent, AgentSettings, CredentialProvider, CredentialStore,
//!     InMemoryMemoryStore, LogObserver, SecureCredentialStore,
//! };
//!
//! # async fn demo() -> wakeline::AgentResult<()> {
//! let credentials = Arc::new(SecureCredentialStore::in_memory());
//! credentials.set_key(CredentialProvider::OpenAi, "sk-...").await?;
//!
//! let agent = build_live_agent(
//!     &AgentSettings::default(),
//!     credentials,
//!     Arc::new(InMemoryMemoryStore::new()),
//!     Arc::new(LogObserver),
//! )?;
//!
//! agent.arm("jarvis-en").await?;
//! agent.begin_conversation().await?;
//! let reply = agent.send_text("What's on my calendar?").await?;
//! println!("{}", reply.text);
//! agent.end_conversation(Some("Checked the calendar"), &[]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              APPLICATION LAYER              │
//! │   CLI  |  transcription  |  audio playback  │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               ORCHESTRATOR                  │
//! │  Lifecycle state | phase debounce | events  │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               COLLABORATORS                 │
//! │ Wake word | LLM | Speech | Memory | Security│
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │                 PLATFORM                    │
//! │   Keychain | filesystem | HTTPS allowlist   │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod config;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod provider;
pub mod security;
pub mod speech;
pub mod wakeword;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types at crate root
pub use agent::{build_agent_with_policy, build_live_agent, open_memory_store};
pub use config::{AgentSettings, VoiceSessionConfig, WakeWordErrorPolicy};
pub use credentials::{
    CredentialProvider, CredentialStore, InMemoryKeyValueStore, KeychainStore,
    SecureCredentialStore, SecureKeyValueStore,
};
pub use error::{AgentError, AgentResult};
pub use memory::{
    EncryptedMemoryStore, InMemoryMemoryStore, LocalMemoryStore, MemoryQueryContext, MemoryRecord,
};
pub use observability::{LogObserver, NoopObserver, Observer, ObserverEvent};
pub use orchestrator::{
    AgentComponents, AgentLifecycleState, LifecyclePhaseController, ScenePhase,
    VoiceSessionOrchestrator,
};
pub use provider::{LlmProviderAdapter, LlmResponse, RealtimeConnectionConfig};
pub use security::{DefaultSecurityPolicy, NetworkAllowlist, RuntimeRiskReport, SecurityPolicy};
pub use speech::{AudioStream, SpeechOutputAdapter};
pub use wakeword::{KeywordWakeWordEngine, WakeWordEngine, WakeWordModel};
