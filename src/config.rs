//! Agent configuration
//!
//! [`VoiceSessionConfig`] drives the orchestrator. [`AgentSettings`] carries
//! everything needed to assemble a live agent: where data lives, which
//! endpoints to call, which hosts are allowed. Both serialize to JSON and
//! every field has a default, so a settings file only lists overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::{CredentialProvider, DEFAULT_CREDENTIAL_SERVICE};
use crate::error::{AgentError, AgentResult};
use crate::provider::{DEFAULT_FALLBACK_ENDPOINT, DEFAULT_FALLBACK_MODEL};
use crate::security::allowlist::DEFAULT_MODEL_HOSTS;
use crate::speech::{DEFAULT_SPEECH_MODEL, DEFAULT_SPEECH_ROOT, DEFAULT_VOICE_ID};

/// Realtime model requested when a conversation opens
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Keychain service holding the memory encryption key
pub const DEFAULT_MEMORY_KEY_SERVICE: &str = "wakeline.memory";

/// Memory file name under the data directory
pub const DEFAULT_MEMORY_FILE: &str = "memory_store.bin";

/// Delay before a backgrounded app is suspended
pub const DEFAULT_BACKGROUND_GRACE_MS: u64 = 2_000;

/// What happens to failures of wake-word triggered conversation starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeWordErrorPolicy {
    /// Trace at debug level only
    Suppress,
    /// Forward to the observer as an error event
    #[default]
    Report,
}

/// Orchestrator settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSessionConfig {
    /// Provider conversations connect to
    pub llm_provider: CredentialProvider,
    /// Realtime model id
    pub realtime_model: String,
    /// Voice used by `synthesize`
    pub voice_id: String,
    /// Start a conversation as soon as the armed model's wake word is heard
    pub auto_begin_conversation_on_wake_word: bool,
    /// Handling of failed wake-word triggered starts
    pub wake_word_error_policy: WakeWordErrorPolicy,
    /// Locale reported in connection metadata
    pub locale: String,
    /// Client tag reported in connection metadata
    pub client_tag: String,
}

impl Default for VoiceSessionConfig {
    fn default() -> Self {
        VoiceSessionConfig {
            llm_provider: CredentialProvider::OpenAi,
            realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            auto_begin_conversation_on_wake_word: true,
            wake_word_error_policy: WakeWordErrorPolicy::default(),
            locale: "en_US".to_string(),
            client_tag: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Assembly settings for a live agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Directory holding the memory file
    pub data_dir: PathBuf,
    /// Memory file name inside `data_dir`
    pub memory_file: String,
    /// Keychain service for provider API keys
    pub credential_service: String,
    /// Keychain service for the memory key
    pub memory_key_service: String,
    /// Single-turn LLM endpoint
    pub llm_endpoint: String,
    /// Single-turn LLM model
    pub llm_model: String,
    /// Speech synthesis API root
    pub speech_root: String,
    /// Speech synthesis model
    pub speech_model: String,
    /// Hosts outbound requests may reach
    pub allowed_hosts: Vec<String>,
    /// Grace period before a backgrounded session is suspended
    pub background_grace_ms: u64,
    /// Orchestrator settings
    pub session: VoiceSessionConfig,
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings {
            data_dir: default_data_dir(),
            memory_file: DEFAULT_MEMORY_FILE.to_string(),
            credential_service: DEFAULT_CREDENTIAL_SERVICE.to_string(),
            memory_key_service: DEFAULT_MEMORY_KEY_SERVICE.to_string(),
            llm_endpoint: DEFAULT_FALLBACK_ENDPOINT.to_string(),
            llm_model: DEFAULT_FALLBACK_MODEL.to_string(),
            speech_root: DEFAULT_SPEECH_ROOT.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            allowed_hosts: DEFAULT_MODEL_HOSTS.iter().map(|h| h.to_string()).collect(),
            background_grace_ms: DEFAULT_BACKGROUND_GRACE_MS,
            session: VoiceSessionConfig::default(),
        }
    }
}

impl AgentSettings {
    /// Full path of the memory file
    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join(&self.memory_file)
    }

    /// Background grace period
    pub fn background_grace(&self) -> Duration {
        Duration::from_millis(self.background_grace_ms)
    }

    /// Read settings from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> AgentResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Other(format!("Failed to read settings {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AgentError::Other(format!("Invalid settings {}: {}", path.display(), e))
        })
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> AgentResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AgentError::Other(format!("Failed to encode settings: {}", e)))?;
        std::fs::write(path, json).map_err(|e| {
            AgentError::Other(format!("Failed to write settings {}: {}", path.display(), e))
        })
    }
}

/// `<platform data dir>/wakeline`, or `./wakeline` when there is none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AgentSettings::default();
        assert_eq!(settings.memory_path(), settings.data_dir.join("memory_store.bin"));
        assert_eq!(settings.background_grace(), Duration::from_secs(2));
        assert_eq!(settings.allowed_hosts, vec!["api.openai.com", "api.elevenlabs.io"]);
        assert!(settings.data_dir.ends_with("wakeline"));

        let session = &settings.session;
        assert_eq!(session.llm_provider, CredentialProvider::OpenAi);
        assert_eq!(session.realtime_model, "gpt-4o-realtime-preview");
        assert!(session.auto_begin_conversation_on_wake_word);
        assert_eq!(session.wake_word_error_policy, WakeWordErrorPolicy::Report);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"llm_model": "gpt-4.1", "session": {"wake_word_error_policy": "suppress"}}"#,
        )
        .unwrap();

        let settings = AgentSettings::load(&path).unwrap();
        assert_eq!(settings.llm_model, "gpt-4.1");
        assert_eq!(settings.speech_model, DEFAULT_SPEECH_MODEL);
        assert_eq!(
            settings.session.wake_word_error_policy,
            WakeWordErrorPolicy::Suppress
        );
        assert_eq!(settings.session.voice_id, DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = AgentSettings::default();
        settings.background_grace_ms = 500;
        settings.save(&path).unwrap();
        assert_eq!(AgentSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(AgentSettings::load(&path), Err(AgentError::Other(_))));
        assert!(AgentSettings::load(&dir.path().join("missing.json")).is_err());
    }
}
