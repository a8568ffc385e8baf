//! Live agent assembly
//!
//! Wires the real collaborators together from [`AgentSettings`]. Credential
//! and memory stores are passed in so callers pick the secure tier
//! (keychain or in-memory).

use futures_util::FutureExt;
use std::sync::Arc;
use url::Url;

use crate::config::AgentSettings;
use crate::credentials::{CredentialProvider, CredentialStore, SecureKeyValueStore};
use crate::error::{AgentError, AgentResult};
use crate::memory::{EncryptedMemoryStore, LocalMemoryStore};
use crate::observability::Observer;
use crate::orchestrator::{AgentComponents, VoiceSessionOrchestrator};
use crate::provider::OpenAiProviderAdapter;
use crate::security::{DefaultSecurityPolicy, NetworkAllowlist, SecurityPolicy};
use crate::speech::{ApiKeyProvider, ElevenLabsSpeechAdapter};
use crate::wakeword::KeywordWakeWordEngine;

/// Orchestrator over the keyword engine, HTTP adapters and platform risk probe
pub fn build_live_agent(
    settings: &AgentSettings,
    credentials: Arc<dyn CredentialStore>,
    memory: Arc<dyn LocalMemoryStore>,
    observer: Arc<dyn Observer>,
) -> AgentResult<VoiceSessionOrchestrator> {
    build_agent_with_policy(
        settings,
        credentials,
        memory,
        observer,
        Arc::new(DefaultSecurityPolicy::default()),
    )
}

/// [`build_live_agent`] with a caller-chosen security policy
pub fn build_agent_with_policy(
    settings: &AgentSettings,
    credentials: Arc<dyn CredentialStore>,
    memory: Arc<dyn LocalMemoryStore>,
    observer: Arc<dyn Observer>,
    security: Arc<dyn SecurityPolicy>,
) -> AgentResult<VoiceSessionOrchestrator> {
    let allowlist = NetworkAllowlist::new(settings.allowed_hosts.iter());

    let llm = OpenAiProviderAdapter::new(
        parse_url("LLM endpoint", &settings.llm_endpoint)?,
        settings.llm_model.clone(),
        allowlist.clone(),
    );
    let speech = ElevenLabsSpeechAdapter::new(
        parse_url("speech root", &settings.speech_root)?,
        settings.speech_model.clone(),
        allowlist,
        stored_key(credentials.clone(), CredentialProvider::ElevenLabs),
    );

    tracing::debug!(
        llm_endpoint = %settings.llm_endpoint,
        speech_root = %settings.speech_root,
        observer = observer.name(),
        "assembling agent"
    );

    let components = AgentComponents {
        wake_word: Arc::new(KeywordWakeWordEngine::with_presets()),
        llm: Arc::new(llm),
        speech: Arc::new(speech),
        memory,
        security,
        credentials,
        observer,
    };
    Ok(VoiceSessionOrchestrator::new(
        components,
        settings.session.clone(),
    ))
}

/// Encrypted memory file under the data directory, keyed from `key_store`
pub fn open_memory_store(
    settings: &AgentSettings,
    key_store: Arc<dyn SecureKeyValueStore>,
) -> EncryptedMemoryStore {
    EncryptedMemoryStore::new(settings.memory_path(), key_store)
}

/// Key provider reading `provider`'s entry from the credential store
fn stored_key(credentials: Arc<dyn CredentialStore>, provider: CredentialProvider) -> ApiKeyProvider {
    Arc::new(move || {
        let credentials = credentials.clone();
        async move {
            credentials
                .get_key(provider)
                .await?
                .ok_or(AgentError::MissingCredential(provider))
        }
        .boxed()
    })
}

fn parse_url(what: &str, raw: &str) -> AgentResult<Url> {
    Url::parse(raw).map_err(|e| AgentError::Other(format!("Invalid {} '{}': {}", what, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{InMemoryKeyValueStore, SecureCredentialStore};
    use crate::memory::{InMemoryMemoryStore, MemoryQueryContext};
    use crate::observability::NoopObserver;
    use crate::orchestrator::AgentLifecycleState;
    use crate::security::{RuntimeRiskReport, StaticRiskProbe};
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OPENAI_KEY: &str = "sk-live-0123456789abcdefghij";
    const ELEVEN_KEY: &str = "el_0123456789abcdefghijkl";

    fn clean_policy() -> Arc<dyn SecurityPolicy> {
        Arc::new(DefaultSecurityPolicy::new(Arc::new(StaticRiskProbe::clean())))
    }

    fn settings_for(server: &MockServer) -> AgentSettings {
        AgentSettings {
            llm_endpoint: format!("{}/v1/responses", server.uri()),
            speech_root: server.uri(),
            allowed_hosts: vec!["127.0.0.1".to_string()],
            ..AgentSettings::default()
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        let settings = AgentSettings {
            llm_endpoint: "not a url".to_string(),
            ..AgentSettings::default()
        };
        let result = build_live_agent(
            &settings,
            Arc::new(SecureCredentialStore::in_memory()),
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(NoopObserver),
        );
        assert!(matches!(result, Err(AgentError::Other(_))));
    }

    #[tokio::test]
    async fn test_conversation_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("authorization", format!("Bearer {}", OPENAI_KEY).as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"output_text": "It is sunny."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Arc::new(SecureCredentialStore::in_memory());
        credentials
            .set_key(CredentialProvider::OpenAi, OPENAI_KEY)
            .await
            .unwrap();
        let memory = Arc::new(InMemoryMemoryStore::new());

        let agent = build_agent_with_policy(
            &settings_for(&server),
            credentials,
            memory.clone(),
            Arc::new(NoopObserver),
            clean_policy(),
        )
        .unwrap();

        agent.arm("jarvis-en").await.unwrap();
        agent.begin_conversation().await.unwrap();
        let reply = agent.send_text("weather?").await.unwrap();
        assert_eq!(reply.text, "It is sunny.");

        agent
            .end_conversation(Some("Asked about the weather"), &["weather".to_string()])
            .await
            .unwrap();
        assert_eq!(
            agent.current_state().await,
            AgentLifecycleState::ArmedForeground {
                model_id: "jarvis-en".to_string()
            }
        );
        let records = memory
            .query(&MemoryQueryContext::new(vec!["weather".to_string()], 1))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_speech_reads_stored_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/EXAVITQu4vr4xnSDxMaL/stream"))
            .and(header("xi-api-key", ELEVEN_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Arc::new(SecureCredentialStore::in_memory());
        let agent = build_agent_with_policy(
            &settings_for(&server),
            credentials.clone(),
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(NoopObserver),
            clean_policy(),
        )
        .unwrap();

        let missing: Vec<_> = agent.synthesize("hello").collect().await;
        assert_eq!(
            missing,
            vec![Err(AgentError::MissingCredential(CredentialProvider::ElevenLabs))]
        );

        credentials
            .set_key(CredentialProvider::ElevenLabs, ELEVEN_KEY)
            .await
            .unwrap();
        let audio: Vec<_> = agent.synthesize("hello").collect().await;
        assert_eq!(audio, vec![Ok(vec![1u8, 2, 3])]);
    }

    #[tokio::test]
    async fn test_risky_runtime_cannot_arm() {
        let report = RuntimeRiskReport {
            debugger_attached: false,
            tampered: true,
            reasons: vec!["Dynamic library injection detected".to_string()],
        };
        let agent = build_agent_with_policy(
            &AgentSettings::default(),
            Arc::new(SecureCredentialStore::in_memory()),
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(NoopObserver),
            Arc::new(DefaultSecurityPolicy::new(Arc::new(StaticRiskProbe::new(
                report,
            )))),
        )
        .unwrap();
        assert!(matches!(
            agent.arm("jarvis-en").await,
            Err(AgentError::RuntimeRiskDetected(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AgentSettings {
            data_dir: dir.path().to_path_buf(),
            ..AgentSettings::default()
        };
        let store = open_memory_store(&settings, Arc::new(InMemoryKeyValueStore::new()));
        assert_eq!(store.path(), dir.path().join("memory_store.bin"));

        store
            .save_summary(uuid::Uuid::new_v4(), "note", &[])
            .await
            .unwrap();
        assert!(settings.memory_path().exists());
    }
}
