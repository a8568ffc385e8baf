//! Test doubles shared by module tests

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::VoiceSessionConfig;
use crate::credentials::{CredentialProvider, CredentialStore, SecureCredentialStore};
use crate::error::{AgentError, AgentResult};
use crate::memory::InMemoryMemoryStore;
use crate::observability::{Observer, ObserverEvent};
use crate::orchestrator::{AgentComponents, VoiceSessionOrchestrator};
use crate::provider::{LlmProviderAdapter, LlmResponse, RealtimeConnectionConfig};
use crate::security::{DefaultSecurityPolicy, RuntimeRiskReport, StaticRiskProbe};
use crate::speech::{AudioStream, SpeechOutputAdapter};
use crate::wakeword::{
    WakeWordDetectionEvent, WakeWordEngine, WakeWordModel, WakeWordSubscriber,
};

pub(crate) const OPENAI_KEY: &str = "sk-test-0123456789abcdefghij";

#[derive(Default)]
struct MockEngineState {
    active: Option<String>,
    running: bool,
    subscriber: Option<WakeWordSubscriber>,
}

/// Preset-catalog engine that counts starts and stops
#[derive(Default)]
pub(crate) struct MockWakeWordEngine {
    starts: AtomicUsize,
    stops: AtomicUsize,
    state: Mutex<MockEngineState>,
}

impl MockWakeWordEngine {
    pub(crate) fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub(crate) fn active_model(&self) -> Option<String> {
        self.state.lock().unwrap().active.clone()
    }

    pub(crate) fn has_subscriber(&self) -> bool {
        self.state.lock().unwrap().subscriber.is_some()
    }

    /// Fire the subscriber as if `model_id` matched, running or not
    pub(crate) fn emit(&self, model_id: &str) -> bool {
        let subscriber = self.state.lock().unwrap().subscriber.clone();
        match subscriber {
            Some(subscriber) => {
                subscriber(WakeWordDetectionEvent {
                    model_id: model_id.to_string(),
                    phrase: "test".to_string(),
                    detected_at: Utc::now(),
                });
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl WakeWordEngine for MockWakeWordEngine {
    async fn start(&self, model_id: &str) -> AgentResult<()> {
        if WakeWordModel::find(model_id).is_none() {
            return Err(AgentError::ModelNotFound(model_id.to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.active = Some(model_id.to_string());
        state.running = true;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.state.lock().unwrap().running = false;
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_detected(&self, subscriber: WakeWordSubscriber) -> Option<WakeWordSubscriber> {
        self.state.lock().unwrap().subscriber.replace(subscriber)
    }

    async fn clear_subscriber(&self) -> Option<WakeWordSubscriber> {
        self.state.lock().unwrap().subscriber.take()
    }

    async fn process_transcript(&self, transcript: &str) -> Option<WakeWordDetectionEvent> {
        let (event, subscriber) = {
            let state = self.state.lock().unwrap();
            if !state.running {
                return None;
            }
            let model = WakeWordModel::find(state.active.as_deref()?)?;
            let event = WakeWordDetectionEvent {
                model_id: model.id.clone(),
                phrase: model.first_match(transcript)?.to_string(),
                detected_at: Utc::now(),
            };
            (event, state.subscriber.clone())
        };
        if let Some(subscriber) = subscriber {
            subscriber(event.clone());
        }
        Some(event)
    }
}

/// Adapter that echoes input and can drop its connection on demand
#[derive(Default)]
pub(crate) struct MockLlmAdapter {
    connects: AtomicUsize,
    connected: Mutex<Option<RealtimeConnectionConfig>>,
    last_config: Mutex<Option<RealtimeConnectionConfig>>,
    sent: Mutex<Vec<String>>,
}

impl MockLlmAdapter {
    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.lock().unwrap().is_some()
    }

    pub(crate) fn last_config(&self) -> Option<RealtimeConnectionConfig> {
        self.last_config.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Server-side drop the orchestrator has not seen yet
    pub(crate) fn simulate_drop(&self) {
        self.connected.lock().unwrap().take();
    }
}

#[async_trait]
impl LlmProviderAdapter for MockLlmAdapter {
    async fn connect_realtime(&self, config: RealtimeConnectionConfig) -> AgentResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(config.clone());
        *self.connected.lock().unwrap() = Some(config);
        Ok(())
    }

    async fn send_text(&self, input: &str) -> AgentResult<LlmResponse> {
        if !self.is_connected() {
            return Err(AgentError::ProviderNotConnected);
        }
        self.sent.lock().unwrap().push(input.to_string());
        Ok(LlmResponse {
            text: format!("echo: {}", input),
            latency_ms: 5,
        })
    }

    async fn close(&self) {
        self.connected.lock().unwrap().take();
    }
}

/// Speech adapter returning one fixed chunk
#[derive(Default)]
pub(crate) struct MockSpeechAdapter {
    calls: Mutex<Vec<(String, String)>>,
}

impl MockSpeechAdapter {
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SpeechOutputAdapter for MockSpeechAdapter {
    fn synthesize(&self, text: &str, voice_id: &str) -> AudioStream {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        stream::iter(vec![Ok(b"audio".to_vec())]).boxed()
    }
}

/// Observer keeping every event
#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Messages of recorded `Error` events
    pub(crate) fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObserverEvent::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn record_event(&self, event: &ObserverEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Orchestrator wired to doubles, with an OpenAI key already stored
pub(crate) struct Harness {
    pub orchestrator: VoiceSessionOrchestrator,
    pub wake: Arc<MockWakeWordEngine>,
    pub llm: Arc<MockLlmAdapter>,
    pub speech: Arc<MockSpeechAdapter>,
    pub memory: Arc<InMemoryMemoryStore>,
    pub credentials: Arc<SecureCredentialStore>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with(VoiceSessionConfig::default(), RuntimeRiskReport::clean()).await
    }

    pub(crate) async fn with(config: VoiceSessionConfig, risk: RuntimeRiskReport) -> Self {
        let wake = Arc::new(MockWakeWordEngine::default());
        let llm = Arc::new(MockLlmAdapter::default());
        let speech = Arc::new(MockSpeechAdapter::default());
        let memory = Arc::new(InMemoryMemoryStore::new());
        let credentials = Arc::new(SecureCredentialStore::in_memory());
        let observer = Arc::new(RecordingObserver::default());

        credentials
            .set_key(CredentialProvider::OpenAi, OPENAI_KEY)
            .await
            .unwrap();

        let components = AgentComponents {
            wake_word: wake.clone(),
            llm: llm.clone(),
            speech: speech.clone(),
            memory: memory.clone(),
            security: Arc::new(DefaultSecurityPolicy::new(Arc::new(StaticRiskProbe::new(
                risk,
            )))),
            credentials: credentials.clone(),
            observer: observer.clone(),
        };

        Harness {
            orchestrator: VoiceSessionOrchestrator::new(components, config),
            wake,
            llm,
            speech,
            memory,
            credentials,
            observer,
        }
    }
}

/// Poll `check` for up to a second
pub(crate) async fn wait_until<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
