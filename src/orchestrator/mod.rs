//! Voice session lifecycle
//!
//! [`VoiceSessionOrchestrator`] owns the [`AgentLifecycleState`] and drives
//! every collaborator from it:
//!
//! ```text
//!              arm(m)                 begin_conversation()
//!  Disarmed ───────────▶ Armed(m) ───────────────────────▶ Conversing(s)
//!     ▲                    ▲   │                                │
//!     │ disarm()           │   └──── end_conversation() ◀───────┘
//!     │                    │ transition_to_foreground()
//!     │                    │
//!     └──────────── BackgroundSuspended(m?) ◀── transition_to_background()
//! ```
//!
//! One async mutex guards the session state and is held for the whole of
//! each transition, so transitions never interleave. Collaborators do their
//! own locking; the wake-word engine calls back through a weak handle and
//! the conversation start runs on a spawned task.

mod phase;
mod state;

pub use phase::{LifecyclePhaseController, ScenePhase};
pub use state::AgentLifecycleState;

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{VoiceSessionConfig, WakeWordErrorPolicy};
use crate::credentials::CredentialStore;
use crate::error::{AgentError, AgentResult};
use crate::memory::LocalMemoryStore;
use crate::observability::{Observer, ObserverEvent};
use crate::provider::{LlmProviderAdapter, LlmResponse, RealtimeConnectionConfig};
use crate::security::{self, sanitizer, SecurityPolicy};
use crate::speech::{AudioStream, SpeechOutputAdapter};
use crate::wakeword::{WakeWordDetectionEvent, WakeWordEngine, WakeWordSubscriber};

/// Collaborators the orchestrator drives
#[derive(Clone)]
pub struct AgentComponents {
    /// Wake-word engine
    pub wake_word: Arc<dyn WakeWordEngine>,
    /// LLM provider adapter
    pub llm: Arc<dyn LlmProviderAdapter>,
    /// Speech output adapter
    pub speech: Arc<dyn SpeechOutputAdapter>,
    /// Conversation summary store
    pub memory: Arc<dyn LocalMemoryStore>,
    /// Key validation, redaction and risk probing
    pub security: Arc<dyn SecurityPolicy>,
    /// Provider API keys
    pub credentials: Arc<dyn CredentialStore>,
    /// Event sink
    pub observer: Arc<dyn Observer>,
}

struct SessionState {
    state: AgentLifecycleState,
    /// Last armed model; survives a conversation so it can be re-armed
    armed_model_id: Option<String>,
    active_session_id: Option<Uuid>,
}

struct Shared {
    components: AgentComponents,
    config: VoiceSessionConfig,
    session: Mutex<SessionState>,
}

/// Cloneable handle to one agent session
#[derive(Clone)]
pub struct VoiceSessionOrchestrator {
    shared: Arc<Shared>,
}

impl VoiceSessionOrchestrator {
    /// Orchestrator starting out `Disarmed`
    pub fn new(components: AgentComponents, config: VoiceSessionConfig) -> Self {
        VoiceSessionOrchestrator {
            shared: Arc::new(Shared {
                components,
                config,
                session: Mutex::new(SessionState {
                    state: AgentLifecycleState::Disarmed,
                    armed_model_id: None,
                    active_session_id: None,
                }),
            }),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &VoiceSessionConfig {
        &self.shared.config
    }

    /// Snapshot of the lifecycle state
    pub async fn current_state(&self) -> AgentLifecycleState {
        self.shared.session.lock().await.state.clone()
    }

    /// Start listening for `model_id`'s wake phrases
    ///
    /// Valid from `Disarmed` and `BackgroundSuspended`. Fails with
    /// [`AgentError::RuntimeRiskDetected`] when the risk probe asks for
    /// degraded capabilities.
    pub async fn arm(&self, model_id: &str) -> AgentResult<()> {
        let mut session = self.shared.session.lock().await;
        self.arm_locked(&mut session, model_id).await
    }

    /// Stop listening and close any conversation; valid from every state
    pub async fn disarm(&self) {
        let mut session = self.shared.session.lock().await;
        let components = &self.shared.components;

        components.wake_word.stop().await;
        components.wake_word.clear_subscriber().await;
        components.llm.close().await;

        session.armed_model_id = None;
        session.active_session_id = None;
        self.set_state(&mut session, AgentLifecycleState::Disarmed);
    }

    /// Open a provider connection for a fresh session id
    pub async fn begin_conversation(&self) -> AgentResult<Uuid> {
        let mut session = self.shared.session.lock().await;
        self.begin_locked(&mut session).await
    }

    /// Close the conversation, saving `summary` to memory when non-blank
    ///
    /// Returns to the armed model, or `Disarmed` when nothing was armed.
    pub async fn end_conversation(&self, summary: Option<&str>, tags: &[String]) -> AgentResult<()> {
        let mut session = self.shared.session.lock().await;
        let components = &self.shared.components;

        let session_id = match session.state.session_id() {
            Some(id) => id,
            None => {
                return Err(AgentError::invalid_transition(
                    &session.state,
                    "end_conversation",
                ))
            }
        };

        components.llm.close().await;
        session.active_session_id = None;
        let next = match session.armed_model_id.clone() {
            Some(model_id) => AgentLifecycleState::ArmedForeground { model_id },
            None => AgentLifecycleState::Disarmed,
        };
        self.set_state(&mut session, next);

        let saved = match summary.map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => components
                .memory
                .save_summary(session_id, text, tags)
                .await
                .map(|()| true),
            None => Ok(false),
        };

        components.observer.record_event(&ObserverEvent::ConversationEnded {
            session_id,
            summary_saved: matches!(saved, Ok(true)),
        });
        saved.map(|_| ())
    }

    /// Suspend: stop listening and drop any conversation
    pub async fn transition_to_background(&self) -> AgentResult<()> {
        let mut session = self.shared.session.lock().await;
        let components = &self.shared.components;

        let previous_model_id = match session.state.clone() {
            AgentLifecycleState::ArmedForeground { model_id } => {
                components.wake_word.stop().await;
                Some(model_id)
            }
            AgentLifecycleState::Conversing { .. } => {
                components.llm.close().await;
                components.wake_word.stop().await;
                session.active_session_id = None;
                session.armed_model_id.clone()
            }
            AgentLifecycleState::Disarmed => None,
            suspended @ AgentLifecycleState::BackgroundSuspended { .. } => {
                return Err(AgentError::invalid_transition(
                    &suspended,
                    "transition_to_background",
                ))
            }
        };

        self.set_state(
            &mut session,
            AgentLifecycleState::BackgroundSuspended { previous_model_id },
        );
        Ok(())
    }

    /// Resume: re-arm the suspended model, or settle in `Disarmed`
    pub async fn transition_to_foreground(&self) -> AgentResult<()> {
        let mut session = self.shared.session.lock().await;

        match session.state.clone() {
            AgentLifecycleState::BackgroundSuspended {
                previous_model_id: Some(model_id),
            } => self.arm_locked(&mut session, &model_id).await,
            AgentLifecycleState::BackgroundSuspended {
                previous_model_id: None,
            } => {
                session.armed_model_id = None;
                self.set_state(&mut session, AgentLifecycleState::Disarmed);
                Ok(())
            }
            other => Err(AgentError::invalid_transition(
                &other,
                "transition_to_foreground",
            )),
        }
    }

    /// Send one turn; reconnects once if the provider dropped the connection
    pub async fn send_text(&self, text: &str) -> AgentResult<LlmResponse> {
        let session_id = {
            let session = self.shared.session.lock().await;
            session
                .state
                .session_id()
                .ok_or_else(|| AgentError::invalid_transition(&session.state, "send_text"))?
        };
        let llm = &self.shared.components.llm;

        tracing::debug!(
            %session_id,
            input = %security::fingerprint(text),
            input_len = text.len(),
            "sending text"
        );

        let response = match llm.send_text(text).await {
            Err(AgentError::ProviderNotConnected) => {
                self.reconnect(session_id).await?;
                llm.send_text(text).await?
            }
            other => other?,
        };

        self.shared
            .components
            .observer
            .record_event(&ObserverEvent::LlmResponse {
                latency_ms: response.latency_ms,
            });
        Ok(response)
    }

    /// Speak `text` with the configured voice
    pub fn synthesize(&self, text: &str) -> AudioStream {
        tracing::debug!(
            text = %security::fingerprint(text),
            voice_id = %self.shared.config.voice_id,
            "synthesizing"
        );
        self.shared
            .components
            .speech
            .synthesize(text, &self.shared.config.voice_id)
    }

    /// Feed a finalized transcript to the wake-word engine
    pub async fn ingest_transcript(&self, text: &str) -> Option<WakeWordDetectionEvent> {
        self.shared.components.wake_word.process_transcript(text).await
    }

    async fn arm_locked(&self, session: &mut SessionState, model_id: &str) -> AgentResult<()> {
        match session.state {
            AgentLifecycleState::Disarmed | AgentLifecycleState::BackgroundSuspended { .. } => {}
            _ => return Err(AgentError::invalid_transition(&session.state, "arm")),
        }
        let components = &self.shared.components;

        let report = components.security.runtime_risk_check();
        if report.should_degrade_capabilities() {
            return Err(AgentError::RuntimeRiskDetected(report.reasons));
        }

        components
            .wake_word
            .on_detected(wake_word_subscriber(Arc::downgrade(&self.shared)))
            .await;
        if let Err(err) = components.wake_word.start(model_id).await {
            components.wake_word.clear_subscriber().await;
            return Err(err);
        }

        session.armed_model_id = Some(model_id.to_string());
        self.set_state(
            session,
            AgentLifecycleState::ArmedForeground {
                model_id: model_id.to_string(),
            },
        );
        Ok(())
    }

    async fn begin_locked(&self, session: &mut SessionState) -> AgentResult<Uuid> {
        if session.state.armed_model_id().is_none() {
            return Err(AgentError::invalid_transition(
                &session.state,
                "begin_conversation",
            ));
        }

        let session_id = Uuid::new_v4();
        let config = self.connection_config(session_id).await?;
        self.shared.components.llm.connect_realtime(config).await?;

        session.active_session_id = Some(session_id);
        self.set_state(session, AgentLifecycleState::Conversing { session_id });
        self.shared
            .components
            .observer
            .record_event(&ObserverEvent::ConversationStarted { session_id });
        Ok(session_id)
    }

    async fn reconnect(&self, session_id: Uuid) -> AgentResult<()> {
        let session = self.shared.session.lock().await;
        // The conversation may have ended while the turn was in flight
        if session.active_session_id != Some(session_id) {
            return Err(AgentError::invalid_transition(&session.state, "send_text"));
        }

        let config = self.connection_config(session_id).await?;
        self.shared.components.llm.connect_realtime(config).await?;

        tracing::info!(%session_id, "provider reconnected");
        self.shared
            .components
            .observer
            .record_event(&ObserverEvent::ProviderReconnected { session_id });
        Ok(())
    }

    async fn connection_config(&self, session_id: Uuid) -> AgentResult<RealtimeConnectionConfig> {
        let config = &self.shared.config;
        let components = &self.shared.components;
        let provider = config.llm_provider;

        let stored = components
            .credentials
            .get_key(provider)
            .await?
            .ok_or(AgentError::MissingCredential(provider))?;
        let api_key = sanitizer::normalize(&stored, provider);
        if !components.security.validate_api_key_format(provider, &api_key) {
            return Err(AgentError::InvalidCredentialFormat(provider));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("locale".to_string(), config.locale.clone());
        metadata.insert("client".to_string(), config.client_tag.clone());

        Ok(RealtimeConnectionConfig {
            provider,
            model: config.realtime_model.clone(),
            api_key,
            session_id,
            metadata,
        })
    }

    fn set_state(&self, session: &mut SessionState, next: AgentLifecycleState) {
        if session.state == next {
            return;
        }
        let from = std::mem::replace(&mut session.state, next.clone());
        tracing::info!(from = %from, to = %next, "agent state changed");
        self.shared
            .components
            .observer
            .record_event(&ObserverEvent::StateChanged { from, to: next });
    }

    async fn handle_wake_word(&self, event: WakeWordDetectionEvent) {
        let components = &self.shared.components;
        components.observer.record_event(&ObserverEvent::WakeWordDetected {
            model_id: event.model_id.clone(),
            phrase: event.phrase.clone(),
        });

        if !self.shared.config.auto_begin_conversation_on_wake_word {
            return;
        }

        let mut session = self.shared.session.lock().await;
        if session.state.armed_model_id() != Some(event.model_id.as_str()) {
            tracing::debug!(
                model_id = %event.model_id,
                state = %session.state,
                "wake word ignored"
            );
            return;
        }

        let started = self.begin_locked(&mut session).await;
        drop(session);
        if let Err(err) = started {
            self.report_wake_word_failure(&err);
        }
    }

    fn report_wake_word_failure(&self, err: &AgentError) {
        let components = &self.shared.components;
        let message = components.security.redact_logs(&err.to_string());

        match self.shared.config.wake_word_error_policy {
            WakeWordErrorPolicy::Report => {
                tracing::warn!(error = %message, "wake-word conversation start failed");
                components.observer.record_event(&ObserverEvent::Error {
                    component: "wake_word".to_string(),
                    message,
                });
            }
            WakeWordErrorPolicy::Suppress => {
                tracing::debug!(error = %message, "wake-word conversation start failed");
            }
        }
    }
}

/// Detection callback that starts a conversation on its own task
fn wake_word_subscriber(shared: Weak<Shared>) -> WakeWordSubscriber {
    Arc::new(move |event: WakeWordDetectionEvent| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let orchestrator = VoiceSessionOrchestrator { shared };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { orchestrator.handle_wake_word(event).await });
            }
            Err(_) => {
                tracing::warn!(model_id = %event.model_id, "wake word detected outside a runtime");
            }
        }
    })
}
