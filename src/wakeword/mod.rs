//! Wake-word engine
//!
//! Matches already-transcribed text against the active model's trigger
//! phrases. There is no acoustic model here: the transcription source feeds
//! finalized text in through [`WakeWordEngine::process_transcript`].
//!
//! At most one subscriber is registered at a time. Registering a new one
//! hands back the one it replaced.

pub mod model;

pub use model::{strip_wake_phrases, WakeWordModel};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AgentError, AgentResult};

/// A trigger phrase was heard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WakeWordDetectionEvent {
    /// Model that matched
    pub model_id: String,
    /// Catalog phrase that matched
    pub phrase: String,
    /// When the match happened
    pub detected_at: DateTime<Utc>,
}

/// Detection callback
pub type WakeWordSubscriber = Arc<dyn Fn(WakeWordDetectionEvent) + Send + Sync>;

/// Phrase-matching wake-word engine
#[async_trait]
pub trait WakeWordEngine: Send + Sync {
    /// Activate `model_id` and start matching
    async fn start(&self, model_id: &str) -> AgentResult<()>;

    /// Stop matching; idempotent
    async fn stop(&self);

    /// Register the detection subscriber, returning the one it replaces
    async fn on_detected(&self, subscriber: WakeWordSubscriber) -> Option<WakeWordSubscriber>;

    /// Remove the detection subscriber
    async fn clear_subscriber(&self) -> Option<WakeWordSubscriber>;

    /// Match a finalized transcript; no-op unless running
    ///
    /// On a hit the subscriber is invoked once and the event is returned.
    async fn process_transcript(&self, transcript: &str) -> Option<WakeWordDetectionEvent>;
}

#[derive(Default)]
struct EngineState {
    active: Option<WakeWordModel>,
    running: bool,
    subscriber: Option<WakeWordSubscriber>,
}

/// Case-insensitive substring matcher over a fixed model catalog
pub struct KeywordWakeWordEngine {
    models: HashMap<String, WakeWordModel>,
    state: Mutex<EngineState>,
}

impl KeywordWakeWordEngine {
    /// Engine over `models`
    pub fn new(models: Vec<WakeWordModel>) -> Self {
        KeywordWakeWordEngine {
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Engine over the preset catalog
    pub fn with_presets() -> Self {
        Self::new(WakeWordModel::presets())
    }

    /// Catalog entry for `model_id`
    pub fn model(&self, model_id: &str) -> Option<&WakeWordModel> {
        self.models.get(model_id)
    }

    /// Whether the engine is currently matching
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }
}

impl Default for KeywordWakeWordEngine {
    fn default() -> Self {
        Self::with_presets()
    }
}

#[async_trait]
impl WakeWordEngine for KeywordWakeWordEngine {
    async fn start(&self, model_id: &str) -> AgentResult<()> {
        let model = self
            .models
            .get(model_id)
            .cloned()
            .ok_or_else(|| AgentError::ModelNotFound(model_id.to_string()))?;

        let mut state = self.state.lock().await;
        state.active = Some(model);
        state.running = true;
        tracing::debug!(model_id, "wake-word engine started");
        Ok(())
    }

    async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.running {
            tracing::debug!("wake-word engine stopped");
        }
        state.running = false;
    }

    async fn on_detected(&self, subscriber: WakeWordSubscriber) -> Option<WakeWordSubscriber> {
        self.state.lock().await.subscriber.replace(subscriber)
    }

    async fn clear_subscriber(&self) -> Option<WakeWordSubscriber> {
        self.state.lock().await.subscriber.take()
    }

    async fn process_transcript(&self, transcript: &str) -> Option<WakeWordDetectionEvent> {
        let (event, subscriber) = {
            let state = self.state.lock().await;
            if !state.running {
                return None;
            }
            let model = state.active.as_ref()?;
            let phrase = model.first_match(transcript)?;
            let event = WakeWordDetectionEvent {
                model_id: model.id.clone(),
                phrase: phrase.to_string(),
                detected_at: Utc::now(),
            };
            (event, state.subscriber.clone())
        };

        tracing::info!(model_id = %event.model_id, phrase = %event.phrase, "wake word detected");
        // Engine lock is released; the subscriber may call back into the engine
        if let Some(subscriber) = subscriber {
            subscriber(event.clone());
        }
        Some(event)
    }
}
