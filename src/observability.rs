//! Lifecycle event reporting
//!
//! The orchestrator reports what it does through an injected [`Observer`].
//! [`LogObserver`] forwards to `tracing`; [`NoopObserver`] drops everything.

use uuid::Uuid;

use crate::orchestrator::AgentLifecycleState;

/// Sink for orchestrator events
pub trait Observer: Send + Sync {
    /// Record one event
    fn record_event(&self, event: &ObserverEvent);

    /// Backend name
    fn name(&self) -> &str;
}

/// Things worth reporting about an agent session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObserverEvent {
    /// The lifecycle state changed
    StateChanged {
        /// Previous state
        from: AgentLifecycleState,
        /// New state
        to: AgentLifecycleState,
    },

    /// The wake-word engine reported a match
    WakeWordDetected {
        /// Model that matched
        model_id: String,
        /// Phrase that matched
        phrase: String,
    },

    /// A provider connection was opened for a new conversation
    ConversationStarted {
        /// New session
        session_id: Uuid,
    },

    /// A conversation was closed
    ConversationEnded {
        /// Session that ended
        session_id: Uuid,
        /// Whether a summary was written to memory
        summary_saved: bool,
    },

    /// A dropped provider connection was transparently re-opened
    ProviderReconnected {
        /// Session the connection belongs to
        session_id: Uuid,
    },

    /// A model turn completed
    LlmResponse {
        /// Round-trip time
        latency_ms: u64,
    },

    /// A component failed outside a caller's request
    Error {
        /// Failing component
        component: String,
        /// Redacted error text
        message: String,
    },
}

/// Discards every event
pub struct NoopObserver;

impl Observer for NoopObserver {
    #[inline(always)]
    fn record_event(&self, _event: &ObserverEvent) {}

    fn name(&self) -> &str {
        "noop"
    }
}

/// Emits every event as a `tracing` record
pub struct LogObserver;

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "observer: state.changed");
            }
            ObserverEvent::WakeWordDetected { model_id, phrase } => {
                tracing::info!(model_id, phrase, "observer: wake_word.detected");
            }
            ObserverEvent::ConversationStarted { session_id } => {
                tracing::info!(%session_id, "observer: conversation.start");
            }
            ObserverEvent::ConversationEnded {
                session_id,
                summary_saved,
            } => {
                tracing::info!(%session_id, summary_saved, "observer: conversation.end");
            }
            ObserverEvent::ProviderReconnected { session_id } => {
                tracing::info!(%session_id, "observer: provider.reconnected");
            }
            ObserverEvent::LlmResponse { latency_ms } => {
                tracing::debug!(latency_ms, "observer: llm.response");
            }
            ObserverEvent::Error { component, message } => {
                tracing::warn!(component, error = message.as_str(), "observer: error");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(NoopObserver.name(), "noop");
        assert_eq!(LogObserver.name(), "log");
    }

    #[test]
    fn test_record_every_event() {
        let events = vec![
            ObserverEvent::StateChanged {
                from: AgentLifecycleState::Disarmed,
                to: AgentLifecycleState::ArmedForeground {
                    model_id: "jarvis-en".to_string(),
                },
            },
            ObserverEvent::WakeWordDetected {
                model_id: "jarvis-en".to_string(),
                phrase: "hey jarvis".to_string(),
            },
            ObserverEvent::ConversationStarted {
                session_id: Uuid::new_v4(),
            },
            ObserverEvent::ConversationEnded {
                session_id: Uuid::new_v4(),
                summary_saved: true,
            },
            ObserverEvent::ProviderReconnected {
                session_id: Uuid::new_v4(),
            },
            ObserverEvent::LlmResponse { latency_ms: 420 },
            ObserverEvent::Error {
                component: "wake_word".to_string(),
                message: "Missing credential for openai".to_string(),
            },
        ];
        for event in &events {
            NoopObserver.record_event(event);
            LogObserver.record_event(event);
        }
    }
}
