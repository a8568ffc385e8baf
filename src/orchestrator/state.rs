//! Lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where an agent session is in its lifecycle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentLifecycleState {
    /// Not listening
    #[default]
    Disarmed,

    /// Listening for `model_id`'s wake phrases
    ArmedForeground {
        /// Armed wake-word model
        model_id: String,
    },

    /// A provider connection is open
    Conversing {
        /// Active session
        session_id: Uuid,
    },

    /// The app went to the background
    BackgroundSuspended {
        /// Model to re-arm when returning to the foreground
        previous_model_id: Option<String>,
    },
}

impl AgentLifecycleState {
    /// Model id while armed
    pub fn armed_model_id(&self) -> Option<&str> {
        match self {
            AgentLifecycleState::ArmedForeground { model_id } => Some(model_id),
            _ => None,
        }
    }

    /// Session id while conversing
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            AgentLifecycleState::Conversing { session_id } => Some(*session_id),
            _ => None,
        }
    }

    /// Whether this is a suspended state
    pub fn is_suspended(&self) -> bool {
        matches!(self, AgentLifecycleState::BackgroundSuspended { .. })
    }
}

impl fmt::Display for AgentLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentLifecycleState::Disarmed => write!(f, "disarmed"),
            AgentLifecycleState::ArmedForeground { model_id } => write!(f, "armed ({})", model_id),
            AgentLifecycleState::Conversing { session_id } => {
                write!(f, "conversing ({})", session_id)
            }
            AgentLifecycleState::BackgroundSuspended {
                previous_model_id: Some(model_id),
            } => write!(f, "suspended in background ({})", model_id),
            AgentLifecycleState::BackgroundSuspended {
                previous_model_id: None,
            } => write!(f, "suspended in background"),
        }
    }
}
