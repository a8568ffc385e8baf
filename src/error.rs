//! Agent error types

use thiserror::Error;

use crate::credentials::CredentialProvider;
use crate::orchestrator::AgentLifecycleState;

/// HTTP status the providers use for a rejected credential
const HTTP_UNAUTHORIZED: u16 = 401;

/// Errors surfaced by every component of the agent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// An operation was invoked outside the states it is defined for
    #[error("Invalid state transition: cannot {action} while {from}")]
    InvalidStateTransition {
        /// State the orchestrator was in
        from: AgentLifecycleState,
        /// Name of the attempted operation
        action: String,
    },

    /// No credential is stored for the provider
    #[error("Missing credential for {0}")]
    MissingCredential(CredentialProvider),

    /// The stored credential does not have the provider's key shape
    #[error("Invalid credential format for {0}")]
    InvalidCredentialFormat(CredentialProvider),

    /// The runtime risk probe flagged a degraded-trust environment
    #[error("Runtime risk detected: {}", .0.join(", "))]
    RuntimeRiskDetected(Vec<String>),

    /// The wake-word catalog has no model with this id
    #[error("Wake-word model not found: {0}")]
    ModelNotFound(String),

    /// The provider has no active connection
    #[error("Provider not connected")]
    ProviderNotConnected,

    /// Persisted data could not be decrypted or decoded
    #[error("Storage corrupted")]
    StorageCorrupted,

    /// The provider answered with a body of unknown shape
    #[error("Unsupported response")]
    UnsupportedResponse,

    /// The provider answered with a non-success HTTP status
    #[error("Network failure: HTTP {0}")]
    NetworkFailure(u16),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Build an `InvalidStateTransition` for `action` attempted in `from`
    pub fn invalid_transition(from: &AgentLifecycleState, action: &str) -> Self {
        AgentError::InvalidStateTransition {
            from: from.clone(),
            action: action.to_string(),
        }
    }

    /// Whether the user has to fix a stored API key to recover
    pub fn is_credential_problem(&self) -> bool {
        matches!(
            self,
            AgentError::MissingCredential(_)
                | AgentError::InvalidCredentialFormat(_)
                | AgentError::NetworkFailure(HTTP_UNAUTHORIZED)
        )
    }

    /// A distinct, actionable message for the application layer
    pub fn user_message(&self) -> String {
        match self {
            AgentError::InvalidStateTransition { from, action } => format!(
                "'{}' is not available while the agent is {}.",
                action, from
            ),
            AgentError::MissingCredential(provider) => format!(
                "Missing API key for {}. Save one with `wakeline keys set {}`.",
                provider, provider
            ),
            AgentError::InvalidCredentialFormat(provider) => format!(
                "The {} API key format looks invalid. Verify it and save it again.",
                provider
            ),
            AgentError::RuntimeRiskDetected(reasons) => format!(
                "Runtime risk detected: {}. Agent features were disabled for safety.",
                reasons.join(", ")
            ),
            AgentError::ModelNotFound(model_id) => {
                format!("Wake-word model '{}' was not found.", model_id)
            }
            AgentError::ProviderNotConnected => {
                "The model connection is not ready. Try again; it reconnects automatically."
                    .to_string()
            }
            AgentError::StorageCorrupted => {
                "Local secure storage appears corrupted. Reset local memory to continue."
                    .to_string()
            }
            AgentError::UnsupportedResponse => {
                "The provider returned a response format this client does not understand."
                    .to_string()
            }
            AgentError::NetworkFailure(HTTP_UNAUTHORIZED) => {
                "Authentication failed (401). The stored API key was rejected; save a valid key."
                    .to_string()
            }
            AgentError::NetworkFailure(code) => {
                format!("Network request failed with status code {}.", code)
            }
            AgentError::Other(message) => message.clone(),
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AgentError::NetworkFailure(status.as_u16()),
            None => AgentError::Other(format!("HTTP request failed: {}", err)),
        }
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
