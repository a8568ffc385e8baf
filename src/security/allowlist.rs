//! Outbound host allowlist

use std::collections::HashSet;
use url::Url;

use crate::error::{AgentError, AgentResult};

/// Hosts the model adapters talk to by default
pub const DEFAULT_MODEL_HOSTS: [&str; 2] = ["api.openai.com", "api.elevenlabs.io"];

/// Fixed set of hosts outbound requests may target
///
/// Every request the provider and speech adapters issue is checked here
/// first; a request to any other host is never sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkAllowlist {
    hosts: HashSet<String>,
}

impl NetworkAllowlist {
    /// Allow exactly `hosts` (compared case-insensitively)
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        NetworkAllowlist {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// The LLM and speech vendor hosts
    pub fn default_model_hosts() -> Self {
        Self::new(DEFAULT_MODEL_HOSTS)
    }

    /// Whether `host` is permitted
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    /// Fail unless the URL's host is permitted
    pub fn validate(&self, url: &Url) -> AgentResult<()> {
        let host = url
            .host_str()
            .ok_or_else(|| AgentError::Other("URL host missing".to_string()))?
            .to_ascii_lowercase();

        if !self.hosts.contains(&host) {
            tracing::warn!(host = %host, "blocked outbound request");
            return Err(AgentError::Other(format!("Blocked network host: {}", host)));
        }
        Ok(())
    }
}

impl Default for NetworkAllowlist {
    fn default() -> Self {
        Self::default_model_hosts()
    }
}
