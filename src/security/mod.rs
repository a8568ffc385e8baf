//! Security policy
//!
//! Stateless rules the rest of the agent leans on:
//! - [`sanitizer`]: canonicalize pasted API keys
//! - [`redact`]: scrub secrets from anything headed for a log
//! - [`allowlist`]: the outbound host boundary
//! - [`risk`]: debugger / tamper probing that gates arming

pub mod allowlist;
pub mod redact;
pub mod risk;
pub mod sanitizer;

pub use allowlist::NetworkAllowlist;
pub use redact::{fingerprint, redact_secrets, REDACTION_MARKER};
pub use risk::{PlatformRiskProbe, RiskProbe, RuntimeRiskReport, StaticRiskProbe};

use std::sync::Arc;

use crate::credentials::CredentialProvider;

/// Check that a key has the provider's shape (after normalization)
///
/// - openai: `sk-` prefix, at least 20 characters
/// - elevenlabs: at least 20 characters of `[A-Za-z0-9_-]`
pub fn validate_api_key_format(provider: CredentialProvider, key: &str) -> bool {
    let normalized = sanitizer::normalize(key, provider);
    match provider {
        CredentialProvider::OpenAi => {
            normalized.starts_with("sk-") && normalized.chars().count() >= 20
        }
        CredentialProvider::ElevenLabs => {
            normalized.chars().count() >= 20
                && normalized
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
    }
}

/// Policy consulted by the orchestrator
pub trait SecurityPolicy: Send + Sync {
    /// See [`validate_api_key_format`]
    fn validate_api_key_format(&self, provider: CredentialProvider, key: &str) -> bool;

    /// See [`redact_secrets`]
    fn redact_logs(&self, payload: &str) -> String;

    /// Probe the runtime for a degraded-trust environment
    fn runtime_risk_check(&self) -> RuntimeRiskReport;
}

/// Built-in rules with a pluggable risk probe
#[derive(Clone)]
pub struct DefaultSecurityPolicy {
    probe: Arc<dyn RiskProbe>,
}

impl DefaultSecurityPolicy {
    /// Use `probe` for runtime risk checks
    pub fn new(probe: Arc<dyn RiskProbe>) -> Self {
        DefaultSecurityPolicy { probe }
    }
}

impl Default for DefaultSecurityPolicy {
    fn default() -> Self {
        Self::new(Arc::new(PlatformRiskProbe::default()))
    }
}

impl SecurityPolicy for DefaultSecurityPolicy {
    fn validate_api_key_format(&self, provider: CredentialProvider, key: &str) -> bool {
        validate_api_key_format(provider, key)
    }

    fn redact_logs(&self, payload: &str) -> String {
        redact_secrets(payload)
    }

    fn runtime_risk_check(&self) -> RuntimeRiskReport {
        let report = self.probe.probe();
        if report.should_degrade_capabilities() {
            tracing::warn!(reasons = ?report.reasons, "runtime risk detected");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_format() {
        let policy = DefaultSecurityPolicy::new(Arc::new(StaticRiskProbe::clean()));
        let p = CredentialProvider::OpenAi;

        assert!(policy.validate_api_key_format(p, "sk-abcdefghijklmnopqrstu"));
        assert!(policy.validate_api_key_format(p, "Bearer sk-abc-DEF_123456789012345"));
        assert!(!policy.validate_api_key_format(p, "pk-abcdefghijklmnopqrstuvwxyz"));
        assert!(!policy.validate_api_key_format(p, "abcdefghijklmnopqrstuvwxyz"));
        assert!(!policy.validate_api_key_format(p, "sk-short"));
        assert!(!policy.validate_api_key_format(p, ""));
    }

    #[test]
    fn test_elevenlabs_format() {
        let p = CredentialProvider::ElevenLabs;

        assert!(validate_api_key_format(p, "0123456789abcdefABCDEF"));
        assert!(validate_api_key_format(p, "xi_api_key=0123456789abcdef-ABCD"));
        assert!(!validate_api_key_format(p, "0123456789"));
        assert!(!validate_api_key_format(p, "key with spaces and more than twenty"));
    }

    #[test]
    fn test_policy_forwards_probe_report() {
        let report = RuntimeRiskReport {
            debugger_attached: false,
            tampered: true,
            reasons: vec!["Dynamic library injection detected".to_string()],
        };
        let policy = DefaultSecurityPolicy::new(Arc::new(StaticRiskProbe::new(report.clone())));
        assert_eq!(policy.runtime_risk_check(), report);
    }

    #[test]
    fn test_policy_redacts() {
        let policy = DefaultSecurityPolicy::default();
        assert_eq!(
            policy.redact_logs("token sk-0123456789abcdef"),
            "token [REDACTED]"
        );
    }
}
