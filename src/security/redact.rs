//! Log redaction and text fingerprints

use regex::Regex;
use std::sync::OnceLock;

/// Replaces every secret value in redacted output
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Hex characters kept from the BLAKE3 digest
const FINGERPRINT_LEN: usize = 12;

fn secret_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"sk-[A-Za-z0-9_-]{10,}").expect("valid regex"))
}

fn labelled_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)[A-Za-z0-9_-]{8,}").expect("valid regex")
    })
}

/// Scrub secret-shaped substrings from a log payload
///
/// `sk-` tokens are replaced whole; `api_key=value` style pairs keep their
/// label. Text matching neither rule is returned untouched.
pub fn redact_secrets(payload: &str) -> String {
    let pass = secret_key_pattern().replace_all(payload, REDACTION_MARKER);
    let replacement = format!("${{1}}{}", REDACTION_MARKER);
    labelled_key_pattern()
        .replace_all(&pass, replacement.as_str())
        .into_owned()
}

/// Short stable identifier for free text that must not be logged verbatim
pub fn fingerprint(text: &str) -> String {
    let digest = blake3::hash(text.as_bytes());
    let mut hex = hex::encode(digest.as_bytes());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_both_rules() {
        let payload = "call failed key=sk-live-ABCDEFGHIJKLMNOP, retry with api_key=zzzz9999yyyy";
        let redacted = redact_secrets(payload);

        assert!(!redacted.contains("sk-live-ABCDEFGHIJKLMNOP"));
        assert!(!redacted.contains("zzzz9999yyyy"));
        assert!(redacted.contains("api_key=[REDACTED]"));
        assert!(redacted.starts_with("call failed key=[REDACTED],"));
    }

    #[test]
    fn test_label_variants() {
        assert_eq!(redact_secrets("API-KEY: abcdefgh12"), "API-KEY: [REDACTED]");
        assert_eq!(redact_secrets("apikey=abcdefgh"), "apikey=[REDACTED]");
        // Too short to look like a key
        assert_eq!(redact_secrets("api_key=abc"), "api_key=abc");
        assert_eq!(redact_secrets("sk-short"), "sk-short");
    }

    #[test]
    fn test_clean_text_unchanged() {
        let text = "Hey Jarvis, what's the weather in 上海 tomorrow? 🌧";
        assert_eq!(redact_secrets(text), text);
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = fingerprint("turn on the lights");
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert_eq!(a, fingerprint("turn on the lights"));
        assert_ne!(a, fingerprint("turn off the lights"));
    }
}
