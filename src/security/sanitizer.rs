//! API key sanitizer
//!
//! Turns whatever a user pasted (a header line, an `.env` entry, a quoted
//! string with invisible characters) into the bare provider token.

use regex::Regex;
use std::sync::OnceLock;

use crate::credentials::CredentialProvider;

const AUTHORIZATION_LABEL: &str = "authorization:";
const BEARER_PREFIX: &str = "bearer ";

/// `<label>=` prefixes copied out of env files
const ASSIGNMENT_LABELS: [&str; 3] = ["api_key=", "openai_api_key=", "elevenlabs_api_key="];

/// Characters that survive copy/paste but never belong in a key
const INVISIBLE: [char; 2] = ['\u{200B}', '\u{FEFF}'];

fn openai_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"sk-[A-Za-z0-9_-]{20,}").expect("valid regex"))
}

fn token_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]{20,}").expect("valid regex"))
}

fn shape(provider: CredentialProvider) -> &'static Regex {
    match provider {
        CredentialProvider::OpenAi => openai_shape(),
        CredentialProvider::ElevenLabs => token_shape(),
    }
}

/// Normalize a raw credential string into the canonical provider token
///
/// Total and idempotent: `normalize(&normalize(x, p), p) == normalize(x, p)`.
/// When no provider-shaped token is found the cleaned string is returned.
pub fn normalize(raw: &str, provider: CredentialProvider) -> String {
    let mut cleaned = clean_once(raw);
    loop {
        let next = clean_once(&cleaned);
        if next == cleaned {
            break;
        }
        cleaned = next;
    }

    match shape(provider).find(&cleaned) {
        Some(token) => token.as_str().to_string(),
        None => cleaned,
    }
}

fn clean_once(input: &str) -> String {
    let mut key = input.trim();

    if starts_with_ignore_case(key, AUTHORIZATION_LABEL) {
        key = match key.find(' ') {
            Some(space) => key[space..].trim(),
            None => "",
        };
    }
    if starts_with_ignore_case(key, BEARER_PREFIX) {
        key = key[BEARER_PREFIX.len()..].trim();
    }
    for label in ASSIGNMENT_LABELS {
        if starts_with_ignore_case(key, label) {
            key = key[label.len()..].trim();
        }
    }

    key.trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !INVISIBLE.contains(c))
        .collect()
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
