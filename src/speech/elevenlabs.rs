//! ElevenLabs-style synthesis
//!
//! `POST {root}/v1/text-to-speech/{voice_id}/stream` with an `xi-api-key`
//! header. The whole response body becomes a single audio chunk.

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::{ApiKeyProvider, AudioStream, SpeechOutputAdapter};
use crate::credentials::CredentialProvider;
use crate::error::{AgentError, AgentResult};
use crate::security::{self, sanitizer, NetworkAllowlist};

/// Synthesis API root
pub const DEFAULT_SPEECH_ROOT: &str = "https://api.elevenlabs.io";

/// Synthesis model
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_turbo_v2_5";

/// Voice used when none is configured
pub const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

const MAX_VOICE_ID_LEN: usize = 128;

/// Voice ids go into the URL path: ASCII alphanumerics, `-` and `_` only
pub fn validate_voice_id(voice_id: &str) -> AgentResult<()> {
    if voice_id.is_empty() {
        return Err(AgentError::Other("Voice id must not be empty".to_string()));
    }
    if voice_id.len() > MAX_VOICE_ID_LEN {
        return Err(AgentError::Other(format!(
            "Voice id exceeds {} characters",
            MAX_VOICE_ID_LEN
        )));
    }
    if !voice_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AgentError::Other(format!(
            "Voice id contains invalid characters: {}",
            voice_id
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.45,
            similarity_boost: 0.85,
        }
    }
}

/// Speech adapter for the `elevenlabs` provider
#[derive(Clone)]
pub struct ElevenLabsSpeechAdapter {
    client: Client,
    root: Url,
    model_id: String,
    allowlist: NetworkAllowlist,
    api_key_provider: ApiKeyProvider,
}

impl ElevenLabsSpeechAdapter {
    /// Adapter against `root`; the key is fetched from `api_key_provider`
    /// for every synthesis
    pub fn new(
        root: Url,
        model_id: impl Into<String>,
        allowlist: NetworkAllowlist,
        api_key_provider: ApiKeyProvider,
    ) -> Self {
        ElevenLabsSpeechAdapter {
            client: Client::new(),
            root,
            model_id: model_id.into(),
            allowlist,
            api_key_provider,
        }
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, voice_id: &str) -> AgentResult<Url> {
        validate_voice_id(voice_id)?;
        let raw = format!(
            "{}/v1/text-to-speech/{}/stream",
            self.root.as_str().trim_end_matches('/'),
            voice_id
        );
        Url::parse(&raw).map_err(|e| AgentError::Other(format!("Invalid speech endpoint: {}", e)))
    }

    async fn fetch_audio(self, text: String, voice_id: String) -> AgentResult<Vec<u8>> {
        let raw_key = (self.api_key_provider)().await?;
        let api_key = sanitizer::normalize(&raw_key, CredentialProvider::ElevenLabs);
        if !security::validate_api_key_format(CredentialProvider::ElevenLabs, &api_key) {
            return Err(AgentError::InvalidCredentialFormat(
                CredentialProvider::ElevenLabs,
            ));
        }

        let endpoint = self.endpoint(&voice_id)?;
        self.allowlist.validate(&endpoint)?;

        tracing::debug!(
            voice = %voice_id,
            text = %security::fingerprint(&text),
            text_len = text.len(),
            "sending speech request"
        );

        let response = self
            .client
            .post(endpoint)
            .header("xi-api-key", api_key)
            .json(&SpeechRequest {
                text: &text,
                model_id: &self.model_id,
                voice_settings: VoiceSettings::default(),
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(match failure_detail(&body) {
                Some(detail) => AgentError::Other(format!(
                    "ElevenLabs request failed ({}): {}",
                    status,
                    security::redact_secrets(&detail)
                )),
                None => AgentError::NetworkFailure(status),
            });
        }

        let audio = response.bytes().await?.to_vec();
        tracing::debug!(bytes = audio.len(), "received speech audio");
        Ok(audio)
    }
}

impl SpeechOutputAdapter for ElevenLabsSpeechAdapter {
    fn synthesize(&self, text: &str, voice_id: &str) -> AudioStream {
        let request = self.clone().fetch_audio(text.to_string(), voice_id.to_string());
        stream::once(request).boxed()
    }
}

/// Human-readable reason from a failure body, if it has one
fn failure_detail(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(detail) = non_empty(json.get("detail")) {
        return Some(detail);
    }

    if let Some(detail) = json.get("detail").filter(|d| d.is_object()) {
        let status = non_empty(detail.get("status"));
        let message = non_empty(detail.get("message"));
        match (status, message) {
            (Some(status), Some(message)) => return Some(format!("{}: {}", status, message)),
            (None, Some(message)) => return Some(message),
            (Some(status), None) => return Some(status),
            (None, None) => {}
        }
    }

    non_empty(json.get("message"))
}
