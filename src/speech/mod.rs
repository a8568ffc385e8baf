//! Speech output
//!
//! Synthesis hands back a lazy, single-use stream of audio chunks. Nothing
//! is requested until the stream is first polled.

pub mod elevenlabs;

pub use elevenlabs::{
    validate_voice_id, ElevenLabsSpeechAdapter, DEFAULT_SPEECH_MODEL, DEFAULT_SPEECH_ROOT,
    DEFAULT_VOICE_ID,
};

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use std::sync::Arc;

use crate::error::AgentResult;

/// Finite sequence of encoded audio chunks
pub type AudioStream = BoxStream<'static, AgentResult<Vec<u8>>>;

/// Resolves the synthesis credential on demand
pub type ApiKeyProvider = Arc<dyn Fn() -> BoxFuture<'static, AgentResult<String>> + Send + Sync>;

/// Text-to-speech contract
pub trait SpeechOutputAdapter: Send + Sync {
    /// Audio for `text` spoken by `voice_id`
    fn synthesize(&self, text: &str, voice_id: &str) -> AudioStream;
}
