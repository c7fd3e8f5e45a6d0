//! Upstream live session providers.
//!
//! A provider turns a negotiated [`LiveSessionConfig`] into an open
//! [`LiveSession`]: a send half for media chunks and a lazy stream of model
//! responses. The relay only ever talks to the [`LiveConnector`] trait.
//!
//! # Supported Providers
//!
//! - **Gemini Live** - `BidiGenerateContent` over WebSocket

mod base;
pub mod gemini;

pub use base::{
    LiveConnector, LiveError, LiveResponse, LiveResult, LiveSender, LiveSession,
    LiveSessionConfig, MIME_AUDIO_PCM, MIME_IMAGE_JPEG, MediaChunk, PCM_INPUT_ENCODING,
    PCM_INPUT_SAMPLE_RATE, ResponsePart, ResponseStream, RetryConfig,
};
pub use gemini::{GeminiLive, GeminiLiveConfig};

use std::sync::Arc;

/// Supported live providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveProvider {
    /// Google Gemini Live API
    Gemini,
}

impl std::fmt::Display for LiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Create a shared connector for the given provider.
pub fn create_live_connector(
    provider: LiveProvider,
    config: GeminiLiveConfig,
) -> LiveResult<Arc<dyn LiveConnector>> {
    match provider {
        LiveProvider::Gemini => Ok(Arc::new(GeminiLive::new(config)?)),
    }
}
