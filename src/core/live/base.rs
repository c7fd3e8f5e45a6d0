//! Base traits and types for upstream live sessions.
//!
//! A live session is a bidirectional stream with a generative model: media
//! chunks go up through a [`LiveSender`], model output comes back as a lazy
//! stream of [`LiveResponse`] values. The two halves are handed out
//! separately so that each one can be owned by exactly one relay loop.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sample rate the client captures microphone audio at.
pub const PCM_INPUT_SAMPLE_RATE: u32 = 16000;

/// Encoding of client PCM audio (signed 16-bit little-endian).
pub const PCM_INPUT_ENCODING: &str = "LINEAR16";

/// Mime type of client PCM audio chunks.
pub const MIME_AUDIO_PCM: &str = "audio/pcm";

/// Mime type of client JPEG frames.
pub const MIME_IMAGE_JPEG: &str = "image/jpeg";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the upstream session.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The session was already closed
    #[error("Session closed")]
    Closed,

    /// Setup was rejected or never acknowledged
    #[error("Session setup failed: {0}")]
    SetupFailed(String),
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Retry policy for opening the upstream connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of retries after the first failed attempt. 0 disables retrying.
    pub max_retries: u32,

    /// Initial delay between attempts (milliseconds).
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts (milliseconds).
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_delay_ms`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(self.max_delay_ms as f64);

        Duration::from_millis(delay as u64)
    }

    /// Whether another attempt is allowed after `attempt` retries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Negotiated configuration of one live session.
///
/// `generation_config` is opaque: whatever the client put there is passed
/// upstream untouched, except that `response_modalities` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// Model identifier without the `models/` prefix
    pub model: String,

    /// Generation options forwarded verbatim
    pub generation_config: serde_json::Map<String, serde_json::Value>,

    /// Requested response modalities (e.g. `AUDIO`, `TEXT`)
    pub response_modalities: Vec<String>,

    /// System instruction for the model
    pub system_instruction: String,
}

// =============================================================================
// Media and Response Types
// =============================================================================

/// One inbound media chunk, already validated by mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaChunk {
    /// Raw PCM microphone audio
    AudioPcm {
        data: Bytes,
        sample_rate: u32,
        encoding: &'static str,
    },
    /// One JPEG screen frame
    ImageJpeg { data: Bytes },
}

impl MediaChunk {
    /// PCM audio at the client capture rate.
    pub fn audio(data: impl Into<Bytes>) -> Self {
        MediaChunk::AudioPcm {
            data: data.into(),
            sample_rate: PCM_INPUT_SAMPLE_RATE,
            encoding: PCM_INPUT_ENCODING,
        }
    }

    /// A JPEG frame.
    pub fn image(data: impl Into<Bytes>) -> Self {
        MediaChunk::ImageJpeg { data: data.into() }
    }

    /// The discriminating mime type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaChunk::AudioPcm { .. } => MIME_AUDIO_PCM,
            MediaChunk::ImageJpeg { .. } => MIME_IMAGE_JPEG,
        }
    }

    /// Payload bytes.
    pub fn data(&self) -> &Bytes {
        match self {
            MediaChunk::AudioPcm { data, .. } | MediaChunk::ImageJpeg { data } => data,
        }
    }
}

/// One content part of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    /// A streamed text fragment
    Text(String),
    /// Inline binary data, audio in practice
    InlineData { mime_type: String, data: Bytes },
    /// A part that could not be interpreted
    Malformed(String),
}

/// One message from the upstream session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveResponse {
    /// Content parts in upstream order
    pub parts: Vec<ResponsePart>,
    /// The model finished its turn
    pub turn_complete: bool,
    /// The message carried server content, even if it had no parts
    pub server_content: bool,
}

impl LiveResponse {
    /// A response with parts and no turn boundary.
    pub fn parts(parts: Vec<ResponsePart>) -> Self {
        Self {
            parts,
            turn_complete: false,
            server_content: true,
        }
    }

    /// A bare turn-complete signal.
    pub fn turn_complete() -> Self {
        Self {
            parts: Vec::new(),
            turn_complete: true,
            server_content: true,
        }
    }

    /// Whether there is anything for the relay to act on.
    pub fn has_content(&self) -> bool {
        !self.parts.is_empty() || self.turn_complete
    }
}

// =============================================================================
// Session Traits
// =============================================================================

/// Lazy stream of upstream responses. Ends when the upstream closes.
pub type ResponseStream = Pin<Box<dyn Stream<Item = LiveResult<LiveResponse>> + Send>>;

/// Send half of an open live session.
#[async_trait]
pub trait LiveSender: Send {
    /// Send one media chunk upstream.
    async fn send(&mut self, chunk: MediaChunk) -> LiveResult<()>;

    /// Close the session. Calling it again is a no-op.
    async fn close(&mut self) -> LiveResult<()>;
}

/// An open live session split into its two halves.
pub struct LiveSession {
    pub sender: Box<dyn LiveSender>,
    pub responses: ResponseStream,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession").finish_non_exhaustive()
    }
}

/// Opens live sessions against a backend.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session with the merged configuration.
    async fn open(&self, config: &LiveSessionConfig) -> LiveResult<LiveSession>;

    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LiveError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        assert_eq!(LiveError::Closed.to_string(), "Session closed");
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.should_retry(0));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
    }

    #[test]
    fn test_retry_disabled() {
        assert!(!RetryConfig::disabled().should_retry(0));
    }

    #[test]
    fn test_retry_calculate_delay() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            ..Default::default()
        };

        assert_eq!(config.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(4000));
        // capped
        assert_eq!(config.calculate_delay(4), Duration::from_millis(5000));
    }

    #[test]
    fn test_media_chunk_constructors() {
        let audio = MediaChunk::audio(vec![1u8, 2]);
        assert_eq!(audio.mime_type(), "audio/pcm");
        match &audio {
            MediaChunk::AudioPcm {
                sample_rate,
                encoding,
                ..
            } => {
                assert_eq!(*sample_rate, 16000);
                assert_eq!(*encoding, "LINEAR16");
            }
            _ => panic!("Expected AudioPcm"),
        }
        assert_eq!(audio.data().as_ref(), &[1u8, 2]);

        let image = MediaChunk::image(vec![0xffu8, 0xd8]);
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_response_has_content() {
        assert!(!LiveResponse::default().has_content());
        assert!(!LiveResponse::default().server_content);
        assert!(LiveResponse::turn_complete().has_content());
        assert!(LiveResponse::parts(vec![ResponsePart::Text("a".to_string())]).has_content());
    }
}
