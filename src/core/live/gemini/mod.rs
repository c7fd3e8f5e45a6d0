//! Gemini Live API module.
//!
//! Bidirectional streaming with Gemini models over the `BidiGenerateContent`
//! WebSocket endpoint.
//!
//! # Input
//!
//! - PCM 16-bit signed little-endian microphone audio at 16kHz
//! - JPEG screen frames
//!
//! # Output
//!
//! - Text fragments
//! - PCM audio at 24kHz
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_gateway::core::live::{GeminiLive, GeminiLiveConfig, LiveConnector};
//!
//! let connector = GeminiLive::new(GeminiLiveConfig {
//!     api_key: std::env::var("GOOGLE_API_KEY")?,
//!     ..Default::default()
//! })?;
//!
//! let mut session = connector.open(&session_config).await?;
//! session.sender.send(MediaChunk::audio(pcm)).await?;
//! ```

mod client;
mod config;
mod messages;

pub use client::{GeminiLive, GeminiSender};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_SETUP_TIMEOUT, GEMINI_DEFAULT_API_VERSION,
    GEMINI_DEFAULT_MODEL, GEMINI_LIVE_HOST, GeminiLiveConfig, model_resource_name,
};
pub use messages::{ClientEvent, ServerContent, ServerMessage};
