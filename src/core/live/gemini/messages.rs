//! Gemini Live WebSocket message types.
//!
//! Client messages (sent to server):
//! - setup - Session configuration, first message only
//! - realtime_input - Media chunks (audio, images)
//!
//! Server messages (received from server):
//! - setupComplete - Setup acknowledged
//! - serverContent - Model turn parts and turn boundaries
//! - toolCall / toolCallCancellation - Function calling (not relayed)
//! - goAway - Server is about to disconnect
//!
//! The server answers in camelCase; requests are accepted in snake_case.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::model_resource_name;
use crate::core::live::base::{LiveResponse, LiveSessionConfig, MediaChunk, ResponsePart};

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent to the Gemini Live endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientEvent {
    /// Session setup
    Setup(Setup),
    /// Streaming media input
    RealtimeInput(RealtimeInput),
}

impl ClientEvent {
    /// Build the setup message from a merged session config.
    pub fn setup(config: &LiveSessionConfig) -> Self {
        let mut generation_config = config.generation_config.clone();
        generation_config.insert(
            "response_modalities".to_string(),
            serde_json::Value::from(config.response_modalities.clone()),
        );

        ClientEvent::Setup(Setup {
            model: model_resource_name(&config.model),
            generation_config,
            system_instruction: Content {
                parts: vec![TextPart {
                    text: config.system_instruction.clone(),
                }],
            },
        })
    }

    /// Wrap a single media chunk.
    pub fn media(chunk: &MediaChunk) -> Self {
        ClientEvent::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob::from_chunk(chunk)],
        })
    }
}

/// Setup payload.
#[derive(Debug, Clone, Serialize)]
pub struct Setup {
    /// Model resource name (`models/...`)
    pub model: String,
    /// Opaque generation options, including `response_modalities`
    pub generation_config: serde_json::Map<String, serde_json::Value>,
    /// System instruction content
    pub system_instruction: Content,
}

/// Content made of text parts.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

/// A text part.
#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Realtime input payload.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

/// Base64 media blob.
#[derive(Debug, Clone, Serialize)]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    /// Encode a chunk for the wire. PCM carries its rate in the mime type.
    pub fn from_chunk(chunk: &MediaChunk) -> Self {
        let mime_type = match chunk {
            MediaChunk::AudioPcm { sample_rate, .. } => {
                format!("{};rate={sample_rate}", chunk.mime_type())
            }
            MediaChunk::ImageJpeg { .. } => chunk.mime_type().to_string(),
        };

        Blob {
            mime_type,
            data: BASE64_STANDARD.encode(chunk.data()),
        }
    }
}

// =============================================================================
// Server Messages
// =============================================================================

/// One message from the Gemini Live endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, alias = "setup_complete")]
    pub setup_complete: Option<serde_json::Value>,

    #[serde(default, alias = "server_content")]
    pub server_content: Option<ServerContent>,

    #[serde(default, alias = "tool_call")]
    pub tool_call: Option<serde_json::Value>,

    #[serde(default, alias = "go_away")]
    pub go_away: Option<serde_json::Value>,
}

/// Model output for the current turn.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, alias = "model_turn")]
    pub model_turn: Option<ModelTurn>,

    #[serde(default, alias = "turn_complete")]
    pub turn_complete: bool,

    #[serde(default)]
    pub interrupted: bool,
}

/// Parts of a model turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single part: text or inline data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default, alias = "inline_data")]
    pub inline_data: Option<InlineBlob>,
}

/// Base64 inline data from the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineBlob {
    #[serde(default, alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

impl ServerMessage {
    /// Parse a raw frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        if self.setup_complete.is_some() {
            "setupComplete"
        } else if self.server_content.is_some() {
            "serverContent"
        } else if self.tool_call.is_some() {
            "toolCall"
        } else if self.go_away.is_some() {
            "goAway"
        } else {
            "unknown"
        }
    }

    /// Convert into the provider-neutral response shape.
    ///
    /// Messages without `serverContent` become an empty response.
    pub fn into_response(self) -> LiveResponse {
        let Some(content) = self.server_content else {
            return LiveResponse::default();
        };

        let parts = content
            .model_turn
            .map(|turn| turn.parts.into_iter().map(Part::into_response_part).collect())
            .unwrap_or_default();

        if content.interrupted {
            debug!("Gemini Live turn interrupted");
        }

        LiveResponse {
            parts,
            turn_complete: content.turn_complete,
            server_content: true,
        }
    }
}

impl Part {
    fn into_response_part(self) -> ResponsePart {
        if let Some(text) = self.text {
            return ResponsePart::Text(text);
        }

        match self.inline_data {
            Some(blob) => match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                Ok(bytes) => ResponsePart::InlineData {
                    mime_type: blob.mime_type,
                    data: Bytes::from(bytes),
                },
                Err(e) => ResponsePart::Malformed(format!(
                    "inline data ({}) is not valid base64: {e}",
                    blob.mime_type
                )),
            },
            None => ResponsePart::Malformed("part has neither text nor inline data".to_string()),
        }
    }
}
