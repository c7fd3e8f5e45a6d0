//! Client-facing message envelope.
//!
//! Inbound (one per frame, after the handshake):
//!
//! ```text
//! { "realtime_input": { "media_chunks": [ { "mime_type": "audio/pcm", "data": "..." } ] } }
//! ```
//!
//! Outbound:
//!
//! ```text
//! { "text": "..." }
//! { "audio": "<base64>" }
//! ```
//!
//! Everything here is pure and synchronous.

use base64::prelude::*;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use super::error::DecodeError;
use crate::core::live::{MIME_AUDIO_PCM, MIME_IMAGE_JPEG, MediaChunk};

/// A transport frame from the client, independent of the WebSocket library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Binary(Bytes),
    Ping,
    Close,
}

/// A decoded client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Media chunks in arrival order
    RealtimeInput(Vec<RawMediaChunk>),
    /// Anything else; logged and dropped
    Other(Value),
}

/// A media chunk as the client sent it, before mime dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawMediaChunk {
    #[serde(alias = "mimeType")]
    pub mime_type: String,

    /// Base64, or the raw payload as a string
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct RealtimeInputBody {
    #[serde(default, alias = "mediaChunks")]
    media_chunks: Vec<RawMediaChunk>,
}

/// Decode one text frame.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let input = object
        .remove("realtime_input")
        .or_else(|| object.remove("realtimeInput"));

    match input {
        Some(input) => {
            let body: RealtimeInputBody = serde_json::from_value(input)
                .map_err(|e| DecodeError::InvalidRealtimeInput(e.to_string()))?;
            Ok(ClientMessage::RealtimeInput(body.media_chunks))
        }
        None => Ok(ClientMessage::Other(Value::Object(object))),
    }
}

/// Decode a binary frame carrying UTF-8 JSON.
pub fn decode_client_binary(raw: &[u8]) -> Result<ClientMessage, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
    decode_client_message(text)
}

/// Payload bytes of a chunk: base64-decoded when possible, the raw string
/// bytes otherwise.
fn chunk_payload(data: String) -> Bytes {
    match BASE64_STANDARD.decode(data.as_bytes()) {
        Ok(decoded) => Bytes::from(decoded),
        Err(_) => Bytes::from(data.into_bytes()),
    }
}

impl TryFrom<RawMediaChunk> for MediaChunk {
    type Error = DecodeError;

    fn try_from(raw: RawMediaChunk) -> Result<Self, Self::Error> {
        let RawMediaChunk { mime_type, data } = raw;

        if mime_type == MIME_AUDIO_PCM {
            Ok(MediaChunk::audio(chunk_payload(data)))
        } else if mime_type == MIME_IMAGE_JPEG {
            Ok(MediaChunk::image(chunk_payload(data)))
        } else {
            Err(DecodeError::UnsupportedMimeType(mime_type))
        }
    }
}

/// A message for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// The text of one completed turn
    Text(String),
    /// Raw audio bytes, base64-encoded on the wire
    Audio(Bytes),
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Text(_) => "text",
            OutboundMessage::Audio(_) => "audio",
        }
    }
}

/// Encode a message for the client.
pub fn encode_outbound(message: &OutboundMessage) -> String {
    let value = match message {
        OutboundMessage::Text(text) => serde_json::json!({ "text": text }),
        OutboundMessage::Audio(data) => serde_json::json!({ "audio": BASE64_STANDARD.encode(data) }),
    };
    value.to_string()
}
