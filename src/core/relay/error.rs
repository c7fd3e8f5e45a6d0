//! Error types for the session relay.

use std::fmt;

use thiserror::Error;

use crate::core::live::LiveError;

/// A client frame that could not be turned into a [`super::ClientMessage`]
/// or a media chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid realtime_input: {0}")]
    InvalidRealtimeInput(String),

    #[error("unsupported mime type: {0}")]
    UnsupportedMimeType(String),
}

/// Errors raised while running a session.
///
/// Only [`RelayError::Decode`] and [`RelayError::Send`] are per-item and
/// recoverable; every other variant ends the session.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("failed to open upstream session: {0}")]
    UpstreamConnect(#[source] LiveError),

    #[error("failed to decode client message: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to send chunk upstream: {0}")]
    Send(#[source] LiveError),

    #[error("upstream stream failed: {0}")]
    UpstreamReceive(#[source] LiveError),

    #[error("upstream session closed")]
    UpstreamClosed,

    #[error("failed to write to client: {0}")]
    ClientWrite(String),

    #[error("failed to read from client: {0}")]
    ClientRead(String),

    #[error("client disconnected")]
    ClientDisconnect,
}

impl RelayError {
    /// Whether the relay should log and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RelayError::Decode(_) | RelayError::Send(_))
    }

    /// The session end reason this error maps to.
    pub fn end_reason(&self) -> SessionEnd {
        match self {
            RelayError::Handshake(_) => SessionEnd::HandshakeFailed,
            RelayError::UpstreamConnect(_) => SessionEnd::UpstreamConnectFailed,
            RelayError::Send(_) | RelayError::UpstreamReceive(_) => SessionEnd::UpstreamFailed,
            RelayError::UpstreamClosed => SessionEnd::UpstreamClosed,
            RelayError::Decode(_) | RelayError::ClientWrite(_) | RelayError::ClientRead(_) => {
                SessionEnd::ClientFailed
            }
            RelayError::ClientDisconnect => SessionEnd::ClientDisconnected,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed its connection
    ClientDisconnected,
    /// The upstream ended the stream normally
    UpstreamClosed,
    /// The session was cancelled from outside
    Cancelled,
    /// The first frame was missing or malformed
    HandshakeFailed,
    /// The upstream session could not be opened
    UpstreamConnectFailed,
    /// The upstream stream broke
    UpstreamFailed,
    /// Reading from or writing to the client failed
    ClientFailed,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::ClientDisconnected => "client_disconnected",
            SessionEnd::UpstreamClosed => "upstream_closed",
            SessionEnd::Cancelled => "cancelled",
            SessionEnd::HandshakeFailed => "handshake_failed",
            SessionEnd::UpstreamConnectFailed => "upstream_connect_failed",
            SessionEnd::UpstreamFailed => "upstream_failed",
            SessionEnd::ClientFailed => "client_failed",
        }
    }

    /// Whether the session ended without a fault on either side.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            SessionEnd::ClientDisconnected | SessionEnd::UpstreamClosed | SessionEnd::Cancelled
        )
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
