//! Session relay between one client connection and one upstream live
//! session.
//!
//! # Components
//!
//! - [`codec`] - client envelope decoding and encoding
//! - [`turn`] - per-turn text buffering
//! - [`setup`] - handshake parsing and configuration merge
//! - [`inbound`] / [`outbound`] - the two relay loops
//! - [`coordinator`] - session lifecycle and supervision
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_gateway::core::relay::{SessionCoordinator, SessionSettings};
//!
//! let coordinator = SessionCoordinator::new(connector, SessionSettings::default());
//! let report = coordinator.handle(client_frames, client_sink).await;
//! tracing::info!(end = %report.end, "done");
//! ```

pub mod codec;
pub mod coordinator;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod setup;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{
    ClientFrame, ClientMessage, OutboundMessage, RawMediaChunk, decode_client_binary,
    decode_client_message, encode_outbound,
};
pub use coordinator::{
    DEFAULT_HANDSHAKE_TIMEOUT, SessionCoordinator, SessionReport, SessionSettings, SessionState,
};
pub use error::{DecodeError, RelayError, SessionEnd};
pub use inbound::{InboundStats, run_inbound};
pub use outbound::{OutboundStats, run_outbound};
pub use setup::{
    DEFAULT_RESPONSE_MODALITIES, DEFAULT_SYSTEM_INSTRUCTION, SetupRequest, merge_setup,
    parse_handshake,
};
pub use turn::TurnAccumulator;
