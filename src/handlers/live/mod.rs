//! Screen-sharing WebSocket endpoint.
//!
//! The first client message is the setup handshake; after that the client
//! streams `realtime_input` media chunks and receives `{"text"}` and
//! `{"audio"}` messages. See [`crate::core::relay`] for the relay itself.

mod handler;

pub use handler::{
    MAX_WS_FRAME_SIZE, MAX_WS_MESSAGE_SIZE, client_frame, client_sink, live_handler,
};
