//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `live` - Screen-sharing WebSocket relayed to a Gemini Live session

pub mod api;
pub mod live;

pub use api::health_check;
pub use live::live_handler;
