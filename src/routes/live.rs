//! Live WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for a screen-sharing session
///
/// # Protocol
///
/// The client first sends a setup message:
///
/// ```json
/// {"setup": {"generation_config": {"temperature": 0.4}}}
/// ```
///
/// then streams media:
///
/// ```json
/// {"realtime_input": {"media_chunks": [{"mime_type": "image/jpeg", "data": "<base64>"}]}}
/// ```
///
/// The server replies with `{"text": "..."}` once per completed turn and
/// `{"audio": "<base64 pcm>"}` as audio arrives.
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
