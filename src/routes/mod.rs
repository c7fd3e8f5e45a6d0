//! Router construction
//!
//! - `api` - `/health`
//! - `live` - `/ws` screen-sharing WebSocket
//! - `static_files` - the bundled web client served at `/`

pub mod api;
pub mod live;
pub mod static_files;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// The full application router, with state attached.
///
/// CORS and security headers are layered on by the binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .merge(api::create_api_router())
        .merge(live::create_live_router())
        .fallback_service(static_files::serve_static(static_dir))
        .with_state(state)
}
