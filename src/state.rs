use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::live::{LiveConnector, LiveProvider, create_live_connector};
use crate::core::relay::SessionCoordinator;

/// Application state shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub coordinator: Arc<SessionCoordinator>,
    /// Root token; cancelling it tears down every live session.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build state with a Gemini connector derived from `config`.
    ///
    /// Fails when the API key is missing or the upstream endpoint is unusable.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, String> {
        let gemini = config.gemini_config()?;
        let connector =
            create_live_connector(LiveProvider::Gemini, gemini).map_err(|e| e.to_string())?;

        Ok(Self::with_connector(config, connector))
    }

    /// Build state around an existing connector.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn LiveConnector>) -> Arc<Self> {
        let coordinator = Arc::new(SessionCoordinator::new(
            connector,
            config.session_settings(),
        ));

        Arc::new(Self {
            config,
            coordinator,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token for one session, cancelled with the server.
    pub fn session_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
