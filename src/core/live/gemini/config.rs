//! Gemini Live API configuration types.
//!
//! This module contains the connection settings for the Gemini Live
//! `BidiGenerateContent` WebSocket endpoint:
//! - Endpoint construction (API version, key parameter)
//! - Model naming
//! - Connect and setup timeouts, retry policy

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::core::live::base::{LiveError, LiveResult, RetryConfig};

/// Host serving the Gemini Live WebSocket API.
pub const GEMINI_LIVE_HOST: &str = "generativelanguage.googleapis.com";

/// Default API version. Live sessions are only exposed on the alpha surface.
pub const GEMINI_DEFAULT_API_VERSION: &str = "v1alpha";

/// Default model for screen-sharing sessions.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Default time allowed for the WebSocket connect (5 minutes).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time allowed between sending `setup` and `setupComplete`.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`super::GeminiLive`].
#[derive(Clone)]
pub struct GeminiLiveConfig {
    /// Google API key, sent as the `key` query parameter
    pub api_key: String,
    /// API version path segment (e.g. `v1alpha`)
    pub api_version: String,
    /// Full endpoint override, used instead of the public Google endpoint
    pub endpoint: Option<String>,
    /// Timeout for establishing the WebSocket
    pub connect_timeout: Duration,
    /// Timeout for the setup acknowledgement
    pub setup_timeout: Duration,
    /// Retry policy for the connect step
    pub retry: RetryConfig,
}

impl fmt::Debug for GeminiLiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiLiveConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .field("setup_timeout", &self.setup_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: GEMINI_DEFAULT_API_VERSION.to_string(),
            endpoint: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

impl GeminiLiveConfig {
    /// Public endpoint for the configured API version.
    pub fn default_endpoint(&self) -> String {
        format!(
            "wss://{GEMINI_LIVE_HOST}/ws/google.ai.generativelanguage.{}.GenerativeService.BidiGenerateContent",
            self.api_version
        )
    }

    /// Endpoint with the API key attached.
    pub fn build_ws_url(&self) -> LiveResult<Url> {
        let base = self
            .endpoint
            .clone()
            .unwrap_or_else(|| self.default_endpoint());

        let mut url = Url::parse(&base)
            .map_err(|e| LiveError::InvalidConfiguration(format!("invalid endpoint: {e}")))?;

        if !self.api_key.is_empty() {
            url.query_pairs_mut().append_pair("key", &self.api_key);
        }

        Ok(url)
    }
}

/// Qualified model resource name (`models/<model>`).
pub fn model_resource_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
