//! Configuration module for the gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use gemini_live_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

use crate::core::live::gemini::{GEMINI_DEFAULT_API_VERSION, GEMINI_DEFAULT_MODEL};
use crate::core::live::{GeminiLiveConfig, RetryConfig};
use crate::core::relay::{DEFAULT_SYSTEM_INSTRUCTION, SessionSettings};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_UNIX_SOCKET_PATH: &str = "/tmp/gemini-screen.sock";
pub const DEFAULT_UNIX_SOCKET_MODE: u32 = 0o777;
pub const DEFAULT_STATIC_DIR: &str = "./";
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS: u64 = 30;

/// Unix socket listener path used when none is configured.
pub(crate) fn default_unix_socket_path() -> Option<PathBuf> {
    cfg!(unix).then(|| PathBuf::from(DEFAULT_UNIX_SOCKET_PATH))
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Listener settings (TCP, Unix socket, TLS, static files)
/// - Gemini Live upstream settings
/// - Per-session settings (handshake timeout, system instruction)
/// - Security settings (CORS)
#[derive(Clone)]
pub struct ServerConfig {
    // Listener settings
    pub host: String,
    pub port: u16,
    /// Unix domain socket to listen on in addition to TCP (None disables it)
    pub unix_socket_path: Option<PathBuf>,
    /// Permission bits applied to the socket file after binding
    pub unix_socket_mode: u32,
    /// Directory served at `/` (must contain `index.html`)
    pub static_dir: PathBuf,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Gemini Live upstream
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_version: String,
    /// Full endpoint override, e.g. a proxy or a local mock
    pub gemini_endpoint: Option<String>,
    /// Accept `ws://` and private-address endpoint overrides
    pub allow_insecure_endpoint: bool,
    pub connect_timeout_seconds: u64,
    pub connect_retries: u32,

    // Session settings
    pub handshake_timeout_seconds: u64,
    /// Operator override of the built-in system instruction
    pub system_instruction: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("unix_socket_path", &self.unix_socket_path)
            .field("unix_socket_mode", &format_args!("{:o}", self.unix_socket_mode))
            .field("static_dir", &self.static_dir)
            .field("tls", &self.tls)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_version", &self.gemini_api_version)
            .field("gemini_endpoint", &self.gemini_endpoint)
            .field("allow_insecure_endpoint", &self.allow_insecure_endpoint)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("connect_retries", &self.connect_retries)
            .field("handshake_timeout_seconds", &self.handshake_timeout_seconds)
            .field("system_instruction", &self.system_instruction.is_some())
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

/// Zeroize the API key when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.google_api_key {
            key.zeroize();
        }
    }
}

/// Built-in defaults with no API key and no Unix socket.
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            unix_socket_path: None,
            unix_socket_mode: DEFAULT_UNIX_SOCKET_MODE,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            tls: None,
            google_api_key: None,
            gemini_model: GEMINI_DEFAULT_MODEL.to_string(),
            gemini_api_version: GEMINI_DEFAULT_API_VERSION.to_string(),
            gemini_endpoint: None,
            allow_insecure_endpoint: false,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECONDS,
            connect_retries: DEFAULT_CONNECT_RETRIES,
            handshake_timeout_seconds: DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
            system_instruction: None,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from environment variables and defaults only.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;

        validation::validate_config(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// The Google API key, or an error naming the missing setting.
    pub fn get_api_key(&self) -> Result<String, String> {
        match self.google_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key.to_string()),
            _ => Err(
                "Google API key not configured. Set GOOGLE_API_KEY or gemini.api_key".to_string(),
            ),
        }
    }

    /// Upstream connection settings.
    pub fn gemini_config(&self) -> Result<GeminiLiveConfig, String> {
        Ok(GeminiLiveConfig {
            api_key: self.get_api_key()?,
            api_version: self.gemini_api_version.clone(),
            endpoint: self.gemini_endpoint.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            retry: RetryConfig {
                max_retries: self.connect_retries,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Per-session settings for the coordinator.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.gemini_model.clone(),
            system_instruction: self
                .system_instruction
                .as_deref()
                .filter(|instruction| !instruction.trim().is_empty())
                .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
                .to_string(),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "UNIX_SOCKET_PATH",
        "UNIX_SOCKET_MODE",
        "STATIC_DIR",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "GOOGLE_API_KEY",
        "GEMINI_MODEL",
        "GEMINI_API_VERSION",
        "GEMINI_ENDPOINT",
        "GEMINI_ALLOW_INSECURE_ENDPOINT",
        "GEMINI_CONNECT_TIMEOUT_SECONDS",
        "GEMINI_CONNECT_RETRIES",
        "HANDSHAKE_TIMEOUT_SECONDS",
        "SYSTEM_INSTRUCTION",
        "CORS_ALLOWED_ORIGINS",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
        }
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.unix_socket_path, default_unix_socket_path());
        assert_eq!(config.unix_socket_mode, 0o777);
        assert_eq!(config.static_dir, PathBuf::from("./"));
        assert!(!config.is_tls_enabled());
        assert_eq!(config.gemini_model, "gemini-2.0-flash-exp");
        assert_eq!(config.gemini_api_version, "v1alpha");
        assert_eq!(config.connect_timeout_seconds, 300);
        assert_eq!(config.connect_retries, 3);
        assert_eq!(config.handshake_timeout_seconds, 30);
        assert!(config.google_api_key.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "9090");
            env::set_var("GOOGLE_API_KEY", "env-key");
            env::set_var("UNIX_SOCKET_PATH", "");
            env::set_var("UNIX_SOCKET_MODE", "0660");
            env::set_var("GEMINI_CONNECT_RETRIES", "0");
            env::set_var("SYSTEM_INSTRUCTION", "Operator instruction");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.get_api_key().unwrap(), "env-key");
        assert!(config.unix_socket_path.is_none());
        assert_eq!(config.unix_socket_mode, 0o660);
        assert_eq!(config.gemini_config().unwrap().retry.max_retries, 0);
        assert_eq!(
            config.session_settings().system_instruction,
            "Operator instruction"
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_values() {
        cleanup_env_vars();

        unsafe { env::set_var("PORT", "not-a-port") };
        assert!(ServerConfig::from_env().is_err());
        cleanup_env_vars();

        unsafe { env::set_var("PORT", "0") };
        assert!(ServerConfig::from_env().is_err());
        cleanup_env_vars();

        unsafe { env::set_var("TLS_CERT_PATH", "/etc/cert.pem") };
        assert!(ServerConfig::from_env().is_err());
        cleanup_env_vars();

        unsafe { env::set_var("GEMINI_ENDPOINT", "ws://127.0.0.1:9000") };
        assert!(ServerConfig::from_env().is_err());
        unsafe { env::set_var("GEMINI_ALLOW_INSECURE_ENDPOINT", "true") };
        assert!(ServerConfig::from_env().is_ok());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            r#"
server:
  host: "127.0.0.1"
  port: 8081
  static_dir: "/srv/www"
  tls:
    cert_path: "/etc/cert.pem"
    key_path: "/etc/key.pem"

gemini:
  api_key: "yaml-key"
  model: "gemini-live-test"

session:
  handshake_timeout_seconds: 5
"#,
        );

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.address(), "127.0.0.1:8081");
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
        assert!(config.is_tls_enabled());
        assert_eq!(config.get_api_key().unwrap(), "yaml-key");

        let settings = config.session_settings();
        assert_eq!(settings.model, "gemini-live-test");
        assert_eq!(settings.handshake_timeout, Duration::from_secs(5));
        assert_eq!(settings.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            r#"
server:
  host: "127.0.0.1"

gemini:
  api_key: "yaml-key"
"#,
        );

        unsafe {
            env::set_var("HOST", "10.0.0.1");
            env::set_var("PORT", "7000");
            env::set_var("GOOGLE_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.get_api_key().unwrap(), "yaml-key");
        // ENV value kept where YAML is silent
        assert_eq!(config.port, 7000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_blank_system_instruction() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, "session:\n  system_instruction: \"\"\n");

        unsafe {
            env::set_var("SYSTEM_INSTRUCTION", "Operator instruction");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert!(config.system_instruction.is_none());
        assert_eq!(
            config.session_settings().system_instruction,
            DEFAULT_SYSTEM_INSTRUCTION
        );

        let config_path = write_config(&temp_dir, "session:\n  system_instruction: \"  \"\n");
        let settings = ServerConfig::from_file(&config_path).unwrap().session_settings();
        assert!(!settings.system_instruction.trim().is_empty());

        cleanup_env_vars();
    }

    #[test]
    fn test_session_settings_ignore_blank_instruction() {
        let mut config = test_config();
        config.system_instruction = Some(" \n".to_string());
        assert_eq!(
            config.session_settings().system_instruction,
            DEFAULT_SYSTEM_INSTRUCTION
        );
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_socket_mode() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, "server:\n  unix_socket_mode: \"9999\"\n");

        assert!(ServerConfig::from_file(&config_path).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = test_config();
        config.google_api_key = Some("   ".to_string());
        assert!(config.get_api_key().is_err());
        assert!(config.gemini_config().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = test_config();
        config.google_api_key = Some("very-secret".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_gemini_config_mapping() {
        let mut config = test_config();
        config.google_api_key = Some("k".to_string());
        config.gemini_endpoint = Some("ws://127.0.0.1:9000/live".to_string());
        config.connect_timeout_seconds = 12;
        config.connect_retries = 1;

        let gemini = config.gemini_config().unwrap();
        assert_eq!(gemini.api_key, "k");
        assert_eq!(gemini.endpoint.as_deref(), Some("ws://127.0.0.1:9000/live"));
        assert_eq!(gemini.connect_timeout, Duration::from_secs(12));
        assert_eq!(gemini.retry.max_retries, 1);
    }

    fn test_config() -> ServerConfig {
        ServerConfig::default()
    }
}
