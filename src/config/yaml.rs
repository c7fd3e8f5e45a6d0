use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   unix_socket_path: "/tmp/gemini-screen.sock"
///   unix_socket_mode: "0777"
///   static_dir: "./public"
///   tls:
///     cert_path: "/etc/ssl/cert.pem"
///     key_path: "/etc/ssl/key.pem"
///
/// gemini:
///   api_key: "your-google-api-key"
///   model: "gemini-2.0-flash-exp"
///   api_version: "v1alpha"
///   endpoint: "wss://proxy.example.com/live"
///   allow_insecure_endpoint: false
///   connect_timeout_seconds: 300
///   connect_retries: 3
///
/// session:
///   handshake_timeout_seconds: 30
///   system_instruction: "You are a helpful assistant..."
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub session: Option<SessionYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Empty string disables the Unix socket listener
    pub unix_socket_path: Option<String>,
    /// Octal permission bits, e.g. "0777" or "660"
    pub unix_socket_mode: Option<String>,
    pub static_dir: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Gemini Live upstream settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
    pub endpoint: Option<String>,
    pub allow_insecure_endpoint: Option<bool>,
    pub connect_timeout_seconds: Option<u64>,
    pub connect_retries: Option<u32>,
}

/// Per-session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub handshake_timeout_seconds: Option<u64>,
    pub system_instruction: Option<String>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
