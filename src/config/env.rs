//! Configuration from environment variables.
//!
//! `.env` values are already in the process environment by the time this
//! runs (`dotenvy` is called from `main`).

use std::path::PathBuf;

use super::utils::{env_bool, env_parse, env_var, parse_octal_mode};
use super::validation::validate_tls_paths;
use super::{
    DEFAULT_CONNECT_RETRIES, DEFAULT_CONNECT_TIMEOUT_SECONDS, DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_STATIC_DIR, DEFAULT_UNIX_SOCKET_MODE, ServerConfig,
    default_unix_socket_path,
};
use crate::core::live::gemini::{GEMINI_DEFAULT_API_VERSION, GEMINI_DEFAULT_MODEL};

/// Build a configuration from environment variables and defaults.
pub(crate) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    // An explicitly empty UNIX_SOCKET_PATH disables the listener
    let unix_socket_path = match std::env::var("UNIX_SOCKET_PATH") {
        Ok(raw) if raw.trim().is_empty() => None,
        Ok(raw) => Some(PathBuf::from(raw.trim())),
        Err(_) => default_unix_socket_path(),
    };

    let unix_socket_mode = match env_var("UNIX_SOCKET_MODE") {
        Some(raw) => parse_octal_mode(&raw)?,
        None => DEFAULT_UNIX_SOCKET_MODE,
    };

    let tls = validate_tls_paths(env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH"))?;

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env_parse("PORT")?.unwrap_or(DEFAULT_PORT),
        unix_socket_path,
        unix_socket_mode,
        static_dir: env_var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        tls,
        google_api_key: env_var("GOOGLE_API_KEY"),
        gemini_model: env_var("GEMINI_MODEL").unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
        gemini_api_version: env_var("GEMINI_API_VERSION")
            .unwrap_or_else(|| GEMINI_DEFAULT_API_VERSION.to_string()),
        gemini_endpoint: env_var("GEMINI_ENDPOINT"),
        allow_insecure_endpoint: env_bool("GEMINI_ALLOW_INSECURE_ENDPOINT")?.unwrap_or(false),
        connect_timeout_seconds: env_parse("GEMINI_CONNECT_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS),
        connect_retries: env_parse("GEMINI_CONNECT_RETRIES")?.unwrap_or(DEFAULT_CONNECT_RETRIES),
        handshake_timeout_seconds: env_parse("HANDSHAKE_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_SECONDS),
        system_instruction: env_var("SYSTEM_INSTRUCTION"),
        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
    })
}
