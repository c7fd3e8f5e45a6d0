//! Layering of YAML values over the environment configuration.

use std::path::PathBuf;

use super::env::load_from_env;
use super::utils::parse_octal_mode;
use super::validation::validate_tls_paths;
use super::yaml::YamlConfig;
use super::ServerConfig;

/// Environment (with defaults) as the base, YAML values on top.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(path) = server.unix_socket_path {
            config.unix_socket_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(mode) = server.unix_socket_mode {
            config.unix_socket_mode = parse_octal_mode(&mode)?;
        }
        if let Some(dir) = server.static_dir {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(tls) = server.tls {
            config.tls = if tls.enabled == Some(false) {
                None
            } else {
                validate_tls_paths(tls.cert_path, tls.key_path)?
            };
        }
    }

    if let Some(gemini) = yaml.gemini {
        if let Some(key) = gemini.api_key {
            config.google_api_key = Some(key);
        }
        if let Some(model) = gemini.model {
            config.gemini_model = model;
        }
        if let Some(version) = gemini.api_version {
            config.gemini_api_version = version;
        }
        if let Some(endpoint) = gemini.endpoint {
            config.gemini_endpoint = Some(endpoint);
        }
        if let Some(allow) = gemini.allow_insecure_endpoint {
            config.allow_insecure_endpoint = allow;
        }
        if let Some(timeout) = gemini.connect_timeout_seconds {
            config.connect_timeout_seconds = timeout;
        }
        if let Some(retries) = gemini.connect_retries {
            config.connect_retries = retries;
        }
    }

    if let Some(session) = yaml.session {
        if let Some(timeout) = session.handshake_timeout_seconds {
            config.handshake_timeout_seconds = timeout;
        }
        if let Some(instruction) = session.system_instruction {
            // Blank falls back to the built-in instruction
            config.system_instruction = if instruction.trim().is_empty() {
                None
            } else {
                Some(instruction)
            };
        }
    }

    if let Some(security) = yaml.security
        && let Some(origins) = security.cors_allowed_origins
    {
        config.cors_allowed_origins = Some(origins);
    }

    Ok(config)
}
