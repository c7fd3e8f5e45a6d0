//! Configuration validation.

use std::path::PathBuf;

use super::{ServerConfig, TlsConfig};
use crate::utils::validate_upstream_url;

/// TLS needs both paths or neither.
pub(crate) fn validate_tls_paths(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, String> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err("TLS certificate path is set but the key path is missing".to_string()),
        (None, Some(_)) => Err("TLS key path is set but the certificate path is missing".to_string()),
    }
}

pub(crate) fn validate_port(port: u16) -> Result<(), String> {
    if port == 0 {
        return Err("Port must be non-zero".to_string());
    }
    Ok(())
}

pub(crate) fn validate_endpoint(endpoint: &Option<String>, allow_insecure: bool) -> Result<(), String> {
    if let Some(endpoint) = endpoint {
        validate_upstream_url(endpoint, allow_insecure)
            .map_err(|e| format!("Invalid GEMINI_ENDPOINT: {e}"))?;
    }
    Ok(())
}

pub(crate) fn validate_timeouts(config: &ServerConfig) -> Result<(), String> {
    if config.connect_timeout_seconds == 0 {
        return Err("connect_timeout_seconds must be greater than zero".to_string());
    }
    if config.handshake_timeout_seconds == 0 {
        return Err("handshake_timeout_seconds must be greater than zero".to_string());
    }
    Ok(())
}

/// Run every check on a fully merged configuration.
pub(crate) fn validate_config(config: &ServerConfig) -> Result<(), String> {
    validate_port(config.port)?;
    validate_endpoint(&config.gemini_endpoint, config.allow_insecure_endpoint)?;
    validate_timeouts(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_paths_pairing() {
        assert!(validate_tls_paths(None, None).unwrap().is_none());
        assert!(
            validate_tls_paths(Some("c.pem".to_string()), Some("k.pem".to_string()))
                .unwrap()
                .is_some()
        );
        assert!(validate_tls_paths(Some("c.pem".to_string()), None).is_err());
        assert!(validate_tls_paths(None, Some("k.pem".to_string())).is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(validate_port(0).is_err());
        assert!(validate_port(8080).is_ok());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint(&None, false).is_ok());
        assert!(validate_endpoint(&Some("wss://proxy.example.com/live".to_string()), false).is_ok());
        assert!(validate_endpoint(&Some("ws://127.0.0.1:9000".to_string()), false).is_err());
        assert!(validate_endpoint(&Some("ws://127.0.0.1:9000".to_string()), true).is_ok());
        assert!(validate_endpoint(&Some("http://example.com".to_string()), true).is_err());
    }
}
