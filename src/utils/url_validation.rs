//! Validation of the upstream endpoint override.
//!
//! An overridden Gemini Live endpoint receives the API key in its query
//! string, so it must be a WebSocket URL with a host, use `wss`, and must
//! not point at a private address. Insecure endpoints (`ws`, private hosts)
//! are only accepted when explicitly allowed, for local mocks and proxies.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be ws or wss, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL scheme must be wss unless insecure endpoints are allowed, got: {0}")]
    SecureSchemeRequired(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL points at a private/internal IP address: {0}")]
    PrivateIpDetected(IpAddr),
}

/// Checks if an IPv4 address is private/internal
///
/// Covers loopback, RFC 1918, link-local, broadcast, unspecified,
/// documentation and CGNAT ranges.
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
    {
        return true;
    }
    // Shared address space (CGNAT) 100.64.0.0/10
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0xC0) == 64
}

/// Checks if an IPv6 address is private/internal
pub fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }

    let segments = ip.segments();

    // Link-local (fe80::/10)
    if segments[0] & 0xFFC0 == 0xFE80 {
        return true;
    }
    // Unique local (fc00::/7)
    if segments[0] & 0xFE00 == 0xFC00 {
        return true;
    }

    // IPv4-mapped (::ffff:0:0/96)
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_ipv4(&v4);
    }

    false
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

/// Validate an upstream WebSocket endpoint.
///
/// Hostnames are not resolved; only IP literals are checked against the
/// private ranges.
pub fn validate_upstream_url(raw: &str, allow_insecure: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "wss" => {}
        "ws" if allow_insecure => {}
        "ws" => return Err(UrlValidationError::SecureSchemeRequired("ws".to_string())),
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    let ip = match url.host() {
        None => return Err(UrlValidationError::MissingHost),
        Some(Host::Domain(domain)) if domain.is_empty() => {
            return Err(UrlValidationError::MissingHost);
        }
        Some(Host::Domain(_)) => None,
        Some(Host::Ipv4(v4)) => Some(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => Some(IpAddr::V6(v6)),
    };

    if let Some(ip) = ip
        && !allow_insecure
        && is_private_ip(&ip)
    {
        return Err(UrlValidationError::PrivateIpDetected(ip));
    }

    Ok(url)
}
