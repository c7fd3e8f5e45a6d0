//! Parsing helpers shared by the environment and YAML loaders.

use std::env;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset.
pub(crate) fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an environment variable.
pub(crate) fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {raw:?} ({e})")),
        None => Ok(None),
    }
}

/// Read a boolean environment variable.
pub(crate) fn env_bool(name: &str) -> Result<Option<bool>, String> {
    match env_var(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid boolean for {name}: {raw:?}")),
        None => Ok(None),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse Unix permission bits written in octal ("0777", "0o660", "644").
pub(crate) fn parse_octal_mode(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);

    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| format!("Invalid socket mode {raw:?}: expected octal digits"))?;

    if mode > 0o777 {
        return Err(format!("Invalid socket mode {raw:?}: must be at most 0777"));
    }

    Ok(mode)
}
