//! Environment lookup helpers shared by every `from_env` constructor.
//!
//! Unlike a bare `.parse().expect(..)`, a malformed value surfaces as
//! [`CoreError::InvalidParameter`] so binaries can log it and exit cleanly.

use std::str::FromStr;

use crate::error::CoreError;

/// String variable with a default. Blank values count as unset.
pub fn env_string(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Optional string variable. Blank values count as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed variable with a default.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match env_opt(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Parsed optional variable.
pub fn env_parse_opt<T: FromStr>(key: &str) -> Result<Option<T>, CoreError> {
    env_opt(key).map(|raw| parse_value(key, &raw)).transpose()
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, CoreError> {
    raw.parse()
        .map_err(|_| CoreError::InvalidParameter(format!("{key} has an invalid value: {raw:?}")))
}
