//! Environment variable readers.
//!
//! Unset variables read as `None`; set but unparseable variables are errors.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Raw value of `name`, if set.
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Value of `name`, treating an empty or whitespace value as unset.
pub(super) fn env_non_empty(name: &str) -> Option<String> {
    env_string(name).filter(|v| !v.trim().is_empty())
}

/// Parse `name` with `FromStr`.
pub(super) fn env_parse<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env_non_empty(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} value '{raw}': {e}")),
        None => Ok(None),
    }
}

/// Parse `name` as a boolean flag.
pub(super) fn env_bool(name: &str) -> Result<Option<bool>, String> {
    match env_non_empty(name) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid {name} value '{raw}': expected true or false")),
        None => Ok(None),
    }
}

pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
