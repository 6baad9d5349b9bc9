//! Field parsers for environment values.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::defaults::MAX_RETENTION_SECS;
use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_port(field: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, value, "must be an integer"))?;
    if !(1..=65_535).contains(&port) {
        return Err(ConfigError::invalid(
            field,
            value,
            "must be between 1 and 65535",
        ));
    }
    u16::try_from(port).map_err(|_| ConfigError::invalid(field, value, "must fit in 16 bits"))
}

pub(crate) fn parse_bind_addr(field: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::invalid(field, value, "must be an IPv4 or IPv6 address"))
}

pub(crate) fn parse_retention(field: &'static str, value: &str) -> ConfigResult<Duration> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, value, "must be a whole number of seconds"))?;
    if secs == 0 || secs > MAX_RETENTION_SECS {
        return Err(ConfigError::invalid(
            field,
            value,
            "must be between 1 and 86400 seconds",
        ));
    }
    Ok(Duration::from_secs(secs))
}

pub(crate) fn parse_dir(field: &'static str, value: &str) -> ConfigResult<PathBuf> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, value, "must not be empty"));
    }
    Ok(PathBuf::from(value))
}

pub(crate) fn parse_level(field: &'static str, value: &str) -> ConfigResult<String> {
    let level = value.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
        _ => Err(ConfigError::invalid(
            field,
            value,
            "must be one of trace, debug, info, warn, error",
        )),
    }
}
