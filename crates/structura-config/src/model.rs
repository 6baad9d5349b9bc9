//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; parsing lives in `validate.rs` and `loader.rs`.
//! - Grouped by concern so each consumer borrows only what it needs.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigError;

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Storage layout and retention.
    pub storage: StorageSettings,
    /// HTTP listener.
    pub http: HttpSettings,
    /// Conversion engine selection.
    pub engine: EngineSettings,
    /// Logging output.
    pub log: LogSettings,
}

/// Where artifacts live and how long they are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root holding one final directory per ready job.
    pub assets_root: PathBuf,
    /// Root every requested source file must resolve under.
    pub sources_root: PathBuf,
    /// Shared working root the engine writes into.
    pub working_root: PathBuf,
    /// Delay between relocation and reclamation of a final directory.
    #[serde(with = "duration_secs")]
    pub retention: Duration,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from(defaults::ASSETS_ROOT),
            sources_root: PathBuf::from(defaults::SOURCES_ROOT),
            working_root: PathBuf::from(defaults::WORKING_ROOT),
            retention: Duration::from_secs(defaults::RETENTION_SECS),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Address the server binds to.
    pub bind_addr: IpAddr,
    /// Port the server binds to.
    pub port: u16,
}

impl HttpSettings {
    /// Socket address combining bind address and port.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            port: defaults::HTTP_PORT,
        }
    }
}

/// Conversion engine implementations the service can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Built-in engine that writes placeholder packs; opt-in for local runs.
    Stub,
    /// External converter program.
    #[default]
    Command,
}

impl EngineKind {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::Command => "command",
        }
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "command" => Ok(Self::Command),
            _ => Err(ConfigError::invalid(
                "STRUCTURA_ENGINE",
                s,
                "must be 'stub' or 'command'",
            )),
        }
    }
}

/// Engine selection and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Selected implementation.
    pub kind: EngineKind,
    /// Converter program for [`EngineKind::Command`].
    pub command: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl FromStr for LogFormatSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid(
                "STRUCTURA_LOG_FORMAT",
                s,
                "must be 'json' or 'pretty'",
            )),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Explicit output format; inferred from the build when `None`.
    pub format: Option<LogFormatSetting>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.storage.assets_root, PathBuf::from("assets"));
        assert_eq!(config.storage.retention, Duration::from_secs(300));
        assert_eq!(config.http.socket_addr().to_string(), "127.0.0.1:7070");
        assert_eq!(config.storage.sources_root, PathBuf::from("structures"));
        assert_eq!(config.engine.kind, EngineKind::Command);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn engine_kind_parses_case_insensitively() {
        assert_eq!("Command".parse::<EngineKind>(), Ok(EngineKind::Command));
        assert_eq!(" stub ".parse::<EngineKind>(), Ok(EngineKind::Stub));
        assert!("native".parse::<EngineKind>().is_err());
        assert_eq!(EngineKind::Command.as_str(), "command");
    }

    #[test]
    fn retention_serializes_as_seconds() {
        let json = serde_json::to_value(StorageSettings::default()).expect("serialize");
        assert_eq!(json["retention"], 300);
    }
}
