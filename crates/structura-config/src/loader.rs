//! Environment loader for [`ServiceConfig`].
//!
//! # Design
//! - Reads through an injectable lookup so tests never touch process state.
//! - Absent variables fall back to `defaults.rs`; present-but-invalid values fail.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    EngineKind, EngineSettings, HttpSettings, LogFormatSetting, LogSettings, ServiceConfig,
    StorageSettings,
};
use crate::validate::{parse_bind_addr, parse_dir, parse_level, parse_port, parse_retention};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "STRUCTURA_";

const ASSETS_ROOT: &str = "STRUCTURA_ASSETS_ROOT";
const SOURCES_ROOT: &str = "STRUCTURA_SOURCES_ROOT";
const WORKING_ROOT: &str = "STRUCTURA_WORKING_ROOT";
const RETENTION_SECS: &str = "STRUCTURA_RETENTION_SECS";
const BIND_ADDR: &str = "STRUCTURA_BIND_ADDR";
const HTTP_PORT: &str = "STRUCTURA_HTTP_PORT";
const ENGINE: &str = "STRUCTURA_ENGINE";
const ENGINE_COMMAND: &str = "STRUCTURA_ENGINE_COMMAND";
const LOG_LEVEL: &str = "STRUCTURA_LOG_LEVEL";
const LOG_FORMAT: &str = "STRUCTURA_LOG_FORMAT";

/// Source of configuration values keyed by variable name.
pub trait EnvLookup {
    /// Value of `key`, `None` when unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<S: BuildHasher> EnvLookup for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but invalid, or when the
    /// command engine is selected without a program.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Load configuration from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but invalid, or when the
    /// command engine is selected without a program.
    pub fn from_lookup(env: &impl EnvLookup) -> ConfigResult<Self> {
        let storage = StorageSettings {
            assets_root: read_or(env, ASSETS_ROOT, defaults::ASSETS_ROOT, parse_dir)?,
            sources_root: read_or(env, SOURCES_ROOT, defaults::SOURCES_ROOT, parse_dir)?,
            working_root: read_or(env, WORKING_ROOT, defaults::WORKING_ROOT, parse_dir)?,
            retention: match env.get(RETENTION_SECS) {
                Some(value) => parse_retention(RETENTION_SECS, &value)?,
                None => StorageSettings::default().retention,
            },
        };

        let http = HttpSettings {
            bind_addr: read_or(env, BIND_ADDR, defaults::BIND_ADDR, parse_bind_addr)?,
            port: match env.get(HTTP_PORT) {
                Some(value) => parse_port(HTTP_PORT, &value)?,
                None => defaults::HTTP_PORT,
            },
        };

        let kind = env
            .get(ENGINE)
            .map(|value| value.parse::<EngineKind>())
            .transpose()?
            .unwrap_or_default();
        let command = env
            .get(ENGINE_COMMAND)
            .map(|value| parse_dir(ENGINE_COMMAND, &value))
            .transpose()?;
        if kind == EngineKind::Command && command.is_none() {
            return Err(ConfigError::MissingField {
                field: ENGINE_COMMAND,
                required_by: ENGINE,
            });
        }

        let log = LogSettings {
            level: read_or(env, LOG_LEVEL, defaults::LOG_LEVEL, parse_level)?,
            format: env
                .get(LOG_FORMAT)
                .map(|value| value.parse::<LogFormatSetting>())
                .transpose()?,
        };

        let config = Self {
            storage,
            http,
            engine: EngineSettings { kind, command },
            log,
        };
        debug!(
            assets_root = %config.storage.assets_root.display(),
            sources_root = %config.storage.sources_root.display(),
            working_root = %config.storage.working_root.display(),
            retention_secs = config.storage.retention.as_secs(),
            engine = config.engine.kind.as_str(),
            "configuration loaded"
        );
        Ok(config)
    }
}

fn read_or<T>(
    env: &impl EnvLookup,
    field: &'static str,
    default: &str,
    parse: fn(&'static str, &str) -> ConfigResult<T>,
) -> ConfigResult<T> {
    let value = env.get(field);
    parse(field, value.as_deref().unwrap_or(default))
}
