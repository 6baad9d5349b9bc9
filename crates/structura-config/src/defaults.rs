//! Default values applied when an environment variable is absent.
//!
//! # Design
//! - Centralize defaults so the loader and tests agree.
//! - Keep time-based defaults explicit for auditability.

/// Root directory holding one final directory per ready job.
pub(crate) const ASSETS_ROOT: &str = "assets";
/// Only structure files under this root are accepted as sources.
pub(crate) const SOURCES_ROOT: &str = "structures";
/// Shared working root the engine writes into.
pub(crate) const WORKING_ROOT: &str = ".";
/// Retention window for final directories, in seconds.
pub(crate) const RETENTION_SECS: u64 = 300;
/// Upper bound for the retention window, in seconds.
pub(crate) const MAX_RETENTION_SECS: u64 = 86_400;
/// HTTP bind address.
pub(crate) const BIND_ADDR: &str = "127.0.0.1";
/// HTTP port.
pub(crate) const HTTP_PORT: u16 = 7070;
/// Default log filter level.
pub(crate) const LOG_LEVEL: &str = "info";
