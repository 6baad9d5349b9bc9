#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Environment-backed configuration for the pack service.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (default values),
//! `validate.rs` (field parsers), `loader.rs` (environment lookup).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_PREFIX, EnvLookup};
pub use model::{
    EngineKind, EngineSettings, HttpSettings, LogFormatSetting, LogSettings, ServiceConfig,
    StorageSettings,
};
