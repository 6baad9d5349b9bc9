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
#![allow(clippy::module_name_repetitions)]

//! Conversion engine adapters.
//!
//! Both adapters follow the same call protocol enforced by
//! [`structura_core::EngineProtocol`] and only differ in how `compile` lands
//! the bundle in the working root.

/// External converter program driven through its command line.
pub mod command;
mod params;
/// Built-in engine that writes zip-format packs without voxelizing.
pub mod stub;

pub use command::{CommandEngine, CommandEngineFactory};
pub use params::PackParams;
pub use stub::{StubEngine, StubEngineFactory};
