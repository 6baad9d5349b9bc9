//! Artifact placement and reclamation for converted packs.
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

pub mod error;
pub mod layout;
pub mod service;

pub use error::{FsOpsError, FsOpsResult};
pub use layout::ArtifactLayout;
pub use service::{ArtifactStore, Removal};
