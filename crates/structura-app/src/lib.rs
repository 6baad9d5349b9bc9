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

//! Structura job lifecycle: validation, conversion, relocation and retention.
//!
//! Layout: `validator.rs` (request checks), `invoker.rs` (engine call
//! sequence), `orchestrator.rs` (job lifecycle), `registry.rs` (name
//! reservations), `retention.rs` (deferred reclamation), `bootstrap.rs`
//! (service wiring).

/// Service bootstrap and environment loading.
pub mod bootstrap;
/// Application error type.
pub mod error;
/// Engine call sequence for a single job.
pub mod invoker;
/// Job lifecycle coordination.
pub mod orchestrator;
/// In-memory job registry.
pub mod registry;
/// Deferred deletion of final directories.
pub mod retention;
/// Request validation.
pub mod validator;

pub use bootstrap::{Services, run_app, run_app_with, start_services};
pub use error::{AppError, AppResult};
pub use orchestrator::{JobOrchestrator, OrchestratorDeps};
pub use retention::{RetentionContext, RetentionScheduler};
pub use validator::{SourceRoot, ValidatedRequest, validate};
