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

//! HTTP surface for the Structura pack service.
//!
//! Layout: `http/` (router, handlers, event feed, problem responses, metrics middleware),
//! `models.rs` (request and response DTOs), `state.rs` (shared handler state),
//! `error.rs` (server bootstrap errors).

pub mod error;
pub mod http;
pub mod models;
pub(crate) mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{
    ArtifactLinks, CreateJobRequest, HealthMetrics, HealthResponse, JobSummary, ProblemDetails,
    ProblemInvalidParam,
};
