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

//! Engine-agnostic job model and conversion engine interfaces.
//!
//! Layout: `model/` (requests, jobs, artifacts), `engine/` (engine traits and
//! the call-order guard), `service.rs` (the job service seam), `error.rs`
//! (model, engine and job errors).

pub mod engine;
pub mod error;
pub mod model;
pub mod service;

pub use engine::{
    ConversionEngine, ConversionStep, DEFAULT_MODEL_KEY, EngineFactory, EngineProtocol,
};
pub use error::{
    CoreError, CoreResult, EngineError, EngineResult, JobError, JobResult, RequestRejection,
};
pub use model::{
    ArtifactRefs, BUNDLE_EXTENSION, ConversionRequest, Job, JobName, JobStatus, MAX_JOB_NAME_LEN,
    Offset, Opacity,
};
pub use service::JobService;
