//! # Design
//!
//! - Constant error messages; context travels in fields.
//! - Engine errors carry the step or program involved so callers can report
//!   which part of the fixed call sequence failed.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::ConversionStep;
use crate::model::JobStatus;

/// Result alias for domain model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result alias for conversion engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result alias for job submissions.
pub type JobResult<T> = Result<T, JobError>;

/// Errors raised while constructing or mutating domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Job name failed validation.
    #[error("invalid job name")]
    InvalidJobName {
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
    /// The source file resolves outside the configured structures root.
    #[error("source file is outside the structures root")]
    SourceOutsideRoot {
        /// Path as supplied.
        path: PathBuf,
    },
    /// Opacity percent lies outside `0..=100`.
    #[error("opacity out of range")]
    OpacityOutOfRange {
        /// Offending value.
        value: i64,
    },
    /// A job attempted a transition its state machine does not allow.
    #[error("invalid job status transition")]
    InvalidTransition {
        /// Status the job was in.
        from: JobStatus,
        /// Status that was requested.
        to: JobStatus,
    },
}

/// Errors surfaced by conversion engine implementations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A call arrived out of the fixed protocol order.
    #[error("engine call out of sequence")]
    OutOfSequence {
        /// Step the protocol expected next, `None` once compilation finished.
        expected: Option<ConversionStep>,
        /// Step that was attempted.
        actual: ConversionStep,
    },
    /// A model key was referenced before it was registered.
    #[error("unknown model key")]
    UnknownModel {
        /// Offending key.
        key: String,
    },
    /// A parameter passed to the engine was rejected.
    #[error("invalid engine parameter")]
    InvalidParameter {
        /// Parameter name.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Filesystem failure inside the engine.
    #[error("engine io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// External converter process exited unsuccessfully.
    #[error("converter process failed")]
    ProcessFailed {
        /// Program that was executed.
        program: String,
        /// Exit code when the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error, truncated.
        stderr: String,
    },
    /// `compile` reported success but left no bundle behind.
    #[error("engine produced no bundle")]
    MissingOutput {
        /// Path where the bundle was expected.
        path: PathBuf,
    },
    /// Any other engine-specific failure.
    #[error("engine operation failed")]
    Failed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl EngineError {
    /// Build an IO variant with operation context.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an arbitrary engine failure.
    pub fn failed(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Failed {
            operation,
            source: source.into(),
        }
    }
}

/// Reasons a conversion request is refused before any work starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestRejection {
    /// No job name was supplied.
    #[error("job name is missing")]
    MissingName,
    /// The job name is not safe to use as a directory name.
    #[error("job name is not filesystem-safe")]
    InvalidName {
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
    /// No source structure file was supplied.
    #[error("source file is missing")]
    MissingInput,
    /// The source reference does not name an existing regular file.
    #[error("source file not found")]
    SourceNotFound {
        /// Path as supplied.
        path: PathBuf,
    },
    /// The source file resolves outside the configured structures root.
    #[error("source file is outside the structures root")]
    SourceOutsideRoot {
        /// Path as supplied.
        path: PathBuf,
    },
    /// Opacity percent lies outside `0..=100`.
    #[error("opacity out of range")]
    OpacityOutOfRange {
        /// Offending value.
        value: i64,
    },
    /// A final directory or an in-flight job already holds the name.
    #[error("job name already in use")]
    AlreadyExists {
        /// Conflicting name.
        name: String,
    },
}

impl RequestRejection {
    /// Request field the rejection refers to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingName | Self::InvalidName { .. } | Self::AlreadyExists { .. } => "name",
            Self::MissingInput | Self::SourceNotFound { .. } | Self::SourceOutsideRoot { .. } => {
                "source_path"
            }
            Self::OpacityOutOfRange { .. } => "opacity",
        }
    }
}

/// Terminal failures of a job submission.
#[derive(Debug, Error)]
pub enum JobError {
    /// The request was refused by validation; nothing was touched.
    #[error("invalid conversion request")]
    InvalidRequest {
        /// Validation outcome.
        #[from]
        source: RequestRejection,
    },
    /// An engine step failed or produced no bundle.
    #[error("conversion failed")]
    ConversionFailure {
        /// Step that failed.
        step: ConversionStep,
        /// Engine error.
        #[source]
        source: EngineError,
    },
    /// Moving artifacts into their final directory failed.
    #[error("artifact relocation failed")]
    RelocationFailure {
        /// Filesystem operation that failed.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The worker running the job stopped before reporting an outcome.
    #[error("job execution interrupted")]
    Interrupted {
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl JobError {
    /// Validation rejection carried by this error, if any.
    #[must_use]
    pub const fn rejection(&self) -> Option<&RequestRejection> {
        match self {
            Self::InvalidRequest { source } => Some(source),
            _ => None,
        }
    }
}
