//! Event payload types carried across the service.

use chrono::{DateTime, Utc};
use structura_core::{JobName, JobStatus};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the service.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A conversion request passed validation and was registered.
    JobAccepted {
        /// Identifier assigned to the job.
        job_id: Uuid,
        /// Pack name requested by the caller.
        name: JobName,
    },
    /// A job moved into a new lifecycle state.
    JobStateChanged {
        /// Identifier for the job.
        job_id: Uuid,
        /// Pack name of the job.
        name: JobName,
        /// State the job entered.
        status: JobStatus,
    },
    /// Artifacts were relocated into the job's final directory.
    JobReady {
        /// Identifier for the job.
        job_id: Uuid,
        /// Pack name of the job.
        name: JobName,
        /// Location of the relocated `.mcpack` bundle.
        bundle_path: String,
    },
    /// Conversion or relocation failed.
    JobFailed {
        /// Identifier for the job.
        job_id: Uuid,
        /// Pack name of the job.
        name: JobName,
        /// Human-readable failure description.
        message: String,
    },
    /// Retention elapsed and the final directory was reclaimed.
    JobExpired {
        /// Pack name whose directory was removed.
        name: JobName,
    },
    /// Component health changed; lists currently degraded components.
    HealthChanged {
        /// Names of degraded components.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for log and stream consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobAccepted { .. } => "job_accepted",
            Self::JobStateChanged { .. } => "job_state_changed",
            Self::JobReady { .. } => "job_ready",
            Self::JobFailed { .. } => "job_failed",
            Self::JobExpired { .. } => "job_expired",
            Self::HealthChanged { .. } => "health_changed",
        }
    }

    /// Pack name the event refers to, if any.
    #[must_use]
    pub const fn job_name(&self) -> Option<&JobName> {
        match self {
            Self::JobAccepted { name, .. }
            | Self::JobStateChanged { name, .. }
            | Self::JobReady { name, .. }
            | Self::JobFailed { name, .. }
            | Self::JobExpired { name } => Some(name),
            Self::HealthChanged { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event.
    pub event: Event,
}
