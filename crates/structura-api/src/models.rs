//! Request and response DTOs for the HTTP surface.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use structura_core::{ConversionRequest, Job, JobStatus, Offset};
use structura_telemetry::MetricsSnapshot;
use uuid::Uuid;

use crate::http::constants::JOBS_ROUTE_PREFIX;

/// RFC 9457 problem document returned for every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, constant summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Request fields that failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer to the offending field.
    pub pointer: String,
    /// Why the field was rejected.
    pub message: String,
}

/// Body of `POST /v1/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateJobRequest {
    /// Job name; becomes the pack name and final directory name.
    #[serde(default)]
    pub name: String,
    /// Structure file on the server's filesystem.
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    /// Model offset as `[x, y, z]`.
    #[serde(default)]
    pub offset: [i32; 3],
    /// Opacity percentage in `0..=100`.
    #[serde(default = "default_opacity")]
    pub opacity: i64,
}

const fn default_opacity() -> i64 {
    100
}

impl From<CreateJobRequest> for ConversionRequest {
    fn from(request: CreateJobRequest) -> Self {
        Self {
            name: request.name,
            source: request.source_path,
            offset: Offset::from(request.offset),
            opacity_percent: request.opacity,
        }
    }
}

/// Where a ready job's artifacts live and how to fetch them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactLinks {
    /// Bundle file name.
    pub bundle_file: String,
    /// Bundle path on the server.
    pub bundle_path: String,
    /// Download route for the bundle.
    pub bundle_url: String,
    /// Block list file name when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_file: Option<String>,
    /// Block list path on the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    /// Download route for the block list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
}

/// Public view of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    /// Job identifier.
    pub id: Uuid,
    /// Job name.
    pub name: String,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest transition.
    pub updated_at: DateTime<Utc>,
    /// Artifact references while the job is ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactLinks>,
    /// Failure description for failed jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        let route = format!(
            "{JOBS_ROUTE_PREFIX}/{}",
            job.name.as_str().replace(' ', "%20")
        );
        let artifacts = job.artifacts.as_ref().map(|refs| ArtifactLinks {
            bundle_file: file_name(&refs.bundle_path),
            bundle_path: refs.bundle_path.display().to_string(),
            bundle_url: format!("{route}/bundle"),
            manifest_file: refs.manifest_path.as_deref().map(file_name),
            manifest_path: refs
                .manifest_path
                .as_ref()
                .map(|path| path.display().to_string()),
            manifest_url: refs
                .manifest_path
                .as_ref()
                .map(|_| format!("{route}/manifest")),
        });
        Self {
            id: job.id,
            name: job.name.to_string(),
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            artifacts,
            failure: job.failure.clone(),
        }
    }
}

pub(crate) fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned())
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Build identifier.
    pub build: String,
    /// Components currently degraded.
    pub degraded: Vec<String>,
    /// Lifecycle counters.
    pub metrics: HealthMetrics,
}

/// Counters surfaced on the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthMetrics {
    /// Final directories awaiting reclamation.
    pub live_jobs: i64,
    /// Final directories reclaimed.
    pub artifacts_expired_total: u64,
    /// Reclamations that failed.
    pub retention_failures_total: u64,
}

impl From<MetricsSnapshot> for HealthMetrics {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            live_jobs: snapshot.live_jobs,
            artifacts_expired_total: snapshot.artifacts_expired_total,
            retention_failures_total: snapshot.retention_failures_total,
        }
    }
}
