//! Domain models for pack conversion jobs.
//!
//! # Design
//! - `ConversionRequest` is the raw, caller-supplied shape; validation turns it
//!   into typed values (`JobName`, `Opacity`) before any work starts.
//! - `Job` owns its status machine; illegal transitions are errors, not panics.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Maximum length of a job name in bytes.
pub const MAX_JOB_NAME_LEN: usize = 64;

/// File extension of the compiled pack bundle.
pub const BUNDLE_EXTENSION: &str = "mcpack";

static JOB_NAME_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9 _.\-]*[A-Za-z0-9_.\-])?$").ok());

/// Filesystem-safe job identifier, also used as the engine's pack name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobName(String);

impl JobName {
    /// Validate and wrap a job name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidJobName`] when the value is empty, too long,
    /// or contains characters outside `[A-Za-z0-9 _.-]` (including a leading
    /// symbol or surrounding whitespace).
    pub fn parse(value: &str) -> CoreResult<Self> {
        if value.is_empty() {
            return Err(CoreError::InvalidJobName {
                reason: "must not be empty",
                value: value.to_string(),
            });
        }
        if value.len() > MAX_JOB_NAME_LEN {
            return Err(CoreError::InvalidJobName {
                reason: "must be at most 64 characters",
                value: value.to_string(),
            });
        }
        if !JOB_NAME_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(value))
        {
            return Err(CoreError::InvalidJobName {
                reason: "must start with a letter or digit and contain only letters, digits, spaces, '_', '-' or '.'",
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the bundle the engine writes into the working root.
    #[must_use]
    pub fn staged_bundle_file(&self) -> String {
        format!("{}.{BUNDLE_EXTENSION}", self.0)
    }

    /// File name of the block list the engine writes into the working root.
    #[must_use]
    pub fn staged_manifest_file(&self) -> String {
        format!("{}- block list.txt", self.0)
    }

    /// Normalised bundle file name inside the final directory.
    #[must_use]
    pub fn final_bundle_file(&self) -> String {
        self.staged_bundle_file()
    }

    /// Normalised block list file name inside the final directory.
    #[must_use]
    pub fn final_manifest_file(&self) -> String {
        format!("{}-block_list.txt", self.0)
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for JobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for JobName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Spatial offset applied to the model, in blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    /// X axis offset.
    pub x: i32,
    /// Y axis offset.
    pub y: i32,
    /// Z axis offset.
    pub z: i32,
}

impl Offset {
    /// Construct an offset from its three components.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Components in `[x, y, z]` order.
    #[must_use]
    pub const fn as_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[i32; 3]> for Offset {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Opacity expressed as a whole percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Opacity(u8);

impl Opacity {
    /// Fully opaque.
    pub const OPAQUE: Self = Self(100);

    /// Validate a percentage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OpacityOutOfRange`] outside `0..=100`.
    pub fn from_percent(percent: i64) -> CoreResult<Self> {
        u8::try_from(percent)
            .ok()
            .filter(|value| *value <= 100)
            .map(Self)
            .ok_or(CoreError::OpacityOutOfRange { value: percent })
    }

    /// Percentage as supplied by the caller.
    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Fractional transparency handed to the engine: `(100 - percent) / 100`.
    #[must_use]
    pub fn transparency(self) -> f64 {
        f64::from(100 - self.0) / 100.0
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// Raw conversion request as received from a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Requested job name; becomes the pack name and final directory name.
    pub name: String,
    /// Structure file to convert.
    pub source: Option<PathBuf>,
    /// Spatial offset of the model.
    #[serde(default)]
    pub offset: Offset,
    /// Opacity percentage, expected in `0..=100`.
    #[serde(default = "default_opacity_percent")]
    pub opacity_percent: i64,
}

const fn default_opacity_percent() -> i64 {
    100
}

impl ConversionRequest {
    /// Build a request with default offset and full opacity.
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: Some(source.into()),
            offset: Offset::default(),
            opacity_percent: default_opacity_percent(),
        }
    }

    /// Replace the offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = offset;
        self
    }

    /// Replace the opacity percentage.
    #[must_use]
    pub const fn with_opacity(mut self, percent: i64) -> Self {
        self.opacity_percent = percent;
        self
    }
}

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Request admitted and being validated.
    Validating,
    /// Engine call sequence in progress.
    Converting,
    /// Moving engine output into the final directory.
    Relocating,
    /// Artifacts available; expiry armed.
    Ready,
    /// Final directory reclaimed.
    Expired,
    /// Terminal failure before the job became ready.
    Failed,
}

impl JobStatus {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Converting => "converting",
            Self::Relocating => "relocating",
            Self::Ready => "ready",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Whether a job in this state still holds its name reservation while work runs.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Validating | Self::Converting | Self::Relocating)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Validating, Self::Converting)
                | (Self::Converting, Self::Relocating)
                | (Self::Relocating, Self::Ready)
                | (Self::Ready, Self::Expired)
                | (
                    Self::Validating | Self::Converting | Self::Relocating,
                    Self::Failed
                )
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// References to a ready job's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRefs {
    /// Path of the relocated bundle; always present.
    pub bundle_path: PathBuf,
    /// Path of the relocated block list when the engine produced one.
    pub manifest_path: Option<PathBuf>,
}

/// One conversion lifecycle instance.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Unique identifier for correlating logs and events.
    pub id: Uuid,
    /// Job name.
    pub name: JobName,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent transition.
    pub updated_at: DateTime<Utc>,
    /// Shared working root the engine writes into.
    pub working_dir: PathBuf,
    /// Job-scoped final directory.
    pub final_dir: PathBuf,
    /// Artifact references once the job is ready.
    pub artifacts: Option<ArtifactRefs>,
    /// Failure description for failed jobs.
    pub failure: Option<String>,
}

impl Job {
    /// Create a job in the `Validating` state.
    #[must_use]
    pub fn new(name: JobName, working_dir: PathBuf, final_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            status: JobStatus::Validating,
            created_at: now,
            updated_at: now,
            working_dir,
            final_dir,
            artifacts: None,
            failure: None,
        }
    }

    /// Move the job to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] when the state machine forbids it.
    pub fn transition(&mut self, next: JobStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job ready with its artifact references.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the job is relocating.
    pub fn mark_ready(&mut self, artifacts: ArtifactRefs) -> CoreResult<()> {
        self.transition(JobStatus::Ready)?;
        self.artifacts = Some(artifacts);
        Ok(())
    }

    /// Mark the job failed with a description.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] when the job is already ready or terminal.
    pub fn mark_failed(&mut self, failure: impl Into<String>) -> CoreResult<()> {
        self.transition(JobStatus::Failed)?;
        self.failure = Some(failure.into());
        Ok(())
    }

    /// Mark the job expired and drop its artifact references.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the job is ready.
    pub fn mark_expired(&mut self) -> CoreResult<()> {
        self.transition(JobStatus::Expired)?;
        self.artifacts = None;
        Ok(())
    }
}
