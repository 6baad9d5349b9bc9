//! In-memory job service for handler tests.

use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use structura_core::{
    ArtifactRefs, ConversionRequest, ConversionStep, EngineError, Job, JobError, JobName,
    JobResult, JobService, JobStatus, RequestRejection,
};
use structura_events::EventBus;
use structura_telemetry::Metrics;

use crate::state::ApiState;

#[derive(Default)]
pub(crate) struct StaticJobs {
    jobs: Mutex<HashMap<JobName, Job>>,
    degraded: Vec<String>,
    failure: Option<ConversionStep>,
}

impl StaticJobs {
    pub(crate) fn degraded(components: &[&str]) -> Self {
        Self {
            degraded: components.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn failing_at(step: ConversionStep) -> Self {
        Self {
            failure: Some(step),
            ..Self::default()
        }
    }

    pub(crate) fn with_job(self, job: Job) -> Self {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.name.clone(), job);
        self
    }
}

#[async_trait]
impl JobService for StaticJobs {
    async fn submit(&self, request: ConversionRequest) -> JobResult<Job> {
        if request.name.trim().is_empty() {
            return Err(RequestRejection::MissingName.into());
        }
        let name = JobName::parse(&request.name).map_err(|_| RequestRejection::InvalidName {
            reason: "invalid",
            value: request.name.clone(),
        })?;
        let source = request.source.ok_or(RequestRejection::MissingInput)?;
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&name) {
            return Err(RequestRejection::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }
        if let Some(step) = self.failure {
            return Err(JobError::ConversionFailure {
                step,
                source: EngineError::MissingOutput { path: source },
            });
        }
        let dir = source.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        let job = ready(name, dir, source, None)?;
        jobs.insert(job.name.clone(), job.clone());
        drop(jobs);
        Ok(job)
    }

    async fn job(&self, name: &JobName) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn degraded_components(&self) -> Vec<String> {
        self.degraded.clone()
    }
}

fn ready(
    name: JobName,
    dir: PathBuf,
    bundle_path: PathBuf,
    manifest_path: Option<PathBuf>,
) -> JobResult<Job> {
    let mut job = Job::new(name, dir.clone(), dir);
    let advance = |job: &mut Job| -> Result<(), structura_core::CoreError> {
        job.transition(JobStatus::Converting)?;
        job.transition(JobStatus::Relocating)?;
        job.mark_ready(ArtifactRefs {
            bundle_path,
            manifest_path,
        })
    };
    advance(&mut job).map_err(|err| JobError::Interrupted {
        source: Box::new(err),
    })?;
    Ok(job)
}

/// Ready job whose artifacts are written under `dir`.
pub(crate) fn ready_job(
    name: &str,
    dir: &Path,
    with_manifest: bool,
) -> Result<Job, Box<dyn Error>> {
    let name = JobName::parse(name)?;
    let bundle = dir.join(name.final_bundle_file());
    fs::write(&bundle, b"PK-bundle")?;
    let manifest = if with_manifest {
        let path = dir.join(name.final_manifest_file());
        fs::write(&path, b"stone 12\n")?;
        Some(path)
    } else {
        None
    };
    Ok(ready(name, dir.to_path_buf(), bundle, manifest)?)
}

pub(crate) fn state_with(jobs: StaticJobs) -> Result<Arc<ApiState>, Box<dyn Error>> {
    Ok(Arc::new(ApiState::new(
        Arc::new(jobs),
        EventBus::with_capacity(16),
        Metrics::new()?,
    )))
}
