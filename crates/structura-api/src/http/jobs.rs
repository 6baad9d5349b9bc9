//! Job submission, inspection and artifact downloads.

use std::io;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path as RoutePath, State, rejection::JsonRejection},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::Response,
};
use structura_core::{ConversionRequest, Job, JobName, JobStatus};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use crate::http::constants::{CONTENT_TYPE_BUNDLE, CONTENT_TYPE_MANIFEST};
use crate::http::errors::ApiError;
use crate::models::{CreateJobRequest, JobSummary, file_name};
use crate::state::ApiState;

/// `POST /v1/jobs`: run a conversion to completion and return the ready job.
pub(crate) async fn create_job(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<JobSummary>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let job = state
        .jobs
        .submit(ConversionRequest::from(request))
        .await
        .map_err(ApiError::from)?;
    info!(job = %job.name, job_id = %job.id, "job created");
    Ok((StatusCode::CREATED, Json(JobSummary::from(&job))))
}

/// `GET /v1/jobs/{name}`.
pub(crate) async fn get_job(
    State(state): State<Arc<ApiState>>,
    RoutePath(name): RoutePath<String>,
) -> Result<Json<JobSummary>, ApiError> {
    let job = lookup(&state, &name).await?;
    Ok(Json(JobSummary::from(&job)))
}

/// `GET /v1/jobs/{name}/bundle`.
pub(crate) async fn download_bundle(
    State(state): State<Arc<ApiState>>,
    RoutePath(name): RoutePath<String>,
) -> Result<Response, ApiError> {
    let job = lookup(&state, &name).await?;
    let artifacts = job
        .artifacts
        .filter(|_| job.status == JobStatus::Ready)
        .ok_or_else(|| ApiError::not_found(format!("job '{name}' has no artifacts")))?;
    stream_file(&artifacts.bundle_path, CONTENT_TYPE_BUNDLE).await
}

/// `GET /v1/jobs/{name}/manifest`.
pub(crate) async fn download_manifest(
    State(state): State<Arc<ApiState>>,
    RoutePath(name): RoutePath<String>,
) -> Result<Response, ApiError> {
    let job = lookup(&state, &name).await?;
    let manifest = job
        .artifacts
        .filter(|_| job.status == JobStatus::Ready)
        .and_then(|artifacts| artifacts.manifest_path)
        .ok_or_else(|| ApiError::not_found(format!("job '{name}' has no block list")))?;
    stream_file(&manifest, CONTENT_TYPE_MANIFEST).await
}

async fn lookup(state: &ApiState, raw: &str) -> Result<Job, ApiError> {
    let not_found = || ApiError::not_found(format!("job '{raw}' not found"));
    let name = JobName::parse(raw).map_err(|_| not_found())?;
    state.jobs.job(&name).await.ok_or_else(not_found)
}

async fn stream_file(path: &Path, content_type: &'static str) -> Result<Response, ApiError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("artifact is no longer available"));
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to open artifact");
            return Err(ApiError::internal("failed to open artifact"));
        }
    };
    let disposition = format!("attachment; filename=\"{}\"", file_name(path));
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|err| {
            error!(error = %err, "failed to build artifact response");
            ApiError::internal("failed to build artifact response")
        })
}
