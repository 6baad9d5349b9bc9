//! Service seam between the job lifecycle and its callers.

use async_trait::async_trait;

use crate::error::JobResult;
use crate::model::{ConversionRequest, Job, JobName};

/// Submits conversion jobs and reports on them.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Validate, convert and relocate one request, returning the ready job.
    ///
    /// Retention is armed before this returns.
    async fn submit(&self, request: ConversionRequest) -> JobResult<Job>;

    /// Latest snapshot of the job registered under `name`.
    async fn job(&self, name: &JobName) -> Option<Job>;

    /// Components currently reporting degraded health.
    fn degraded_components(&self) -> Vec<String> {
        Vec::new()
    }
}
