//! Job orchestrator: validate, convert, relocate, then arm retention.
//!
//! # Design
//! - `submit` is synchronous and runs on the calling thread; the HTTP surface
//!   reaches it through `spawn_blocking`.
//! - Every transition is written back to the registry and published on the
//!   event bus.
//! - Relocation finishes before retention is armed and before references are
//!   returned. Failed jobs never arm retention.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use structura_core::{
    ConversionRequest, EngineFactory, Job, JobError, JobName, JobResult, JobService, JobStatus,
    RequestRejection,
};
use structura_events::{Event, EventBus};
use structura_fsops::ArtifactStore;
use structura_telemetry::{JobOutcome, Metrics};
use tokio::task::{self, JoinHandle};
use tracing::{error, info, warn};

use crate::invoker::ConversionInvoker;
use crate::registry::JobRegistry;
use crate::retention::{RetentionContext, RetentionScheduler};
use crate::validator::{SourceRoot, validate};

const STORAGE_COMPONENT: &str = "fsops";

/// Dependencies required to build a [`JobOrchestrator`].
pub struct OrchestratorDeps {
    /// Engine sessions are opened from this factory.
    pub engine: Arc<dyn EngineFactory>,
    /// Storage for staged and final artifacts.
    pub store: ArtifactStore,
    /// Directory source structure files must resolve under.
    pub sources: SourceRoot,
    /// Shared event bus.
    pub events: EventBus,
    /// Shared metrics registry.
    pub metrics: Metrics,
    /// Delay between relocation and reclamation.
    pub retention: Duration,
}

/// Coordinates the lifecycle of every job in the process.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: ArtifactStore,
    sources: Arc<SourceRoot>,
    invoker: ConversionInvoker,
    registry: Arc<JobRegistry>,
    retention: RetentionScheduler,
    events: EventBus,
    metrics: Metrics,
}

impl JobOrchestrator {
    /// Build the orchestrator and spawn its retention task on the current runtime.
    #[must_use]
    pub fn spawn(deps: OrchestratorDeps) -> (Self, JoinHandle<()>) {
        let OrchestratorDeps {
            engine,
            store,
            sources,
            events,
            metrics,
            retention,
        } = deps;
        let registry = Arc::new(JobRegistry::new());
        let (scheduler, task) = RetentionScheduler::spawn(
            retention,
            RetentionContext {
                store: store.clone(),
                registry: Arc::clone(&registry),
                events: events.clone(),
                metrics: metrics.clone(),
            },
        );
        let invoker = ConversionInvoker::new(engine, store.layout().clone(), metrics.clone());
        (
            Self {
                store,
                sources: Arc::new(sources),
                invoker,
                registry,
                retention: scheduler,
                events,
                metrics,
            },
            task,
        )
    }

    /// Name of the engine implementation in use.
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.invoker.engine_name()
    }

    /// Run `request` to completion.
    ///
    /// # Errors
    ///
    /// - [`JobError::InvalidRequest`] when validation or name reservation
    ///   fails; nothing is touched.
    /// - [`JobError::ConversionFailure`] when an engine step fails or no
    ///   bundle is produced; staged files stay in the working root.
    /// - [`JobError::RelocationFailure`] when artifacts cannot be moved;
    ///   retention is not armed.
    pub fn submit(&self, request: &ConversionRequest) -> JobResult<Job> {
        let validated = validate(request, self.store.layout(), &self.sources)
            .map_err(|rejection| self.reject(rejection))?;
        let name = validated.name.clone();
        let mut job = Job::new(
            name.clone(),
            self.store.layout().working_root().to_path_buf(),
            self.store.layout().final_dir(&name),
        );
        self.registry
            .reserve(&job)
            .map_err(|rejection| self.reject(rejection))?;
        let _ = self.events.publish(Event::JobAccepted {
            job_id: job.id,
            name: name.clone(),
        });
        info!(job = %name, job_id = %job.id, "job accepted");

        self.advance(&mut job, JobStatus::Converting);
        if let Err(err) = self.invoker.convert(&validated) {
            return Err(self.fail(job, err));
        }

        self.advance(&mut job, JobStatus::Relocating);
        let artifacts = match self.store.relocate(&name) {
            Ok(artifacts) => artifacts,
            Err(err) => {
                let failure = JobError::RelocationFailure {
                    operation: err.operation(),
                    source: Box::new(err),
                };
                return Err(self.fail(job, failure));
            }
        };

        let bundle_path = artifacts.bundle_path.display().to_string();
        if let Err(err) = job.mark_ready(artifacts) {
            error!(job = %name, error = ?err, "job could not be marked ready");
        }
        self.record(&job);
        let _ = self.events.publish(Event::JobReady {
            job_id: job.id,
            name: name.clone(),
            bundle_path,
        });

        self.retention.arm(name.clone());
        self.metrics.inc_job(JobOutcome::Ready);
        self.metrics.job_scheduled();
        info!(job = %name, job_id = %job.id, "job ready");
        Ok(job)
    }

    /// Latest snapshot of the job registered under `name`.
    #[must_use]
    pub fn job(&self, name: &JobName) -> Option<Job> {
        self.registry.get(name)
    }

    /// Number of jobs currently tracked; expired jobs are not counted.
    #[must_use]
    pub fn registered_jobs(&self) -> usize {
        self.registry.len()
    }

    fn advance(&self, job: &mut Job, next: JobStatus) {
        if let Err(err) = job.transition(next) {
            error!(job = %job.name, error = ?err, "invalid job transition");
            return;
        }
        self.record(job);
    }

    fn record(&self, job: &Job) {
        self.registry.update(job);
        let _ = self.events.publish(Event::JobStateChanged {
            job_id: job.id,
            name: job.name.clone(),
            status: job.status,
        });
    }

    fn reject(&self, rejection: RequestRejection) -> JobError {
        self.metrics.inc_job(JobOutcome::Rejected);
        info!(field = rejection.field(), reason = %rejection, "request rejected");
        JobError::from(rejection)
    }

    fn fail(&self, mut job: Job, err: JobError) -> JobError {
        let message = describe(&err);
        if let Err(transition) = job.mark_failed(message.clone()) {
            error!(job = %job.name, error = ?transition, "job could not be marked failed");
        }
        self.record(&job);
        let _ = self.events.publish(Event::JobFailed {
            job_id: job.id,
            name: job.name.clone(),
            message,
        });
        self.metrics.inc_job(JobOutcome::Failed);
        warn!(job = %job.name, job_id = %job.id, error = ?err, "job failed");
        err
    }
}

fn describe(err: &JobError) -> String {
    match err {
        JobError::ConversionFailure { step, .. } => format!("conversion failed at {step}"),
        JobError::RelocationFailure { operation, .. } => {
            format!("artifact relocation failed during {operation}")
        }
        JobError::InvalidRequest { .. } | JobError::Interrupted { .. } => err.to_string(),
    }
}

#[async_trait]
impl JobService for JobOrchestrator {
    async fn submit(&self, request: ConversionRequest) -> JobResult<Job> {
        let orchestrator = self.clone();
        task::spawn_blocking(move || orchestrator.submit(&request))
            .await
            .map_err(|err| JobError::Interrupted {
                source: Box::new(err),
            })?
    }

    async fn job(&self, name: &JobName) -> Option<Job> {
        self.registry.get(name)
    }

    fn degraded_components(&self) -> Vec<String> {
        if self.store.is_degraded() {
            vec![STORAGE_COMPONENT.to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use structura_core::ConversionStep;
    use structura_fsops::ArtifactLayout;
    use structura_test_support::{ScriptedEngineFactory, TestWorkspace};
    use tokio_stream::StreamExt;

    fn orchestrator(
        workspace: &TestWorkspace,
        factory: &ScriptedEngineFactory,
        events: &EventBus,
    ) -> Result<JobOrchestrator> {
        let layout = ArtifactLayout::new(workspace.working_root(), workspace.assets_root());
        let (orchestrator, _task) = JobOrchestrator::spawn(OrchestratorDeps {
            engine: Arc::new(factory.clone()),
            store: ArtifactStore::new(layout, events.clone()),
            sources: SourceRoot::new(workspace.structures_root())?,
            events: events.clone(),
            metrics: Metrics::new()?,
            retention: Duration::from_secs(300),
        });
        Ok(orchestrator)
    }

    #[tokio::test]
    async fn successful_job_publishes_its_lifecycle() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let factory = ScriptedEngineFactory::new();
        let events = EventBus::with_capacity(32);
        let orchestrator = orchestrator(&workspace, &factory, &events)?;
        let source = workspace.write_structure("castle.mcstructure", b"nbt")?;

        let job = orchestrator.submit(&ConversionRequest::new("castle", source))?;
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(
            orchestrator.job(&job.name).map(|current| current.status),
            Some(JobStatus::Ready)
        );

        let kinds: Vec<&str> = events
            .backlog_since(0)
            .iter()
            .map(|envelope| envelope.event.kind())
            .collect();
        assert_eq!(
            kinds,
            [
                "job_accepted",
                "job_state_changed",
                "job_state_changed",
                "job_state_changed",
                "job_ready"
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_conversion_releases_the_name() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let failing = ScriptedEngineFactory::new().failing_at(ConversionStep::Compile);
        let events = EventBus::with_capacity(32);
        let orchestrator = orchestrator(&workspace, &failing, &events)?;
        let source = workspace.write_structure("castle.mcstructure", b"nbt")?;
        let mut stream = events.subscribe(None);

        let err = orchestrator
            .submit(&ConversionRequest::new("castle", &source))
            .expect_err("compile fails");
        assert!(matches!(
            err,
            JobError::ConversionFailure {
                step: ConversionStep::Compile,
                ..
            }
        ));
        let failed = orchestrator
            .job(&JobName::parse("castle")?)
            .ok_or_else(|| anyhow::anyhow!("missing job"))?;
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.failure.as_deref(), Some("conversion failed at compile"));
        assert!(!workspace.final_dir("castle").exists());

        let mut saw_failure = false;
        while let Some(envelope) = stream.next().await {
            if matches!(envelope?.event, Event::JobFailed { .. }) {
                saw_failure = true;
                break;
            }
        }
        assert!(saw_failure);

        let retry = orchestrator.submit(&ConversionRequest::new("castle", &source));
        assert!(matches!(
            retry,
            Err(JobError::ConversionFailure { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_requests_touch_nothing() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let factory = ScriptedEngineFactory::new();
        let events = EventBus::with_capacity(32);
        let orchestrator = orchestrator(&workspace, &factory, &events)?;

        let err = orchestrator
            .submit(&ConversionRequest::new("", "missing.mcstructure"))
            .expect_err("rejected");
        assert_eq!(err.rejection(), Some(&RequestRejection::MissingName));
        assert_eq!(factory.sessions(), 0);
        assert!(events.last_event_id().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sources_outside_the_root_never_reach_the_engine() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let factory = ScriptedEngineFactory::new();
        let events = EventBus::with_capacity(32);
        let orchestrator = orchestrator(&workspace, &factory, &events)?;
        let stray = workspace.path().join("secret.txt");
        std::fs::write(&stray, b"root:x:0:0")?;

        let err = orchestrator
            .submit(&ConversionRequest::new("castle", &stray))
            .expect_err("outside the root");
        assert_eq!(
            err.rejection(),
            Some(&RequestRejection::SourceOutsideRoot { path: stray })
        );
        assert_eq!(factory.sessions(), 0);
        assert!(orchestrator.job(&JobName::parse("castle")?).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn service_runs_submissions_off_the_async_thread() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let factory = ScriptedEngineFactory::new();
        let events = EventBus::with_capacity(32);
        let service: Arc<dyn JobService> =
            Arc::new(orchestrator(&workspace, &factory, &events)?);
        let source = workspace.write_structure("castle.mcstructure", b"nbt")?;

        let job = service.submit(ConversionRequest::new("castle", source)).await?;
        assert_eq!(job.status, JobStatus::Ready);
        let current = service
            .job(&job.name)
            .await
            .ok_or_else(|| anyhow::anyhow!("missing job"))?;
        assert_eq!(current.id, job.id);
        assert!(service.degraded_components().is_empty());
        Ok(())
    }
}
