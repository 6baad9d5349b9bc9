use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use structura_app::{JobOrchestrator, OrchestratorDeps, SourceRoot};
use structura_core::{
    ConversionRequest, JobError, JobName, JobService, JobStatus, Offset, RequestRejection,
};
use structura_events::{Event, EventBus, EventStream};
use structura_fsops::{ArtifactLayout, ArtifactStore};
use structura_telemetry::Metrics;
use structura_test_support::{RecordedCall, ScriptedEngineFactory, TestWorkspace};
use tokio::time::{Instant, advance};
use tokio_stream::StreamExt;

const RETENTION: Duration = Duration::from_secs(300);

struct Harness {
    workspace: TestWorkspace,
    factory: ScriptedEngineFactory,
    events: EventBus,
    metrics: Metrics,
    orchestrator: JobOrchestrator,
}

impl Harness {
    fn new(factory: ScriptedEngineFactory) -> Result<Self> {
        let workspace = TestWorkspace::new()?;
        let events = EventBus::with_capacity(64);
        let metrics = Metrics::new()?;
        let layout = ArtifactLayout::new(workspace.working_root(), workspace.assets_root());
        let (orchestrator, _retention) = JobOrchestrator::spawn(OrchestratorDeps {
            engine: Arc::new(factory.clone()),
            store: ArtifactStore::new(layout, events.clone()),
            sources: SourceRoot::new(workspace.structures_root())?,
            events: events.clone(),
            metrics: metrics.clone(),
            retention: RETENTION,
        });
        Ok(Self {
            workspace,
            factory,
            events,
            metrics,
            orchestrator,
        })
    }

    fn request(&self, name: &str) -> Result<ConversionRequest> {
        let source = self
            .workspace
            .write_structure(&format!("{name}.mcstructure"), b"nbt")?;
        Ok(ConversionRequest::new(name, source))
    }
}

async fn next_expiry(stream: &mut EventStream) -> Result<JobName> {
    while let Some(envelope) = stream.next().await {
        if let Event::JobExpired { name } = envelope?.event {
            return Ok(name);
        }
    }
    Err(anyhow!("event stream closed"))
}

#[tokio::test]
async fn existing_final_directory_rejects_without_invoking_the_engine() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new())?;
    harness.workspace.occupy("castle")?;

    let err = harness
        .orchestrator
        .submit(&harness.request("castle")?)
        .expect_err("collision");
    assert_eq!(
        err.rejection(),
        Some(&RequestRejection::AlreadyExists {
            name: "castle".to_string()
        })
    );
    assert_eq!(harness.factory.sessions(), 0);
    assert!(harness.factory.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn ready_bundle_lives_under_the_job_directory() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new())?;
    let job = harness.orchestrator.submit(&harness.request("castle")?)?;

    let artifacts = job.artifacts.ok_or_else(|| anyhow!("no artifacts"))?;
    let final_dir = harness.workspace.final_dir("castle");
    assert!(artifacts.bundle_path.is_file());
    assert_eq!(artifacts.bundle_path, final_dir.join("castle.mcpack"));
    let manifest = artifacts.manifest_path.ok_or_else(|| anyhow!("no manifest"))?;
    assert_eq!(manifest, final_dir.join("castle-block_list.txt"));
    assert!(!harness.workspace.working_root().join("castle.mcpack").exists());
    Ok(())
}

#[tokio::test]
async fn missing_block_list_is_not_an_error() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new().without_manifest())?;
    let job = harness.orchestrator.submit(&harness.request("castle")?)?;

    assert_eq!(job.status, JobStatus::Ready);
    let artifacts = job.artifacts.ok_or_else(|| anyhow!("no artifacts"))?;
    assert!(artifacts.manifest_path.is_none());
    assert!(artifacts.bundle_path.is_file());
    Ok(())
}

#[tokio::test]
async fn opacity_and_offset_reach_the_engine() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new())?;
    let request = harness
        .request("castle")?
        .with_opacity(37)
        .with_offset(Offset::new(0, 12, -4));
    harness.orchestrator.submit(&request)?;

    let calls = harness.factory.calls();
    assert!(calls.iter().any(|call| matches!(
        call,
        RecordedCall::SetOpacity(value) if (value - 0.63).abs() < f64::EPSILON
    )));
    assert!(calls.iter().any(|call| matches!(
        call,
        RecordedCall::SetModelOffset { offset, .. } if *offset == Offset::new(0, 12, -4)
    )));
    Ok(())
}

#[tokio::test]
async fn failed_relocation_never_arms_retention() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new())?;
    let request = harness.request("castle")?;
    fs::remove_dir_all(harness.workspace.assets_root())?;
    fs::write(harness.workspace.assets_root(), b"not a directory")?;

    let err = harness
        .orchestrator
        .submit(&request)
        .expect_err("relocation fails");
    assert!(matches!(err, JobError::RelocationFailure { .. }));
    assert_eq!(harness.metrics.snapshot().live_jobs, 0);
    let job = harness
        .orchestrator
        .job(&JobName::parse("castle")?)
        .ok_or_else(|| anyhow!("missing job"))?;
    assert_eq!(job.status, JobStatus::Failed);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn final_directory_is_reclaimed_after_the_retention_delay() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new())?;
    let mut stream = harness.events.subscribe(None);
    let job = harness.orchestrator.submit(&harness.request("castle")?)?;
    let relocated_at = Instant::now();
    let final_dir = harness.workspace.final_dir("castle");
    tokio::task::yield_now().await;

    advance(RETENTION - Duration::from_secs(1)).await;
    tokio::task::yield_now().await;
    assert!(final_dir.exists());

    let expired = next_expiry(&mut stream).await?;
    assert_eq!(expired, job.name);
    assert!(relocated_at.elapsed() >= RETENTION);
    assert!(!final_dir.exists());

    assert!(harness.orchestrator.job(&job.name).is_none());
    assert_eq!(harness.orchestrator.registered_jobs(), 0);
    assert_eq!(harness.metrics.snapshot().live_jobs, 0);

    let reused = harness.orchestrator.submit(&harness.request("castle")?)?;
    assert_eq!(reused.status, JobStatus::Ready);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reclaiming_a_vanished_directory_is_quiet() -> Result<()> {
    let harness = Harness::new(ScriptedEngineFactory::new())?;
    let mut stream = harness.events.subscribe(None);
    let job = harness.orchestrator.submit(&harness.request("castle")?)?;
    fs::remove_dir_all(harness.workspace.final_dir("castle"))?;

    assert_eq!(next_expiry(&mut stream).await?, job.name);
    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.retention_failures_total, 0);
    assert_eq!(snapshot.artifacts_expired_total, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn distinct_names_convert_concurrently() -> Result<()> {
    let harness = Harness::new(
        ScriptedEngineFactory::new().with_compile_delay(Duration::from_millis(50)),
    )?;
    let service: Arc<dyn JobService> = Arc::new(harness.orchestrator.clone());
    let (castle, bridge) = (harness.request("castle")?, harness.request("bridge")?);
    let (first, second) = tokio::join!(service.submit(castle), service.submit(bridge));
    let (first, second) = (first?, second?);

    let first_bundle = first.artifacts.ok_or_else(|| anyhow!("no artifacts"))?.bundle_path;
    let second_bundle = second.artifacts.ok_or_else(|| anyhow!("no artifacts"))?.bundle_path;
    assert_eq!(first_bundle, harness.workspace.final_dir("castle").join("castle.mcpack"));
    assert_eq!(second_bundle, harness.workspace.final_dir("bridge").join("bridge.mcpack"));
    assert!(first_bundle.is_file() && second_bundle.is_file());
    assert_eq!(harness.factory.sessions(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_name_race_admits_exactly_one() -> Result<()> {
    let harness = Harness::new(
        ScriptedEngineFactory::new().with_compile_delay(Duration::from_millis(200)),
    )?;
    let service: Arc<dyn JobService> = Arc::new(harness.orchestrator.clone());
    let request = harness.request("castle")?;
    let (first, second) = tokio::join!(
        service.submit(request.clone()),
        service.submit(request),
    );

    let outcomes = [first, second];
    let admitted = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(admitted, 1);
    let rejected = outcomes
        .iter()
        .find_map(|outcome| outcome.as_ref().err())
        .ok_or_else(|| anyhow!("no rejection"))?;
    assert!(matches!(
        rejected.rejection(),
        Some(RequestRejection::AlreadyExists { .. })
    ));
    assert_eq!(harness.factory.sessions(), 1);
    Ok(())
}
