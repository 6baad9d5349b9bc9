//! Deferred reclamation of final directories.
//!
//! # Design
//! - One background task owns a `DelayQueue` keyed by job name and is fed
//!   through an unbounded channel, so arming never blocks the request path.
//! - Each armed name is reclaimed exactly once after the retention delay.
//!   There is no cancellation: dropping every handle still lets queued
//!   deletions run before the task exits.
//! - Deletion runs on the blocking pool and is awaited before the queue is
//!   polled again, so the runtime worker never blocks on the filesystem.
//! - A directory that is already gone counts as reclaimed. Other I/O failures
//!   are logged and counted, never surfaced to a caller.

use std::sync::Arc;
use std::time::Duration;

use structura_core::JobName;
use structura_events::{Event, EventBus};
use structura_fsops::{ArtifactStore, Removal};
use structura_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_stream::StreamExt;
use tokio_util::time::DelayQueue;
use tracing::{debug, error, info};

use crate::registry::JobRegistry;

/// Collaborators the reclamation task acts on.
#[derive(Clone)]
pub struct RetentionContext {
    /// Filesystem store owning the final directories.
    pub store: ArtifactStore,
    /// Registry whose entries move to `Expired`.
    pub registry: Arc<JobRegistry>,
    /// Bus receiving `JobExpired`.
    pub events: EventBus,
    /// Metrics registry.
    pub metrics: Metrics,
}

/// Handle for arming deletions on the background retention task.
#[derive(Debug, Clone)]
pub struct RetentionScheduler {
    sender: mpsc::UnboundedSender<JobName>,
}

impl RetentionScheduler {
    /// Spawn the retention task on the current Tokio runtime.
    ///
    /// The returned handle completes once every scheduler handle is dropped
    /// and all queued deletions have run.
    #[must_use]
    pub fn spawn(delay: Duration, context: RetentionContext) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(delay, receiver, context));
        (Self { sender }, task)
    }

    /// Schedule deletion of `name`'s final directory after the retention delay.
    pub fn arm(&self, name: JobName) {
        if let Err(err) = self.sender.send(name) {
            error!(job = %err.0, "retention task stopped; deletion not armed");
        }
    }
}

async fn run(
    delay: Duration,
    mut receiver: mpsc::UnboundedReceiver<JobName>,
    context: RetentionContext,
) {
    let mut queue: DelayQueue<JobName> = DelayQueue::new();
    info!(delay_secs = delay.as_secs(), "retention scheduler started");

    loop {
        tokio::select! {
            armed = receiver.recv() => {
                let Some(name) = armed else {
                    break;
                };
                debug!(job = %name, "retention armed");
                queue.insert(name, delay);
            }
            Some(expired) = queue.next(), if !queue.is_empty() => {
                reclaim(&context, expired.into_inner()).await;
            }
        }
    }

    while let Some(expired) = queue.next().await {
        reclaim(&context, expired.into_inner()).await;
    }
    debug!("retention scheduler stopped");
}

async fn reclaim(context: &RetentionContext, name: JobName) {
    let store = context.store.clone();
    let target = name.clone();
    let removed = task::spawn_blocking(move || store.remove_final_dir(&target)).await;
    match removed {
        Ok(Ok(removal)) => {
            if removal == Removal::AlreadyGone {
                debug!(job = %name, "final directory already absent");
            }
            if context.registry.expire(&name).is_none() {
                debug!(job = %name, "no ready job registered under this name");
            }
            context.metrics.artifact_expired();
            info!(job = %name, "artifacts expired");
            let _ = context.events.publish(Event::JobExpired { name });
        }
        Ok(Err(err)) => {
            context.metrics.retention_failed();
            error!(
                job = %name,
                operation = err.operation(),
                error = ?err,
                "failed to reclaim final directory"
            );
        }
        Err(err) => {
            context.metrics.retention_failed();
            error!(job = %name, error = ?err, "reclamation task did not complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use std::fs;
    use structura_events::EventStream;
    use structura_fsops::ArtifactLayout;
    use structura_test_support::TestWorkspace;
    use tokio::time::{Instant, advance};

    fn context(workspace: &TestWorkspace, events: &EventBus) -> Result<RetentionContext> {
        let layout = ArtifactLayout::new(workspace.working_root(), workspace.assets_root());
        Ok(RetentionContext {
            store: ArtifactStore::new(layout, events.clone()),
            registry: Arc::new(JobRegistry::new()),
            events: events.clone(),
            metrics: Metrics::new()?,
        })
    }

    async fn next_expiry(stream: &mut EventStream) -> Result<JobName> {
        while let Some(envelope) = stream.next().await {
            if let Event::JobExpired { name } = envelope?.event {
                return Ok(name);
            }
        }
        Err(anyhow!("event stream closed"))
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_after_the_delay_and_not_before() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let events = EventBus::with_capacity(16);
        let mut stream = events.subscribe(None);
        let context = context(&workspace, &events)?;
        let metrics = context.metrics.clone();
        let delay = Duration::from_secs(300);
        let (scheduler, _task) = RetentionScheduler::spawn(delay, context);

        let dir = workspace.occupy("castle")?;
        fs::write(dir.join("castle.mcpack"), b"pack")?;
        let armed_at = Instant::now();
        scheduler.arm(JobName::parse("castle")?);
        tokio::task::yield_now().await;

        advance(delay - Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(dir.exists());

        let name = next_expiry(&mut stream).await?;
        assert_eq!(name.as_str(), "castle");
        assert!(armed_at.elapsed() >= delay);
        assert!(!dir.exists());
        assert_eq!(metrics.snapshot().artifacts_expired_total, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn already_absent_directory_is_not_an_error() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let events = EventBus::with_capacity(16);
        let mut stream = events.subscribe(None);
        let context = context(&workspace, &events)?;
        let metrics = context.metrics.clone();
        let (scheduler, _task) = RetentionScheduler::spawn(Duration::from_secs(5), context);

        scheduler.arm(JobName::parse("vanished")?);
        let name = next_expiry(&mut stream).await?;
        assert_eq!(name.as_str(), "vanished");
        assert_eq!(metrics.snapshot().retention_failures_total, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn reclaim_failures_are_counted_not_raised() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let events = EventBus::with_capacity(16);
        let context = context(&workspace, &events)?;
        let metrics = context.metrics.clone();
        fs::write(workspace.final_dir("blocked"), b"not a directory")?;

        reclaim(&context, JobName::parse("blocked")?).await;
        assert_eq!(metrics.snapshot().retention_failures_total, 1);
        assert_eq!(metrics.snapshot().artifacts_expired_total, 0);
        assert!(events.last_event_id().is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn reclaim_evicts_the_expired_job() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let events = EventBus::with_capacity(16);
        let context = context(&workspace, &events)?;
        let name = JobName::parse("castle")?;
        let mut job = structura_core::Job::new(
            name.clone(),
            workspace.working_root(),
            workspace.final_dir("castle"),
        );
        context.registry.reserve(&job)?;
        job.transition(structura_core::JobStatus::Converting)?;
        job.transition(structura_core::JobStatus::Relocating)?;
        job.mark_ready(structura_core::ArtifactRefs {
            bundle_path: workspace.final_dir("castle").join("castle.mcpack"),
            manifest_path: None,
        })?;
        context.registry.update(&job);
        workspace.occupy("castle")?;

        reclaim(&context, name.clone()).await;
        assert!(context.registry.is_empty());
        assert!(!workspace.final_dir("castle").exists());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn queued_deletions_survive_dropped_handles() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let events = EventBus::with_capacity(16);
        let context = context(&workspace, &events)?;
        let (scheduler, task) = RetentionScheduler::spawn(Duration::from_secs(60), context);

        let first = workspace.occupy("first")?;
        let second = workspace.occupy("second")?;
        scheduler.arm(JobName::parse("first")?);
        scheduler.arm(JobName::parse("second")?);
        drop(scheduler);

        task.await?;
        assert!(!first.exists());
        assert!(!second.exists());
        Ok(())
    }
}
