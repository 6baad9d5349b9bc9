//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges relevant to the job lifecycle.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Terminal outcome label for `jobs_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Request failed validation.
    Rejected,
    /// Conversion or relocation failed.
    Failed,
    /// Artifacts were relocated.
    Ready,
}

impl JobOutcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Ready => "ready",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    jobs_total: IntCounterVec,
    job_steps_total: IntCounterVec,
    live_jobs: IntGauge,
    artifacts_expired_total: IntCounter,
    retention_failures_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Final directories currently awaiting reclamation.
    pub live_jobs: i64,
    /// Final directories removed after their retention window.
    pub artifacts_expired_total: u64,
    /// Scheduled deletions that failed with an I/O error.
    pub retention_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let jobs_total = counter_vec(
            "jobs_total",
            "Conversion requests by terminal outcome",
            &["outcome"],
        )?;
        let job_steps_total = counter_vec(
            "job_steps_total",
            "Pipeline steps executed by status",
            &["step", "status"],
        )?;
        let live_jobs = IntGauge::with_opts(Opts::new(
            "live_jobs",
            "Final directories awaiting reclamation",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "live_jobs",
            source,
        })?;
        let artifacts_expired_total = counter(
            "artifacts_expired_total",
            "Final directories reclaimed after retention",
        )?;
        let retention_failures_total = counter(
            "retention_failures_total",
            "Scheduled deletions that failed",
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "jobs_total", &jobs_total)?;
        register(&registry, "job_steps_total", &job_steps_total)?;
        register(&registry, "live_jobs", &live_jobs)?;
        register(&registry, "artifacts_expired_total", &artifacts_expired_total)?;
        register(
            &registry,
            "retention_failures_total",
            &retention_failures_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                jobs_total,
                job_steps_total,
                live_jobs,
                artifacts_expired_total,
                retention_failures_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Record a job reaching a terminal outcome.
    pub fn inc_job(&self, outcome: JobOutcome) {
        self.inner
            .jobs_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record a pipeline step result.
    pub fn inc_job_step(&self, step: &str, status: &str) {
        self.inner
            .job_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// A final directory was created and scheduled for reclamation.
    pub fn job_scheduled(&self) {
        self.inner.live_jobs.inc();
    }

    /// A scheduled final directory was reclaimed.
    pub fn artifact_expired(&self) {
        self.inner.live_jobs.dec();
        self.inner.artifacts_expired_total.inc();
    }

    /// A scheduled deletion failed; the directory is no longer tracked.
    pub fn retention_failed(&self) {
        self.inner.live_jobs.dec();
        self.inner.retention_failures_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            live_jobs: self.inner.live_jobs.get(),
            artifacts_expired_total: self.inner.artifacts_expired_total.get(),
            retention_failures_total: self.inner.retention_failures_total.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
