//! In-memory registry of jobs keyed by name.
//!
//! # Design
//! - `reserve` is the atomic admission point: a name held by an in-flight or
//!   ready job is refused, while failed entries are replaced.
//! - Entries are snapshots; the orchestrator writes back after each transition.
//! - Expired jobs are evicted. Failed jobs are kept for inspection in a
//!   bounded tail; the oldest falls out once the tail is full.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use structura_core::{Job, JobName, JobStatus, RequestRejection};

/// Failed jobs kept for inspection before the oldest is evicted.
pub const FAILED_TAIL: usize = 64;

#[derive(Debug, Default)]
struct Entries {
    jobs: HashMap<JobName, Job>,
    failed: VecDeque<JobName>,
}

impl Entries {
    fn forget_failure(&mut self, name: &JobName) {
        self.failed.retain(|failed| failed != name);
    }
}

/// Latest known state of every live or recently failed job.
#[derive(Debug)]
pub struct JobRegistry {
    entries: Mutex<Entries>,
    failed_tail: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_failed_tail(FAILED_TAIL)
    }
}

impl JobRegistry {
    /// Empty registry keeping up to [`FAILED_TAIL`] failed jobs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry keeping up to `failed_tail` failed jobs.
    #[must_use]
    pub fn with_failed_tail(failed_tail: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            failed_tail,
        }
    }

    /// Claim `job.name` for `job`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestRejection::AlreadyExists`] while another job holding
    /// the name is in flight or ready.
    pub fn reserve(&self, job: &Job) -> Result<(), RequestRejection> {
        let mut entries = self.lock();
        if let Some(existing) = entries.jobs.get(&job.name)
            && (existing.status.is_in_flight() || existing.status == JobStatus::Ready)
        {
            return Err(RequestRejection::AlreadyExists {
                name: job.name.to_string(),
            });
        }
        entries.forget_failure(&job.name);
        entries.jobs.insert(job.name.clone(), job.clone());
        Ok(())
    }

    /// Store the latest snapshot of `job`.
    pub fn update(&self, job: &Job) {
        let mut entries = self.lock();
        entries.jobs.insert(job.name.clone(), job.clone());
        if job.status != JobStatus::Failed {
            return;
        }
        entries.forget_failure(&job.name);
        entries.failed.push_back(job.name.clone());
        while entries.failed.len() > self.failed_tail {
            if let Some(oldest) = entries.failed.pop_front() {
                entries.jobs.remove(&oldest);
            }
        }
    }

    /// Snapshot of the job registered under `name`.
    #[must_use]
    pub fn get(&self, name: &JobName) -> Option<Job> {
        self.lock().jobs.get(name).cloned()
    }

    /// Move a ready job to `Expired` and evict it, returning the final
    /// snapshot.
    ///
    /// Returns `None` when no ready job holds the name.
    #[must_use]
    pub fn expire(&self, name: &JobName) -> Option<Job> {
        let mut entries = self.lock();
        entries.jobs.get_mut(name)?.mark_expired().ok()?;
        entries.jobs.remove(name)
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    /// Whether no job is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::path::PathBuf;

    type TestResult<T> = Result<T, Box<dyn Error>>;

    fn job(name: &str) -> TestResult<Job> {
        Ok(Job::new(
            JobName::parse(name)?,
            PathBuf::from("work"),
            PathBuf::from("assets").join(name),
        ))
    }

    fn ready(name: &str) -> TestResult<Job> {
        let mut job = job(name)?;
        job.transition(JobStatus::Converting)?;
        job.transition(JobStatus::Relocating)?;
        job.mark_ready(structura_core::ArtifactRefs {
            bundle_path: PathBuf::from("assets").join(name).join(format!("{name}.mcpack")),
            manifest_path: None,
        })?;
        Ok(job)
    }

    #[test]
    fn in_flight_names_cannot_be_reserved_twice() -> TestResult<()> {
        let registry = JobRegistry::new();
        registry.reserve(&job("castle")?)?;
        let err = registry.reserve(&job("castle")?).expect_err("held");
        assert_eq!(
            err,
            RequestRejection::AlreadyExists {
                name: "castle".to_string()
            }
        );
        registry.reserve(&job("bridge")?)?;
        Ok(())
    }

    #[test]
    fn failed_jobs_release_their_name() -> TestResult<()> {
        let registry = JobRegistry::new();
        let mut first = job("castle")?;
        registry.reserve(&first)?;
        first.mark_failed("engine failed at compile")?;
        registry.update(&first);

        let second = job("castle")?;
        registry.reserve(&second)?;
        let current = registry.get(&second.name).ok_or("missing entry")?;
        assert_eq!(current.id, second.id);
        assert_eq!(current.status, JobStatus::Validating);
        Ok(())
    }

    #[test]
    fn ready_jobs_hold_their_name_until_expired() -> TestResult<()> {
        let registry = JobRegistry::new();
        let mut ready = job("castle")?;
        registry.reserve(&ready)?;
        ready.transition(JobStatus::Converting)?;
        ready.transition(JobStatus::Relocating)?;
        ready.mark_ready(structura_core::ArtifactRefs {
            bundle_path: PathBuf::from("assets/castle/castle.mcpack"),
            manifest_path: None,
        })?;
        registry.update(&ready);
        assert!(registry.reserve(&job("castle")?).is_err());

        let expired = registry.expire(&ready.name).ok_or("not expired")?;
        assert_eq!(expired.status, JobStatus::Expired);
        assert!(expired.artifacts.is_none());
        registry.reserve(&job("castle")?)?;
        Ok(())
    }

    #[test]
    fn expired_jobs_are_evicted() -> TestResult<()> {
        let registry = JobRegistry::new();
        for name in ["castle", "bridge", "tower"] {
            let ready = ready(name)?;
            registry.reserve(&ready)?;
            registry.update(&ready);
        }
        assert_eq!(registry.len(), 3);

        for name in ["castle", "bridge", "tower"] {
            let name = JobName::parse(name)?;
            assert!(registry.expire(&name).is_some());
            assert!(registry.get(&name).is_none());
        }
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn failed_jobs_are_kept_in_a_bounded_tail() -> TestResult<()> {
        let registry = JobRegistry::with_failed_tail(2);
        for name in ["first", "second", "third"] {
            let mut failed = job(name)?;
            registry.reserve(&failed)?;
            failed.mark_failed("engine failed at compile")?;
            registry.update(&failed);
        }
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&JobName::parse("first")?).is_none());
        assert!(registry.get(&JobName::parse("third")?).is_some());

        let retry = job("second")?;
        registry.reserve(&retry)?;
        let mut again = job("fourth")?;
        registry.reserve(&again)?;
        again.mark_failed("engine failed at compile")?;
        registry.update(&again);
        assert_eq!(
            registry.get(&retry.name).map(|current| current.status),
            Some(JobStatus::Validating)
        );
        assert_eq!(registry.len(), 3);
        Ok(())
    }

    #[test]
    fn expire_ignores_jobs_that_are_not_ready() -> TestResult<()> {
        let registry = JobRegistry::new();
        let pending = job("castle")?;
        registry.reserve(&pending)?;
        assert!(registry.expire(&pending.name).is_none());
        assert!(registry.expire(&JobName::parse("unknown")?).is_none());
        Ok(())
    }
}
