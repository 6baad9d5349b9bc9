//! Relocation and reclamation of job artifacts.
//!
//! # Design
//! - Moves prefer `rename`; a failed rename falls back to copy-then-remove so
//!   working and assets roots may sit on different devices.
//! - A relocation that fails after the final directory exists moves whatever
//!   it already placed back to the working root and removes the directory, so
//!   the name stays reusable.
//! - Reclamation treats an already-absent directory as success.
//! - Relocation failures flip a health flag and publish `HealthChanged` once;
//!   the next success clears it.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use structura_core::{ArtifactRefs, JobName};
use structura_events::{Event, EventBus};
use tracing::{debug, info, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::layout::ArtifactLayout;

const HEALTH_COMPONENT: &str = "fsops";

/// Result of a reclamation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The directory existed and was deleted.
    Removed,
    /// Nothing was present at the path.
    AlreadyGone,
}

/// Filesystem side of the job lifecycle.
#[derive(Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
    events: EventBus,
    degraded: Arc<Mutex<bool>>,
}

impl ArtifactStore {
    /// Build a store over `layout`, publishing health changes to `events`.
    #[must_use]
    pub fn new(layout: ArtifactLayout, events: EventBus) -> Self {
        Self {
            layout,
            events,
            degraded: Arc::new(Mutex::new(false)),
        }
    }

    /// Storage layout used by this store.
    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Whether the last relocation attempt failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        *self.lock_health_flag()
    }

    /// Move the job's staged outputs into its final directory.
    ///
    /// The bundle is required; the manifest is moved only when the engine
    /// produced one.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::MissingBundle`] when no staged bundle exists and
    /// [`FsOpsError::Io`] when the directory cannot be created or a move fails.
    pub fn relocate(&self, name: &JobName) -> FsOpsResult<ArtifactRefs> {
        let result = self.relocate_inner(name);
        match &result {
            Ok(refs) => {
                self.mark_recovered();
                info!(
                    job = %name,
                    bundle = %refs.bundle_path.display(),
                    manifest = refs.manifest_path.is_some(),
                    "artifacts relocated"
                );
            }
            Err(err) => self.mark_degraded(name, err),
        }
        result
    }

    fn relocate_inner(&self, name: &JobName) -> FsOpsResult<ArtifactRefs> {
        let staged_bundle = self.layout.staged_bundle(name);
        if !staged_bundle.is_file() {
            return Err(FsOpsError::MissingBundle {
                path: staged_bundle,
            });
        }

        let final_dir = self.layout.final_dir(name);
        fs::create_dir_all(&final_dir)
            .map_err(|source| FsOpsError::io("relocate.create_dir", &final_dir, source))?;

        self.place_artifacts(name)
            .inspect_err(|_| self.roll_back(name, &final_dir))
    }

    fn place_artifacts(&self, name: &JobName) -> FsOpsResult<ArtifactRefs> {
        let staged_bundle = self.layout.staged_bundle(name);
        let bundle_path = self.layout.final_bundle(name);
        move_file(&staged_bundle, &bundle_path)?;

        let staged_manifest = self.layout.staged_manifest(name);
        let manifest_path = if staged_manifest.is_file() {
            let target = self.layout.final_manifest(name);
            move_file(&staged_manifest, &target)?;
            Some(target)
        } else {
            debug!(job = %name, "engine produced no manifest");
            None
        };

        Ok(ArtifactRefs {
            bundle_path,
            manifest_path,
        })
    }

    fn roll_back(&self, name: &JobName, final_dir: &Path) {
        let pairs = [
            (self.layout.final_bundle(name), self.layout.staged_bundle(name)),
            (
                self.layout.final_manifest(name),
                self.layout.staged_manifest(name),
            ),
        ];
        for (placed, staged) in &pairs {
            if !placed.is_file() || staged.exists() {
                continue;
            }
            if let Err(err) = move_file(placed, staged) {
                warn!(job = %name, error = ?err, "staged artifact could not be restored");
            }
        }
        match fs::remove_dir_all(final_dir) {
            Ok(()) => debug!(job = %name, "partial final directory removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                job = %name,
                path = %final_dir.display(),
                error = %err,
                "partial final directory could not be removed"
            ),
        }
    }

    /// Recursively delete the job's final directory.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] for any failure other than the directory
    /// already being absent.
    pub fn remove_final_dir(&self, name: &JobName) -> FsOpsResult<Removal> {
        let final_dir = self.layout.final_dir(name);
        match fs::remove_dir_all(&final_dir) {
            Ok(()) => Ok(Removal::Removed),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Removal::AlreadyGone),
            Err(source) => Err(FsOpsError::io("reclaim.remove_dir", final_dir, source)),
        }
    }

    fn mark_degraded(&self, name: &JobName, err: &FsOpsError) {
        let mut guard = self.lock_health_flag();
        if *guard {
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                job = %name,
                operation = err.operation(),
                error = ?err,
                "relocation still failing"
            );
        } else {
            *guard = true;
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                job = %name,
                operation = err.operation(),
                error = ?err,
                "relocation failed; storage degraded"
            );
            let _ = self.events.publish(Event::HealthChanged {
                degraded: vec![HEALTH_COMPONENT.to_string()],
            });
        }
    }

    fn mark_recovered(&self) {
        let mut guard = self.lock_health_flag();
        if std::mem::take(&mut *guard) {
            drop(guard);
            let _ = self.events.publish(Event::HealthChanged { degraded: vec![] });
            info!(component = HEALTH_COMPONENT, "storage recovered");
        }
    }

    fn lock_health_flag(&self) -> MutexGuard<'_, bool> {
        self.degraded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn move_file(source: &Path, destination: &Path) -> FsOpsResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(FsOpsError::io("relocate.rename", source, err))
        }
        Err(rename_err) => {
            debug!(
                source = %source.display(),
                error = %rename_err,
                "rename failed; copying instead"
            );
            copy_then_remove(source, destination)
        }
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> FsOpsResult<()> {
    fs::copy(source, destination)
        .map_err(|err| FsOpsError::io("relocate.copy", destination, err))?;
    fs::remove_file(source).map_err(|err| FsOpsError::io("relocate.cleanup", source, err))
}
