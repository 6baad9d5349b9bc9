//! Storage layout for staged and final artifacts.

use std::path::{Path, PathBuf};

use structura_core::JobName;

/// Resolves where a job's files live before and after relocation.
///
/// Staged files sit directly in the shared working root; final files live in a
/// per-job directory under the assets root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    working_root: PathBuf,
    assets_root: PathBuf,
}

impl ArtifactLayout {
    /// Build a layout over the given roots.
    #[must_use]
    pub fn new(working_root: impl Into<PathBuf>, assets_root: impl Into<PathBuf>) -> Self {
        Self {
            working_root: working_root.into(),
            assets_root: assets_root.into(),
        }
    }

    /// Shared working root the engine writes into.
    #[must_use]
    pub fn working_root(&self) -> &Path {
        &self.working_root
    }

    /// Root holding one directory per ready job.
    #[must_use]
    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    /// `<working>/<job>.mcpack`
    #[must_use]
    pub fn staged_bundle(&self, name: &JobName) -> PathBuf {
        self.working_root.join(name.staged_bundle_file())
    }

    /// `<working>/<job>- block list.txt`
    #[must_use]
    pub fn staged_manifest(&self, name: &JobName) -> PathBuf {
        self.working_root.join(name.staged_manifest_file())
    }

    /// `<assets>/<job>`
    #[must_use]
    pub fn final_dir(&self, name: &JobName) -> PathBuf {
        self.assets_root.join(name.as_str())
    }

    /// `<assets>/<job>/<job>.mcpack`
    #[must_use]
    pub fn final_bundle(&self, name: &JobName) -> PathBuf {
        self.final_dir(name).join(name.final_bundle_file())
    }

    /// `<assets>/<job>/<job>-block_list.txt`
    #[must_use]
    pub fn final_manifest(&self, name: &JobName) -> PathBuf {
        self.final_dir(name).join(name.final_manifest_file())
    }

    /// Whether anything currently occupies the job's final directory name.
    ///
    /// Errors other than "not found" are treated as occupied so a colliding
    /// name is never admitted on an unreadable path.
    #[must_use]
    pub fn final_dir_exists(&self, name: &JobName) -> bool {
        self.final_dir(name).try_exists().unwrap_or(true)
    }
}
