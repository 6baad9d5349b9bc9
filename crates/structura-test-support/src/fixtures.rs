//! Temporary on-disk workspaces.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Temporary directory tree with a working root, an assets root and a place
/// for source structure files. Removed on drop.
pub struct TestWorkspace {
    root: TempDir,
}

impl TestWorkspace {
    /// Create the tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary directories cannot be created.
    pub fn new() -> Result<Self> {
        let root = TempDir::new().context("failed to create temp dir")?;
        for dir in ["work", "assets", "structures"] {
            fs::create_dir_all(root.path().join(dir))
                .with_context(|| format!("failed to create {dir}"))?;
        }
        Ok(Self { root })
    }

    /// Root of the temporary tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Shared engine working root.
    #[must_use]
    pub fn working_root(&self) -> PathBuf {
        self.root.path().join("work")
    }

    /// Root of per-job final directories.
    #[must_use]
    pub fn assets_root(&self) -> PathBuf {
        self.root.path().join("assets")
    }

    /// Directory source structure files are written into.
    #[must_use]
    pub fn structures_root(&self) -> PathBuf {
        self.root.path().join("structures")
    }

    /// Final directory a job with `name` would occupy.
    #[must_use]
    pub fn final_dir(&self, name: &str) -> PathBuf {
        self.assets_root().join(name)
    }

    /// Write a source structure file and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write_structure(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.structures_root().join(file_name);
        fs::write(&path, contents).with_context(|| format!("failed to write {file_name}"))?;
        Ok(path)
    }

    /// Occupy a job's final directory as if an earlier job were still live.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn occupy(&self, name: &str) -> Result<PathBuf> {
        let dir = self.final_dir(name);
        fs::create_dir_all(&dir).with_context(|| format!("failed to occupy {name}"))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_creates_layout() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        assert!(workspace.working_root().is_dir());
        assert!(workspace.assets_root().is_dir());
        assert!(workspace.structures_root().is_dir());
        let structure = workspace.write_structure("a.mcstructure", b"x")?;
        assert!(structure.is_file());
        let occupied = workspace.occupy("taken")?;
        assert_eq!(occupied, workspace.final_dir("taken"));
        assert!(occupied.is_dir());
        Ok(())
    }
}
