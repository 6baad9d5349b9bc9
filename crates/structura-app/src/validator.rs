//! Admission checks for conversion requests.
//!
//! # Design
//! - Checks run in a fixed order and stop at the first failure: name presence,
//!   name shape, source presence, source confinement and existence, opacity
//!   range, then final-directory collision.
//! - Sources resolve against a canonical [`SourceRoot`]; relative paths are
//!   joined onto it and symlinks are followed before the containment check.
//! - Validation only reads the filesystem; in-flight collisions are caught by
//!   the registry reservation that follows it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use structura_core::{
    ConversionRequest, CoreError, JobName, Offset, Opacity, RequestRejection,
};
use structura_fsops::ArtifactLayout;

/// A request that passed every admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Job name.
    pub name: JobName,
    /// Canonical source structure file under the [`SourceRoot`].
    pub source: PathBuf,
    /// Model offset.
    pub offset: Offset,
    /// Opacity.
    pub opacity: Opacity,
}

/// Canonical directory every source structure file must live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    root: PathBuf,
}

impl SourceRoot {
    /// Resolve `path` to its canonical form.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when `path` does not exist or cannot be resolved.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: fs::canonicalize(path)?,
        })
    }

    /// Canonical root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, supplied: &Path) -> Result<PathBuf, RequestRejection> {
        let candidate = if supplied.is_absolute() {
            supplied.to_path_buf()
        } else {
            self.root.join(supplied)
        };
        let not_found = || RequestRejection::SourceNotFound {
            path: supplied.to_path_buf(),
        };
        let resolved = fs::canonicalize(&candidate).map_err(|_| not_found())?;
        if !resolved.starts_with(&self.root) {
            return Err(RequestRejection::SourceOutsideRoot {
                path: supplied.to_path_buf(),
            });
        }
        if !resolved.is_file() {
            return Err(not_found());
        }
        Ok(resolved)
    }
}

/// Check `request` against the naming rules, the source root and the current
/// storage layout.
///
/// # Errors
///
/// Returns the first [`RequestRejection`] that applies.
pub fn validate(
    request: &ConversionRequest,
    layout: &ArtifactLayout,
    sources: &SourceRoot,
) -> Result<ValidatedRequest, RequestRejection> {
    if request.name.trim().is_empty() {
        return Err(RequestRejection::MissingName);
    }
    let name = JobName::parse(&request.name).map_err(|err| match err {
        CoreError::InvalidJobName { reason, value } => RequestRejection::InvalidName { reason, value },
        _ => RequestRejection::InvalidName {
            reason: "rejected",
            value: request.name.clone(),
        },
    })?;

    let source = match request.source.as_deref() {
        Some(path) if !path.as_os_str().is_empty() => sources.resolve(path)?,
        _ => return Err(RequestRejection::MissingInput),
    };

    let opacity = Opacity::from_percent(request.opacity_percent).map_err(|_| {
        RequestRejection::OpacityOutOfRange {
            value: request.opacity_percent,
        }
    })?;

    if layout.final_dir_exists(&name) {
        return Err(RequestRejection::AlreadyExists {
            name: name.to_string(),
        });
    }

    Ok(ValidatedRequest {
        name,
        source,
        offset: request.offset,
        opacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use structura_test_support::TestWorkspace;

    fn layout(workspace: &TestWorkspace) -> ArtifactLayout {
        ArtifactLayout::new(workspace.working_root(), workspace.assets_root())
    }

    fn check(
        workspace: &TestWorkspace,
        request: &ConversionRequest,
    ) -> Result<Result<ValidatedRequest, RequestRejection>> {
        let sources = SourceRoot::new(workspace.structures_root())?;
        Ok(validate(request, &layout(workspace), &sources))
    }

    #[test]
    fn accepts_well_formed_request() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let source = workspace.write_structure("castle.mcstructure", b"nbt")?;
        let request = ConversionRequest::new("castle", &source)
            .with_offset(Offset::new(1, 2, 3))
            .with_opacity(37);

        let validated = check(&workspace, &request)??;
        assert_eq!(validated.name.as_str(), "castle");
        assert_eq!(validated.source, fs::canonicalize(&source)?);
        assert_eq!(validated.offset, Offset::new(1, 2, 3));
        assert_eq!(validated.opacity.percent(), 37);
        Ok(())
    }

    #[test]
    fn blank_name_is_missing() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let source = workspace.write_structure("a.mcstructure", b"x")?;
        for name in ["", "   "] {
            let request = ConversionRequest::new(name, &source);
            assert_eq!(
                check(&workspace, &request)?,
                Err(RequestRejection::MissingName)
            );
        }
        Ok(())
    }

    #[test]
    fn path_like_names_are_invalid() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let source = workspace.write_structure("a.mcstructure", b"x")?;
        for name in ["../escape", "a/b", ".."] {
            let request = ConversionRequest::new(name, &source);
            assert!(matches!(
                check(&workspace, &request)?,
                Err(RequestRejection::InvalidName { .. })
            ));
        }
        Ok(())
    }

    #[test]
    fn missing_source_reference_is_rejected() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let mut request = ConversionRequest::new("castle", "");
        assert_eq!(
            check(&workspace, &request)?,
            Err(RequestRejection::MissingInput)
        );
        request.source = None;
        assert_eq!(
            check(&workspace, &request)?,
            Err(RequestRejection::MissingInput)
        );
        Ok(())
    }

    #[test]
    fn nonexistent_source_is_rejected() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let missing = workspace.structures_root().join("nope.mcstructure");
        let request = ConversionRequest::new("castle", &missing);
        assert_eq!(
            check(&workspace, &request)?,
            Err(RequestRejection::SourceNotFound { path: missing })
        );
        Ok(())
    }

    #[test]
    fn relative_source_resolves_under_the_root() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let source = workspace.write_structure("castle.mcstructure", b"nbt")?;
        let request = ConversionRequest::new("castle", "castle.mcstructure");
        let validated = check(&workspace, &request)??;
        assert_eq!(validated.source, fs::canonicalize(&source)?);
        Ok(())
    }

    #[test]
    fn sources_outside_the_root_are_rejected() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let stray = workspace.path().join("stray.mcstructure");
        fs::write(&stray, b"secret")?;
        workspace.write_structure("castle.mcstructure", b"nbt")?;

        for supplied in [
            stray.clone(),
            PathBuf::from("../stray.mcstructure"),
            workspace
                .structures_root()
                .join("..")
                .join("stray.mcstructure"),
        ] {
            let request = ConversionRequest::new("castle", &supplied);
            assert_eq!(
                check(&workspace, &request)?,
                Err(RequestRejection::SourceOutsideRoot { path: supplied })
            );
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_leaving_the_root_are_rejected() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let stray = workspace.path().join("stray.mcstructure");
        fs::write(&stray, b"secret")?;
        let link = workspace.structures_root().join("link.mcstructure");
        std::os::unix::fs::symlink(&stray, &link)?;

        let request = ConversionRequest::new("castle", &link);
        assert_eq!(
            check(&workspace, &request)?,
            Err(RequestRejection::SourceOutsideRoot { path: link })
        );
        Ok(())
    }

    #[test]
    fn directories_are_not_sources() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let nested = workspace.structures_root().join("nested");
        fs::create_dir(&nested)?;
        let request = ConversionRequest::new("castle", &nested);
        assert_eq!(
            check(&workspace, &request)?,
            Err(RequestRejection::SourceNotFound { path: nested })
        );
        Ok(())
    }

    #[test]
    fn opacity_outside_percent_range_is_rejected() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let source = workspace.write_structure("a.mcstructure", b"x")?;
        for value in [-1, 101] {
            let request = ConversionRequest::new("castle", &source).with_opacity(value);
            assert_eq!(
                check(&workspace, &request)?,
                Err(RequestRejection::OpacityOutOfRange { value })
            );
        }
        Ok(())
    }

    #[test]
    fn existing_final_directory_is_a_collision() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let source = workspace.write_structure("a.mcstructure", b"x")?;
        workspace.occupy("castle")?;
        let request = ConversionRequest::new("castle", &source);
        assert_eq!(
            check(&workspace, &request)?,
            Err(RequestRejection::AlreadyExists {
                name: "castle".to_string()
            })
        );
        Ok(())
    }

    #[test]
    fn earlier_checks_win() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        workspace.occupy("castle")?;
        let request = ConversionRequest::new("castle", workspace.path().join("absent"))
            .with_opacity(500);
        assert!(matches!(
            check(&workspace, &request)?,
            Err(RequestRejection::SourceNotFound { .. })
        ));
        Ok(())
    }
}
