//! Parameters collected while an engine session walks the call protocol.

use std::path::{Path, PathBuf};

use structura_core::{
    ConversionStep, EngineError, EngineProtocol, EngineResult, JobName, Offset,
};

/// Everything an adapter needs by the time `compile` runs.
#[derive(Debug, Clone, Default)]
pub struct PackParams {
    protocol: EngineProtocol,
    name: Option<JobName>,
    transparency: f64,
    structure: Option<PathBuf>,
    offset: Offset,
    manifest_requested: bool,
}

impl PackParams {
    pub(crate) fn initialize(&mut self, name: &JobName) -> EngineResult<()> {
        self.protocol.enter(ConversionStep::Initialize)?;
        self.name = Some(name.clone());
        Ok(())
    }

    pub(crate) fn set_opacity(&mut self, transparency: f64) -> EngineResult<()> {
        self.protocol.enter(ConversionStep::SetOpacity)?;
        if !(0.0..=1.0).contains(&transparency) {
            return Err(EngineError::InvalidParameter {
                field: "transparency",
                reason: "must be within [0, 1]",
                value: Some(transparency.to_string()),
            });
        }
        self.transparency = transparency;
        Ok(())
    }

    pub(crate) fn add_model(&mut self, key: &str, structure: &Path) -> EngineResult<()> {
        self.protocol.enter(ConversionStep::AddModel)?;
        if !structure.is_file() {
            return Err(EngineError::InvalidParameter {
                field: "structure",
                reason: "must name an existing file",
                value: Some(structure.display().to_string()),
            });
        }
        self.protocol.register_model(key);
        self.structure = Some(structure.to_path_buf());
        Ok(())
    }

    pub(crate) fn set_model_offset(&mut self, key: &str, offset: Offset) -> EngineResult<()> {
        self.protocol.enter(ConversionStep::SetModelOffset)?;
        self.protocol.require_model(key)?;
        self.offset = offset;
        Ok(())
    }

    pub(crate) fn generate(&mut self) -> EngineResult<()> {
        self.protocol.enter(ConversionStep::Generate)
    }

    pub(crate) fn generate_manifest(&mut self) -> EngineResult<()> {
        self.protocol.enter(ConversionStep::GenerateManifest)?;
        self.manifest_requested = true;
        Ok(())
    }

    pub(crate) fn compile(&mut self) -> EngineResult<(JobName, PathBuf)> {
        self.protocol.enter(ConversionStep::Compile)?;
        let name = self.name.clone().ok_or(EngineError::OutOfSequence {
            expected: Some(ConversionStep::Initialize),
            actual: ConversionStep::Compile,
        })?;
        let structure = self.structure.clone().ok_or(EngineError::OutOfSequence {
            expected: Some(ConversionStep::AddModel),
            actual: ConversionStep::Compile,
        })?;
        Ok((name, structure))
    }

    /// Pack name bound during `initialize`.
    #[must_use]
    pub const fn name(&self) -> Option<&JobName> {
        self.name.as_ref()
    }

    /// Global transparency in `[0, 1]`.
    #[must_use]
    pub const fn transparency(&self) -> f64 {
        self.transparency
    }

    /// Structure file registered during `add_model`.
    #[must_use]
    pub fn structure(&self) -> Option<&Path> {
        self.structure.as_deref()
    }

    /// Offset applied to the model.
    #[must_use]
    pub const fn offset(&self) -> Offset {
        self.offset
    }

    /// Whether `generate_manifest` ran.
    #[must_use]
    pub const fn manifest_requested(&self) -> bool {
        self.manifest_requested
    }
}
