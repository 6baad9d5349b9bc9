//! Conversion engine capability and its fixed call protocol.
//!
//! The engine turns a structure file into a pack bundle. Callers drive it
//! through exactly one sequence per job:
//! `initialize → set_opacity → add_model → set_model_offset → generate →
//! generate_manifest → compile`. Implementations embed an [`EngineProtocol`]
//! to reject anything else.

mod protocol;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::model::{JobName, Offset};

pub use protocol::EngineProtocol;

/// Model key used for the single model registered per job.
pub const DEFAULT_MODEL_KEY: &str = "";

/// Steps of the engine call protocol, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStep {
    /// Bind a pack context to the job name.
    Initialize,
    /// Set global transparency.
    SetOpacity,
    /// Register the structure file under a model key.
    AddModel,
    /// Offset the registered model.
    SetModelOffset,
    /// Generate tagged entity representations.
    Generate,
    /// Generate the auxiliary block list.
    GenerateManifest,
    /// Package the bundle.
    Compile,
}

impl ConversionStep {
    /// Protocol order.
    pub const SEQUENCE: [Self; 7] = [
        Self::Initialize,
        Self::SetOpacity,
        Self::AddModel,
        Self::SetModelOffset,
        Self::Generate,
        Self::GenerateManifest,
        Self::Compile,
    ];

    /// Step expected after `self`, `None` after compilation.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Initialize => Some(Self::SetOpacity),
            Self::SetOpacity => Some(Self::AddModel),
            Self::AddModel => Some(Self::SetModelOffset),
            Self::SetModelOffset => Some(Self::Generate),
            Self::Generate => Some(Self::GenerateManifest),
            Self::GenerateManifest => Some(Self::Compile),
            Self::Compile => None,
        }
    }

    /// Snake-case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SetOpacity => "set_opacity",
            Self::AddModel => "add_model",
            Self::SetModelOffset => "set_model_offset",
            Self::Generate => "generate",
            Self::GenerateManifest => "generate_manifest",
            Self::Compile => "compile",
        }
    }
}

impl fmt::Display for ConversionStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One engine session, bound to a single job.
///
/// Implementations write `<name>.mcpack` and optionally `<name>- block list.txt`
/// into the working root they were opened with.
pub trait ConversionEngine: Send {
    /// Bind a pack context to the job name.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or the engine fails.
    fn initialize(&mut self, pack_name: &JobName) -> EngineResult<()>;

    /// Set global transparency in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or the value is rejected.
    fn set_opacity(&mut self, transparency: f64) -> EngineResult<()>;

    /// Register a structure file under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or the engine fails.
    fn add_model(&mut self, key: &str, structure: &Path) -> EngineResult<()>;

    /// Offset the model registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or `key` is unknown.
    fn set_model_offset(&mut self, key: &str, offset: Offset) -> EngineResult<()>;

    /// Generate tagged entity representations.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or the engine fails.
    fn generate(&mut self) -> EngineResult<()>;

    /// Generate the auxiliary block list, if the engine produces one.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or the engine fails.
    fn generate_manifest(&mut self) -> EngineResult<()>;

    /// Package the bundle into the working root.
    ///
    /// # Errors
    ///
    /// Returns an error when the call is out of sequence or packaging fails.
    fn compile(&mut self) -> EngineResult<()>;
}

/// Opens engine sessions bound to a working root.
pub trait EngineFactory: Send + Sync {
    /// Implementation identifier (e.g. `stub`, `command`).
    fn name(&self) -> &'static str;

    /// Open a fresh session that writes its output under `working_root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine cannot be prepared.
    fn open(&self, working_root: &Path) -> EngineResult<Box<dyn ConversionEngine>>;
}
