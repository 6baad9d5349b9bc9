//! Scripted conversion engine that records every call.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use structura_core::{
    ConversionEngine, ConversionStep, EngineError, EngineFactory, EngineProtocol, EngineResult,
    JobName, Offset,
};

/// One call observed by a scripted engine session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `initialize(name)`
    Initialize(String),
    /// `set_opacity(transparency)`
    SetOpacity(f64),
    /// `add_model(key, structure)`
    AddModel {
        /// Model key.
        key: String,
        /// Structure path as passed in.
        structure: PathBuf,
    },
    /// `set_model_offset(key, offset)`
    SetModelOffset {
        /// Model key.
        key: String,
        /// Offset as passed in.
        offset: Offset,
    },
    /// `generate()`
    Generate,
    /// `generate_manifest()`
    GenerateManifest,
    /// `compile()`
    Compile,
}

impl RecordedCall {
    /// Protocol step this call corresponds to.
    #[must_use]
    pub const fn step(&self) -> ConversionStep {
        match self {
            Self::Initialize(_) => ConversionStep::Initialize,
            Self::SetOpacity(_) => ConversionStep::SetOpacity,
            Self::AddModel { .. } => ConversionStep::AddModel,
            Self::SetModelOffset { .. } => ConversionStep::SetModelOffset,
            Self::Generate => ConversionStep::Generate,
            Self::GenerateManifest => ConversionStep::GenerateManifest,
            Self::Compile => ConversionStep::Compile,
        }
    }
}

/// Engine factory whose sessions record calls and follow a script.
///
/// By default sessions write both the bundle and the block list on `compile`.
#[derive(Clone)]
pub struct ScriptedEngineFactory {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    sessions: Arc<AtomicUsize>,
    fail_at: Option<ConversionStep>,
    write_bundle: bool,
    write_manifest: bool,
    compile_delay: Option<Duration>,
}

impl ScriptedEngineFactory {
    /// Factory whose sessions succeed and write both artifacts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(AtomicUsize::new(0)),
            fail_at: None,
            write_bundle: true,
            write_manifest: true,
            compile_delay: None,
        }
    }

    /// Fail when `step` is called.
    #[must_use]
    pub const fn failing_at(mut self, step: ConversionStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Never write the block list.
    #[must_use]
    pub const fn without_manifest(mut self) -> Self {
        self.write_manifest = false;
        self
    }

    /// Report success from `compile` without writing a bundle.
    #[must_use]
    pub const fn without_bundle(mut self) -> Self {
        self.write_bundle = false;
        self
    }

    /// Block the calling thread for `delay` inside `compile`.
    #[must_use]
    pub const fn with_compile_delay(mut self, delay: Duration) -> Self {
        self.compile_delay = Some(delay);
        self
    }

    /// Every call recorded so far, across sessions.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Protocol steps recorded so far, across sessions.
    #[must_use]
    pub fn steps(&self) -> Vec<ConversionStep> {
        lock(&self.calls).iter().map(RecordedCall::step).collect()
    }

    /// Number of sessions opened.
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, working_root: &Path) -> EngineResult<Box<dyn ConversionEngine>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            script: self.clone(),
            working_root: working_root.to_path_buf(),
            protocol: EngineProtocol::new(),
            name: None,
        }))
    }
}

struct ScriptedEngine {
    script: ScriptedEngineFactory,
    working_root: PathBuf,
    protocol: EngineProtocol,
    name: Option<JobName>,
}

impl ScriptedEngine {
    fn record(&mut self, call: RecordedCall) -> EngineResult<()> {
        let step = call.step();
        lock(&self.script.calls).push(call);
        self.protocol.enter(step)?;
        if self.script.fail_at == Some(step) {
            return Err(EngineError::failed(step.as_str(), "scripted failure"));
        }
        Ok(())
    }

    fn write(&self, file_name: &str, contents: &[u8]) -> EngineResult<()> {
        let path = self.working_root.join(file_name);
        fs::write(&path, contents).map_err(|source| EngineError::io("scripted.write", path, source))
    }
}

impl ConversionEngine for ScriptedEngine {
    fn initialize(&mut self, pack_name: &JobName) -> EngineResult<()> {
        self.record(RecordedCall::Initialize(pack_name.to_string()))?;
        self.name = Some(pack_name.clone());
        Ok(())
    }

    fn set_opacity(&mut self, transparency: f64) -> EngineResult<()> {
        self.record(RecordedCall::SetOpacity(transparency))
    }

    fn add_model(&mut self, key: &str, structure: &Path) -> EngineResult<()> {
        self.record(RecordedCall::AddModel {
            key: key.to_string(),
            structure: structure.to_path_buf(),
        })?;
        self.protocol.register_model(key);
        Ok(())
    }

    fn set_model_offset(&mut self, key: &str, offset: Offset) -> EngineResult<()> {
        self.record(RecordedCall::SetModelOffset {
            key: key.to_string(),
            offset,
        })?;
        self.protocol.require_model(key)
    }

    fn generate(&mut self) -> EngineResult<()> {
        self.record(RecordedCall::Generate)
    }

    fn generate_manifest(&mut self) -> EngineResult<()> {
        self.record(RecordedCall::GenerateManifest)
    }

    fn compile(&mut self) -> EngineResult<()> {
        self.record(RecordedCall::Compile)?;
        if let Some(delay) = self.script.compile_delay {
            thread::sleep(delay);
        }
        let Some(name) = self.name.clone() else {
            return Err(EngineError::OutOfSequence {
                expected: Some(ConversionStep::Initialize),
                actual: ConversionStep::Compile,
            });
        };
        if self.script.write_bundle {
            self.write(&name.staged_bundle_file(), name.as_str().as_bytes())?;
        }
        if self.script.write_manifest {
            self.write(&name.staged_manifest_file(), b"minecraft:stone 1\n")?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestWorkspace;
    use anyhow::Result;
    use structura_core::DEFAULT_MODEL_KEY;

    fn drive(engine: &mut dyn ConversionEngine, name: &JobName) -> EngineResult<()> {
        engine.initialize(name)?;
        engine.set_opacity(0.5)?;
        engine.add_model(DEFAULT_MODEL_KEY, Path::new("/structures/a.mcstructure"))?;
        engine.set_model_offset(DEFAULT_MODEL_KEY, Offset::default())?;
        engine.generate()?;
        engine.generate_manifest()?;
        engine.compile()
    }

    #[test]
    fn records_calls_and_writes_outputs() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let factory = ScriptedEngineFactory::new();
        let name = JobName::parse("fort")?;
        let mut engine = factory.open(&workspace.working_root())?;
        drive(engine.as_mut(), &name)?;

        assert_eq!(factory.steps(), ConversionStep::SEQUENCE.to_vec());
        assert_eq!(factory.sessions(), 1);
        assert!(workspace.working_root().join("fort.mcpack").is_file());
        assert!(
            workspace
                .working_root()
                .join("fort- block list.txt")
                .is_file()
        );
        Ok(())
    }

    #[test]
    fn fails_at_scripted_step() -> Result<()> {
        let workspace = TestWorkspace::new()?;
        let factory = ScriptedEngineFactory::new().failing_at(ConversionStep::Generate);
        let mut engine = factory.open(&workspace.working_root())?;
        let err = drive(engine.as_mut(), &JobName::parse("fort")?).expect_err("scripted");
        assert!(matches!(
            err,
            EngineError::Failed {
                operation: "generate",
                ..
            }
        ));
        assert_eq!(factory.steps().last(), Some(&ConversionStep::Generate));
        Ok(())
    }
}
