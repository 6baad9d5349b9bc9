//! Drives one engine session through the fixed conversion call sequence.
//!
//! # Design
//! - One engine session per job, opened on the shared working root.
//! - The source path is made absolute before it reaches the engine.
//! - The first failing step aborts the job; nothing is retried and staged
//!   files are left where the engine wrote them.

use std::path::{self, PathBuf};
use std::sync::Arc;

use structura_core::{
    ConversionStep, DEFAULT_MODEL_KEY, EngineError, EngineFactory, EngineResult, JobError,
    JobResult,
};
use structura_fsops::ArtifactLayout;
use structura_telemetry::Metrics;
use tracing::{debug, warn};

use crate::validator::ValidatedRequest;

const STEP_OK: &str = "ok";
const STEP_ERROR: &str = "error";

/// Runs validated requests through an engine.
#[derive(Clone)]
pub struct ConversionInvoker {
    factory: Arc<dyn EngineFactory>,
    layout: ArtifactLayout,
    metrics: Metrics,
}

impl ConversionInvoker {
    /// Invoker opening sessions from `factory` on `layout`'s working root.
    #[must_use]
    pub const fn new(
        factory: Arc<dyn EngineFactory>,
        layout: ArtifactLayout,
        metrics: Metrics,
    ) -> Self {
        Self {
            factory,
            layout,
            metrics,
        }
    }

    /// Name of the engine implementation in use.
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.factory.name()
    }

    /// Convert `request`, leaving the staged bundle in the working root.
    ///
    /// Returns the staged bundle path.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::ConversionFailure`] naming the first step that
    /// failed, including a `compile` that produced no bundle.
    pub fn convert(&self, request: &ValidatedRequest) -> JobResult<PathBuf> {
        let name = &request.name;
        let source = path::absolute(&request.source).map_err(|err| {
            self.failure(
                ConversionStep::AddModel,
                EngineError::io("normalize.source", &request.source, err),
            )
        })?;
        let mut session = self
            .factory
            .open(self.layout.working_root())
            .map_err(|err| self.failure(ConversionStep::Initialize, err))?;
        let engine = session.as_mut();
        debug!(job = %name, engine = self.factory.name(), "engine session opened");

        self.step(ConversionStep::Initialize, || engine.initialize(name))?;
        self.step(ConversionStep::SetOpacity, || {
            engine.set_opacity(request.opacity.transparency())
        })?;
        self.step(ConversionStep::AddModel, || {
            engine.add_model(DEFAULT_MODEL_KEY, &source)
        })?;
        self.step(ConversionStep::SetModelOffset, || {
            engine.set_model_offset(DEFAULT_MODEL_KEY, request.offset)
        })?;
        self.step(ConversionStep::Generate, || engine.generate())?;
        self.step(ConversionStep::GenerateManifest, || engine.generate_manifest())?;
        self.step(ConversionStep::Compile, || engine.compile())?;

        let bundle = self.layout.staged_bundle(name);
        if !bundle.is_file() {
            return Err(self.failure(
                ConversionStep::Compile,
                EngineError::MissingOutput { path: bundle },
            ));
        }
        Ok(bundle)
    }

    fn step(
        &self,
        step: ConversionStep,
        call: impl FnOnce() -> EngineResult<()>,
    ) -> JobResult<()> {
        match call() {
            Ok(()) => {
                self.metrics.inc_job_step(step.as_str(), STEP_OK);
                Ok(())
            }
            Err(err) => {
                self.metrics.inc_job_step(step.as_str(), STEP_ERROR);
                Err(self.failure(step, err))
            }
        }
    }

    fn failure(&self, step: ConversionStep, source: EngineError) -> JobError {
        warn!(
            step = %step,
            engine = self.factory.name(),
            error = ?source,
            "conversion step failed"
        );
        JobError::ConversionFailure { step, source }
    }
}
