//! Engine adapter that drives an external converter program.
//!
//! # Design
//! - Calls are recorded until `compile`, which runs the program once in the
//!   working root with the collected parameters as arguments.
//! - A non-zero exit fails the step with the exit code and a truncated stderr.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use structura_core::{ConversionEngine, EngineError, EngineFactory, EngineResult, JobName, Offset};
use tracing::{debug, warn};

use crate::params::PackParams;

const STDERR_LIMIT: usize = 4_096;

/// Opens [`CommandEngine`] sessions for a configured converter program.
#[derive(Debug, Clone)]
pub struct CommandEngineFactory {
    program: PathBuf,
}

impl CommandEngineFactory {
    /// Factory running `program` at compile time.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Converter program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl EngineFactory for CommandEngineFactory {
    fn name(&self) -> &'static str {
        "command"
    }

    fn open(&self, working_root: &Path) -> EngineResult<Box<dyn ConversionEngine>> {
        Ok(Box::new(CommandEngine {
            program: self.program.clone(),
            working_root: working_root.to_path_buf(),
            params: PackParams::default(),
        }))
    }
}

/// Engine session that buffers the call sequence and runs the converter once.
#[derive(Debug)]
pub struct CommandEngine {
    program: PathBuf,
    working_root: PathBuf,
    params: PackParams,
}

impl CommandEngine {
    fn arguments(name: &JobName, structure: &Path, params: &PackParams) -> Vec<OsString> {
        let Offset { x, y, z } = params.offset();
        let mut args: Vec<OsString> = vec![
            "--pack-name".into(),
            name.as_str().into(),
            "--transparency".into(),
            params.transparency().to_string().into(),
            "--structure".into(),
            structure.as_os_str().to_owned(),
            "--offset".into(),
            x.to_string().into(),
            y.to_string().into(),
            z.to_string().into(),
        ];
        if params.manifest_requested() {
            args.push("--block-list".into());
        }
        args
    }
}

impl ConversionEngine for CommandEngine {
    fn initialize(&mut self, pack_name: &JobName) -> EngineResult<()> {
        self.params.initialize(pack_name)
    }

    fn set_opacity(&mut self, transparency: f64) -> EngineResult<()> {
        self.params.set_opacity(transparency)
    }

    fn add_model(&mut self, key: &str, structure: &Path) -> EngineResult<()> {
        self.params.add_model(key, structure)
    }

    fn set_model_offset(&mut self, key: &str, offset: Offset) -> EngineResult<()> {
        self.params.set_model_offset(key, offset)
    }

    fn generate(&mut self) -> EngineResult<()> {
        self.params.generate()
    }

    fn generate_manifest(&mut self) -> EngineResult<()> {
        self.params.generate_manifest()
    }

    fn compile(&mut self) -> EngineResult<()> {
        let (name, structure) = self.params.compile()?;
        let args = Self::arguments(&name, &structure, &self.params);
        debug!(
            program = %self.program.display(),
            job = %name,
            "running converter"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.working_root)
            .output()
            .map_err(|source| EngineError::io("compile.spawn", &self.program, source))?;

        if output.status.success() {
            return Ok(());
        }

        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.len() > STDERR_LIMIT {
            let mut cut = STDERR_LIMIT;
            while !stderr.is_char_boundary(cut) {
                cut -= 1;
            }
            stderr.truncate(cut);
        }
        warn!(
            program = %self.program.display(),
            code = ?output.status.code(),
            "converter exited unsuccessfully"
        );
        Err(EngineError::ProcessFailed {
            program: self.program.display().to_string(),
            code: output.status.code(),
            stderr,
        })
    }
}
