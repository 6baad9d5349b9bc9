//! In-process engine that writes placeholder packs; opt-in for local runs.
//!
//! The bundle is a zip archive holding a `manifest.json` that describes the
//! request. The block list is optional per factory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use structura_core::{
    ConversionEngine, ConversionStep, EngineError, EngineFactory, EngineResult, JobName, Offset,
};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::params::PackParams;

const MANIFEST_ENTRY: &str = "manifest.json";
const STRUCTURE_DIR: &str = "structures";

/// Opens [`StubEngine`] sessions.
#[derive(Debug, Clone, Copy)]
pub struct StubEngineFactory {
    write_block_list: bool,
}

impl StubEngineFactory {
    /// Factory whose sessions also write a block list during `generate_manifest`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            write_block_list: true,
        }
    }

    /// Factory whose sessions never produce a block list.
    #[must_use]
    pub const fn without_block_list() -> Self {
        Self {
            write_block_list: false,
        }
    }
}

impl Default for StubEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for StubEngineFactory {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn open(&self, working_root: &Path) -> EngineResult<Box<dyn ConversionEngine>> {
        Ok(Box::new(StubEngine {
            working_root: working_root.to_path_buf(),
            params: PackParams::default(),
            write_block_list: self.write_block_list,
        }))
    }
}

/// Engine that packages the raw structure into a zip bundle.
#[derive(Debug)]
pub struct StubEngine {
    working_root: PathBuf,
    params: PackParams,
    write_block_list: bool,
}

#[derive(Serialize)]
struct BundleManifest<'a> {
    name: &'a str,
    transparency: f64,
    offset: [i32; 3],
    structure: String,
    structure_bytes: u64,
}

impl StubEngine {
    fn write_bundle(&self, name: &JobName, structure: &Path) -> EngineResult<PathBuf> {
        let bytes = fs::read(structure)
            .map_err(|source| EngineError::io("compile.read_structure", structure, source))?;
        let entry_name = structure
            .file_name()
            .map_or_else(|| name.to_string(), |file| file.to_string_lossy().into_owned());
        let manifest = BundleManifest {
            name: name.as_str(),
            transparency: self.params.transparency(),
            offset: self.params.offset().as_array(),
            structure: entry_name.clone(),
            structure_bytes: bytes.len() as u64,
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)
            .map_err(|source| EngineError::failed("compile.encode_manifest", source))?;

        let target = self.working_root.join(name.staged_bundle_file());
        let file = File::create(&target)
            .map_err(|source| EngineError::io("compile.create_bundle", &target, source))?;
        let mut writer = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        writer
            .start_file(MANIFEST_ENTRY, options)
            .map_err(|source| EngineError::failed("compile.write_manifest", source))?;
        writer
            .write_all(&manifest_json)
            .map_err(|source| EngineError::io("compile.write_manifest", &target, source))?;
        writer
            .start_file(format!("{STRUCTURE_DIR}/{entry_name}"), options)
            .map_err(|source| EngineError::failed("compile.write_structure", source))?;
        writer
            .write_all(&bytes)
            .map_err(|source| EngineError::io("compile.write_structure", &target, source))?;
        writer
            .finish()
            .map_err(|source| EngineError::failed("compile.finish", source))?;
        Ok(target)
    }

    fn write_block_list(&self, name: &JobName) -> EngineResult<()> {
        let structure = self.params.structure().ok_or(EngineError::UnknownModel {
            key: String::new(),
        })?;
        let size = fs::metadata(structure)
            .map_err(|source| EngineError::io("generate_manifest.stat", structure, source))?
            .len();
        let target = self.working_root.join(name.staged_manifest_file());
        let Offset { x, y, z } = self.params.offset();
        let body = format!(
            "structure: {}\nbytes: {size}\noffset: {x} {y} {z}\n",
            structure.display()
        );
        fs::write(&target, body)
            .map_err(|source| EngineError::io("generate_manifest.write", &target, source))
    }
}

impl ConversionEngine for StubEngine {
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
        self.params.generate_manifest()?;
        if !self.write_block_list {
            return Ok(());
        }
        let name = self.params.name().cloned().ok_or(EngineError::OutOfSequence {
            expected: Some(ConversionStep::Initialize),
            actual: ConversionStep::GenerateManifest,
        })?;
        self.write_block_list(&name)
    }

    fn compile(&mut self) -> EngineResult<()> {
        let (name, structure) = self.params.compile()?;
        let target = self.write_bundle(&name, &structure)?;
        debug!(job = %name, bundle = %target.display(), "stub bundle written");
        Ok(())
    }
}
