use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::{PipelineError, Result};

const DEFAULT_OPENMVS_DIR: &str = "/usr/local/bin/OpenMVS";
const DEFAULT_SENSOR_DB: &str =
    "/home/openMVG/src/openMVG/exif/sensor_width_database/sensor_width_camera_database.txt";

/// Where the external tools and their reference data live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Directory holding the openMVG binaries. When unset the binaries are
    /// looked up through `PATH`.
    pub openmvg_dir: Option<PathBuf>,

    /// Directory holding the openMVS binaries. When unset the binaries are
    /// looked up through `PATH`.
    pub openmvs_dir: Option<PathBuf>,

    /// Camera sensor width database handed to the image listing stage.
    pub sensor_db: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            openmvg_dir: None,
            openmvs_dir: Some(PathBuf::from(DEFAULT_OPENMVS_DIR)),
            sensor_db: PathBuf::from(DEFAULT_SENSOR_DB),
        }
    }
}

impl ToolConfig {
    pub fn openmvg(&self, program: &str) -> PathBuf {
        resolve(self.openmvg_dir.as_deref(), program)
    }

    pub fn openmvs(&self, program: &str) -> PathBuf {
        resolve(self.openmvs_dir.as_deref(), program)
    }
}

fn resolve(dir: Option<&Path>, program: &str) -> PathBuf {
    match dir {
        Some(dir) => dir.join(program),
        None => PathBuf::from(program),
    }
}

/// Knobs passed through to individual stages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Number of views used to fuse each dense point. 0 uses all views.
    pub views_to_fuse: u32,

    /// Run mesh refinement before texturing. Off by default, it needs a lot of memory.
    pub refine_mesh: bool,

    /// Feature describer preset.
    pub describer_preset: String,

    /// Mesh format the textured mesh is exported as.
    pub export_type: String,

    /// RGBA hex color for faces that receive no texture.
    pub empty_color: String,

    /// Check that each stage's input files exist before it runs and its
    /// output files exist after it exits.
    pub verify_artifacts: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            views_to_fuse: 0,
            refine_mesh: false,
            describer_preset: String::from("HIGH"),
            export_type: String::from("obj"),
            empty_color: String::from("00000000"),
            verify_artifacts: true,
        }
    }
}

/// Settings that can be kept in a JSON file and shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub tools: ToolConfig,
    pub options: StageOptions,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|err| PipelineError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Directory of input photographs.
    pub input_dir: PathBuf,

    /// Root under which the matches, reconstruction and mvs folders are created.
    pub output_dir: PathBuf,

    /// Directory the tools run in and by-products are collected from.
    /// Uses the current directory when unset.
    pub working_dir: Option<PathBuf>,

    pub options: StageOptions,

    pub tools: ToolConfig,
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            working_dir: None,
            options: StageOptions::default(),
            tools: ToolConfig::default(),
        }
    }

    pub fn with_file(mut self, file: ConfigFile) -> Self {
        self.options = file.options;
        self.tools = file.tools;
        self
    }

    pub fn with_views_to_fuse(mut self, views: u32) -> Self {
        self.options.views_to_fuse = views;
        self
    }

    pub fn with_refine_mesh(mut self, refine: bool) -> Self {
        self.options.refine_mesh = refine;
        self
    }

    pub fn with_verify_artifacts(mut self, verify: bool) -> Self {
        self.options.verify_artifacts = verify;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }

    /// The same configuration with every path made absolute against the
    /// process' current directory.
    ///
    /// Tools may run in `working_dir`, so relative paths handed to them would
    /// otherwise resolve somewhere other than where the workspace was created.
    pub fn resolved(&self) -> Result<Self> {
        let mut resolved = self.clone();
        resolved.input_dir = std::path::absolute(&self.input_dir)?;
        resolved.output_dir = std::path::absolute(&self.output_dir)?;
        resolved.working_dir = self.working_dir.as_deref().map(std::path::absolute).transpose()?;
        resolved.tools.sensor_db = std::path::absolute(&self.tools.sensor_db)?;
        resolved.tools.openmvg_dir = self.tools.openmvg_dir.as_deref().map(std::path::absolute).transpose()?;
        resolved.tools.openmvs_dir = self.tools.openmvs_dir.as_deref().map(std::path::absolute).transpose()?;
        Ok(resolved)
    }

    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}
