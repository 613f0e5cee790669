use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use crate::config::PipelineConfig;
use crate::focal::FocalEstimate;
use crate::workspace::WorkspaceLayout;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stage {
    ImageListing,
    ComputeFeatures,
    ComputeMatches,
    IncrementalSfm,
    StructureFromKnownPoses,
    ColorizePoints,
    ExportToMvs,
    DensifyPointCloud,
    ReconstructMesh,
    RefineMesh,
    TextureMesh,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ImageListing => "image listing",
            Stage::ComputeFeatures => "feature computation",
            Stage::ComputeMatches => "feature matching",
            Stage::IncrementalSfm => "incremental reconstruction",
            Stage::StructureFromKnownPoses => "structure from known poses",
            Stage::ColorizePoints => "point cloud coloring",
            Stage::ExportToMvs => "export to openMVS",
            Stage::DensifyPointCloud => "dense point cloud fusion",
            Stage::ReconstructMesh => "mesh reconstruction",
            Stage::RefineMesh => "mesh refinement",
            Stage::TextureMesh => "mesh texturing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One external program call: what to run, and which files must be on disk
/// around it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInvocation {
    pub stage: Stage,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Files the program reads, checked before launch.
    pub requires: Vec<PathBuf>,
    /// Files the program is expected to leave behind, checked after a clean exit.
    pub produces: Vec<PathBuf>,
}

impl StageInvocation {
    fn new(stage: Stage, program: PathBuf) -> Self {
        Self {
            stage,
            program,
            args: Vec::new(),
            requires: Vec::new(),
            produces: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn flag(self, flag: &str, value: impl Into<OsString>) -> Self {
        self.arg(flag).arg(value)
    }

    fn requires(mut self, path: &Path) -> Self {
        self.requires.push(path.to_path_buf());
        self
    }

    fn produces(mut self, path: &Path) -> Self {
        self.produces.push(path.to_path_buf());
        self
    }

    /// Shell-like rendering for logs and dry runs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Builds the ordered list of tool calls for one run.
///
/// Every stage reads what the previous ones wrote, so the order is fixed.
/// Mesh refinement is only included when enabled in the stage options.
pub fn plan(config: &PipelineConfig, layout: &WorkspaceLayout, focal: FocalEstimate) -> Vec<StageInvocation> {
    let tools = &config.tools;
    let options = &config.options;

    let sfm_data = layout.matches.join("sfm_data.json");
    let sfm_bin = layout.reconstruction.join("sfm_data.bin");
    let robust = layout.reconstruction.join("robust.json");
    let colored = layout.reconstruction.join("sfm_colored.ply");
    let scene = layout.mvs.join("scene.mvs");
    let dense = layout.mvs.join("scene_dense.mvs");
    let mesh = layout.mvs.join("scene_dense_mesh.mvs");
    let refined = layout.mvs.join("scene_dense_mesh_refine.mvs");

    let mut stages = vec![
        StageInvocation::new(Stage::ImageListing, tools.openmvg("openMVG_main_SfMInit_ImageListing"))
            .flag("-i", &config.input_dir)
            .flag("-d", &tools.sensor_db)
            .flag("-o", &layout.matches)
            .flag("-f", focal.to_string())
            .requires(&config.input_dir)
            .requires(&tools.sensor_db)
            .produces(&sfm_data),
        StageInvocation::new(Stage::ComputeFeatures, tools.openmvg("openMVG_main_ComputeFeatures"))
            .flag("-i", &sfm_data)
            .flag("-o", &layout.matches)
            .flag("-p", &options.describer_preset)
            .requires(&sfm_data),
        StageInvocation::new(Stage::ComputeMatches, tools.openmvg("openMVG_main_ComputeMatches"))
            .flag("-i", &sfm_data)
            .flag("-o", &layout.matches)
            .requires(&sfm_data),
        StageInvocation::new(Stage::IncrementalSfm, tools.openmvg("openMVG_main_IncrementalSfM"))
            .flag("-i", &sfm_data)
            .flag("-m", &layout.matches)
            .flag("-o", &layout.reconstruction)
            .requires(&sfm_data)
            .produces(&sfm_bin),
        StageInvocation::new(
            Stage::StructureFromKnownPoses,
            tools.openmvg("openMVG_main_ComputeStructureFromKnownPoses"),
        )
        .flag("-i", &sfm_bin)
        .flag("-m", &layout.matches)
        .flag("-o", &robust)
        .requires(&sfm_bin)
        .produces(&robust),
        StageInvocation::new(Stage::ColorizePoints, tools.openmvg("openMVG_main_ComputeSfM_DataColor"))
            .flag("-i", &robust)
            .flag("-o", &colored)
            .requires(&robust)
            .produces(&colored),
        StageInvocation::new(Stage::ExportToMvs, tools.openmvg("openMVG_main_openMVG2openMVS"))
            .flag("-i", &robust)
            .flag("-o", &scene)
            .flag("-d", &layout.mvs)
            .requires(&robust)
            .produces(&scene),
        StageInvocation::new(Stage::DensifyPointCloud, tools.openmvs("DensifyPointCloud"))
            .arg(&scene)
            .flag("--number-views-fuse", options.views_to_fuse.to_string())
            .requires(&scene)
            .produces(&dense),
        StageInvocation::new(Stage::ReconstructMesh, tools.openmvs("ReconstructMesh"))
            .arg(&dense)
            .requires(&dense)
            .produces(&mesh),
    ];

    let textured_input = if options.refine_mesh {
        stages.push(
            StageInvocation::new(Stage::RefineMesh, tools.openmvs("RefineMesh"))
                .arg(&mesh)
                .requires(&mesh)
                .produces(&refined),
        );
        &refined
    } else {
        &mesh
    };

    stages.push(
        StageInvocation::new(Stage::TextureMesh, tools.openmvs("TextureMesh"))
            .arg(textured_input)
            .flag("--export-type", &options.export_type)
            .flag("--empty-color", &options.empty_color)
            .requires(textured_input),
    );

    stages
}
