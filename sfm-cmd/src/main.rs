use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use pipeline::config::PipelineConfig;
use pipeline::{ConfigFile, OutputStream, Pipeline, PipelineMessage};
use tracing::info;

/// Runs the openMVG / openMVS toolchain over a folder of photos and
/// produces a textured mesh.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input directory of images
    #[arg(short, long)]
    dir: PathBuf,

    /// Output directory to save everything in
    #[arg(short, long)]
    out_dir: PathBuf,

    /// Number of views fused into each dense point, 0 uses all views
    #[arg(short, long)]
    n_views: Option<u32>,

    /// JSON file with tool locations and stage options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera sensor width database
    #[arg(long)]
    sensor_db: Option<PathBuf>,

    /// Directory containing the openMVG binaries
    #[arg(long)]
    openmvg_dir: Option<PathBuf>,

    /// Directory containing the openMVS binaries
    #[arg(long)]
    openmvs_dir: Option<PathBuf>,

    /// Refine the mesh before texturing (needs a lot of memory)
    #[arg(long)]
    refine_mesh: bool,

    /// Only trust exit codes, skip checking for stage input and output files
    #[arg(long)]
    no_verify: bool,

    /// Print the tool invocations without running them
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConfigFile::default(),
        };

        if let Some(views) = self.n_views {
            file.options.views_to_fuse = views;
        }
        if self.refine_mesh {
            file.options.refine_mesh = true;
        }
        if self.no_verify {
            file.options.verify_artifacts = false;
        }
        if let Some(sensor_db) = self.sensor_db {
            file.tools.sensor_db = sensor_db;
        }
        if let Some(dir) = self.openmvg_dir {
            file.tools.openmvg_dir = Some(dir);
        }
        if let Some(dir) = self.openmvs_dir {
            file.tools.openmvs_dir = Some(dir);
        }

        Ok(PipelineConfig::new(self.dir, self.out_dir).with_file(file))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let dry_run = args.dry_run;
    let pipeline = Pipeline::new(args.into_config()?);

    if dry_run {
        let (_, reference, stages) = pipeline.plan().await?;
        info!("Focal length {} px from {}", reference.focal(), reference.path.display());
        for invocation in stages {
            println!("{}", invocation.command_line());
        }
        return Ok(());
    }

    let mut stream = pipeline.launch();
    while let Some(message) = stream.next().await {
        match message.context("Pipeline failed")? {
            PipelineMessage::Output { line, .. } => match line.stream {
                OutputStream::Stdout => println!("{}", line.text),
                OutputStream::Stderr => eprintln!("{}", line.text),
            },
            PipelineMessage::CleanedUp { moved } => {
                info!("Moved {} by-product files into the mvs folder", moved.len());
            }
            PipelineMessage::Finished { elapsed } => {
                info!("Successfully completed SfM pipeline in {:.1} seconds", elapsed.as_secs_f64());
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fuse_all_views() {
        let args = Args::parse_from(["sfm-cmd", "-d", "photos", "-o", "out"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.input_dir, PathBuf::from("photos"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.options.views_to_fuse, 0);
        assert!(config.options.verify_artifacts);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "sfm-cmd",
            "--dir",
            "photos",
            "--out-dir",
            "out",
            "-n",
            "5",
            "--refine-mesh",
            "--no-verify",
            "--openmvs-dir",
            "/opt/openMVS/bin",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.options.views_to_fuse, 5);
        assert!(config.options.refine_mesh);
        assert!(!config.options.verify_artifacts);
        assert_eq!(config.tools.openmvs("TextureMesh"), PathBuf::from("/opt/openMVS/bin/TextureMesh"));
    }
}
