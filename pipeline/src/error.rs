use std::io;
use std::path::PathBuf;
use thiserror::Error;
use crate::executor::ExitOutcome;
use crate::stage::Stage;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No image with a recognized extension found under {0}")]
    NoImageFound(PathBuf),

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to create workspace directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {from} into {to}: {source}")]
    Cleanup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Stage {stage} failed: {outcome}")]
    StageFailed { stage: Stage, outcome: ExitOutcome },

    #[error("Stage {0} ended without reporting an exit status")]
    NoExitStatus(Stage),

    #[error("Stage {stage} is missing artifact {path}")]
    MissingArtifact { stage: Stage, path: PathBuf },

    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("File IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
