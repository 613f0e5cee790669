use std::sync::Arc;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::executor::{Executor, SystemExecutor};
use crate::focal::ReferenceImage;
use crate::stage::StageInvocation;
use crate::workspace::WorkspaceLayout;

pub use crate::cleanup::{cleanup, BYPRODUCT_EXTENSIONS};
pub use crate::config::{ConfigFile, StageOptions, ToolConfig};
pub use crate::error::PipelineError;
pub use crate::executor::{ExitOutcome, OutputLine, OutputStream, ProcessEvent, ProcessStream};
pub use crate::focal::{estimate_focal, FocalEstimate, IMAGE_EXTENSIONS};
pub use crate::message::PipelineMessage;
pub use crate::pipeline_stream::PipelineStream;
pub use crate::stage::{plan, Stage};

pub mod config;
pub mod executor;
pub mod focal;
pub mod stage;
pub mod workspace;
mod cleanup;
mod error;
mod filesystem;
mod message;
mod pipeline_stream;

/// Turns a folder of photos into a textured mesh by running the openMVG and
/// openMVS tools one after another.
pub struct Pipeline {
    config: PipelineConfig,
    executor: Arc<dyn Executor>,
}

impl Pipeline {
    /// A pipeline that runs the real tools.
    pub fn new(config: PipelineConfig) -> Self {
        let executor = SystemExecutor::new(config.working_dir.clone());
        Self::with_executor(config, Arc::new(executor))
    }

    pub fn with_executor(config: PipelineConfig, executor: Arc<dyn Executor>) -> Self {
        Self { config, executor }
    }

    /// Prepares the workspace and estimates the focal length, then returns the
    /// tool calls a run would make without making them.
    ///
    /// Every path in the returned plan is absolute, so it means the same thing
    /// from the tools' working directory as from here.
    pub async fn plan(&self) -> Result<(WorkspaceLayout, ReferenceImage, Vec<StageInvocation>)> {
        let config = self.config.resolved()?;
        let layout = WorkspaceLayout::init(&config.output_dir).await?;
        let input_dir = config.input_dir.clone();
        let reference = tokio::task::spawn_blocking(move || estimate_focal(&input_dir)).await??;
        let stages = plan(&config, &layout, reference.focal());
        Ok((layout, reference, stages))
    }
}
