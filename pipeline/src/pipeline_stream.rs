use std::path::PathBuf;
use std::pin::Pin;
use std::time::Instant;
use async_fn_stream::{try_fn_stream, TryStreamEmitter};
use futures::{Stream, StreamExt};
use tracing::{info, warn};
use crate::cleanup::cleanup;
use crate::error::{PipelineError, Result};
use crate::executor::ProcessEvent;
use crate::message::PipelineMessage;
use crate::stage::{Stage, StageInvocation};
use crate::Pipeline;

pub type PipelineStream = Pin<Box<dyn Stream<Item = Result<PipelineMessage>> + Send>>;

impl Pipeline {
    /// Starts a run. The stream ends after cleanup, or with the first error;
    /// no stage runs after a failed one.
    pub fn launch(self) -> PipelineStream {
        Box::pin(try_fn_stream(|emitter| async move { self.run(emitter).await }))
    }

    async fn run(self, emitter: TryStreamEmitter<PipelineMessage, PipelineError>) -> Result<()> {
        let start = Instant::now();
        let verify = self.config.options.verify_artifacts;

        let (layout, reference, stages) = self.plan().await?;
        emitter.emit(PipelineMessage::WorkspaceReady(layout.clone())).await;
        info!("Estimated focal length {} px from {}", reference.focal(), reference.path.display());
        let focal = reference.focal();
        emitter.emit(PipelineMessage::FocalEstimated { reference, focal }).await;

        let total = stages.len();
        for (index, invocation) in stages.iter().enumerate() {
            let stage = invocation.stage;
            if verify {
                check_artifacts(stage, &invocation.requires).await?;
            }

            let command = invocation.command_line();
            info!("[{}/{}] Running {}: {}", index + 1, total, stage, command);
            emitter
                .emit(PipelineMessage::StageStarted { stage, index, total, command })
                .await;

            let stage_start = Instant::now();
            self.execute(invocation, &emitter).await?;

            if verify {
                check_artifacts(stage, &invocation.produces).await?;
            }
            let elapsed = stage_start.elapsed();
            info!("Finished {} in {:.1}s", stage, elapsed.as_secs_f64());
            emitter.emit(PipelineMessage::StageFinished { stage, elapsed }).await;
        }
        info!("Completed all stages in {:.1}s", start.elapsed().as_secs_f64());

        let working_dir = self.config.working_dir()?;
        info!("Cleaning up {}", working_dir.display());
        let moved = cleanup(&working_dir, &layout.mvs).await?;
        emitter.emit(PipelineMessage::CleanedUp { moved }).await;

        emitter
            .emit(PipelineMessage::Finished { elapsed: start.elapsed() })
            .await;
        Ok(())
    }

    async fn execute(
        &self,
        invocation: &StageInvocation,
        emitter: &TryStreamEmitter<PipelineMessage, PipelineError>,
    ) -> Result<()> {
        let stage = invocation.stage;
        let mut events = self.executor.execute(invocation);
        let mut outcome = None;
        while let Some(event) = events.next().await {
            match event? {
                ProcessEvent::Line(line) => emitter.emit(PipelineMessage::Output { stage, line }).await,
                ProcessEvent::Exited(exit) => outcome = Some(exit),
            }
        }

        match outcome {
            Some(outcome) if outcome.success() => Ok(()),
            Some(outcome) => {
                warn!("{} {}", stage, outcome);
                Err(PipelineError::StageFailed { stage, outcome })
            }
            None => Err(PipelineError::NoExitStatus(stage)),
        }
    }
}

async fn check_artifacts(stage: Stage, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if !tokio::fs::try_exists(path).await? {
            return Err(PipelineError::MissingArtifact {
                stage,
                path: path.clone(),
            });
        }
    }
    Ok(())
}
