use std::path::PathBuf;
use std::time::Duration;
use crate::executor::OutputLine;
use crate::focal::{FocalEstimate, ReferenceImage};
use crate::stage::Stage;
use crate::workspace::WorkspaceLayout;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    /// Output folders exist.
    WorkspaceReady(WorkspaceLayout),
    FocalEstimated {
        reference: ReferenceImage,
        focal: FocalEstimate,
    },
    StageStarted {
        stage: Stage,
        /// Zero based position in the plan.
        index: usize,
        total: usize,
        command: String,
    },
    /// A line printed by the running tool.
    Output {
        stage: Stage,
        line: OutputLine,
    },
    StageFinished {
        stage: Stage,
        elapsed: Duration,
    },
    /// By-products were moved into the mvs folder.
    CleanedUp {
        moved: Vec<PathBuf>,
    },
    Finished {
        elapsed: Duration,
    },
}
