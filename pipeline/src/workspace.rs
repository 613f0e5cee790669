use std::path::{Path, PathBuf};
use crate::error::{PipelineError, Result};

/// The three folders the stages read from and write into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub matches: PathBuf,
    pub reconstruction: PathBuf,
    pub mvs: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            matches: root.join("matches"),
            reconstruction: root.join("reconstruction"),
            mvs: root.join("mvs"),
        }
    }

    /// Computes the layout under `root` and creates any folder that is missing.
    pub async fn init(root: &Path) -> Result<Self> {
        let layout = Self::new(root);
        for dir in layout.dirs() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| PipelineError::Workspace {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        Ok(layout)
    }

    pub fn dirs(&self) -> [&Path; 3] {
        [self.matches.as_path(), self.reconstruction.as_path(), self.mvs.as_path()]
    }
}
