use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::error::{PipelineError, Result};
use crate::filesystem::Filesystem;

/// Files the openMVS tools leave in their working directory.
pub const BYPRODUCT_EXTENSIONS: &[&str] = &["dmap", "log"];

/// Moves by-product files sitting directly in `working_dir` into `dest`.
///
/// Returns the new location of every moved file. Anything without a
/// by-product extension stays where it is.
pub async fn cleanup(working_dir: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let fs = Filesystem::shallow(working_dir.to_path_buf());
    let sources = tokio::task::spawn_blocking(move || {
        fs.files_with_extension(BYPRODUCT_EXTENSIONS).collect::<Vec<_>>()
    })
    .await?;

    let mut moved = Vec::with_capacity(sources.len());
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = dest.join(name);
        match move_file(&source, &target).await {
            Ok(()) => {
                debug!("Moved {} to {}", source.display(), target.display());
                moved.push(target);
            }
            Err(err) if err.kind() == ErrorKind::NotFound && !source.exists() => {
                warn!("{} disappeared before it could be moved", source.display());
            }
            Err(err) => {
                return Err(PipelineError::Cleanup {
                    from: source,
                    to: target,
                    source: err,
                });
            }
        }
    }
    Ok(moved)
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use super::*;

    #[tokio::test]
    async fn moves_only_byproducts() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(work.path().join("depth0001.dmap"), b"depth").unwrap();
        fs::write(work.path().join("DensifyPointCloud-2401.LOG"), b"log").unwrap();
        fs::write(work.path().join("scene.mvs"), b"scene").unwrap();
        fs::write(work.path().join("notes.txt"), b"keep").unwrap();
        fs::create_dir(work.path().join("nested")).unwrap();
        fs::write(work.path().join("nested/inner.log"), b"nested").unwrap();

        let mut moved = cleanup(work.path(), dest.path()).await.unwrap();
        moved.sort();

        assert_eq!(
            moved,
            vec![
                dest.path().join("DensifyPointCloud-2401.LOG"),
                dest.path().join("depth0001.dmap"),
            ]
        );
        assert_eq!(fs::read(dest.path().join("depth0001.dmap")).unwrap(), b"depth");
        assert!(!work.path().join("depth0001.dmap").exists());
        assert!(work.path().join("scene.mvs").is_file());
        assert!(work.path().join("notes.txt").is_file());
        assert!(work.path().join("nested/inner.log").is_file());
    }

    #[tokio::test]
    async fn nothing_to_move_is_fine() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let moved = cleanup(work.path(), dest.path()).await.unwrap();
        assert!(moved.is_empty());
    }

    #[tokio::test]
    async fn missing_destination_is_an_error() {
        let work = tempfile::tempdir().unwrap();
        fs::write(work.path().join("TextureMesh.log"), b"log").unwrap();
        let dest = work.path().join("does/not/exist");

        match cleanup(work.path(), &dest).await {
            Err(PipelineError::Cleanup { from, .. }) => {
                assert_eq!(from, work.path().join("TextureMesh.log"));
                assert!(from.is_file());
            }
            other => panic!("expected cleanup error, got {other:?}"),
        }
    }
}
