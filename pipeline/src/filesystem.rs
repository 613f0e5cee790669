use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A directory tree searched for files by extension.
#[derive(Clone)]
pub struct Filesystem {
    root: PathBuf,
    max_depth: usize,
}

impl Filesystem {
    /// Searches the whole tree below `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root, max_depth: usize::MAX }
    }

    /// Searches only the direct children of `root`.
    pub fn shallow(root: PathBuf) -> Self {
        Self { root, max_depth: 1 }
    }

    /// Regular files whose extension is one of `extensions`, in walk order.
    /// Comparison ignores case; `extensions` are given without the dot.
    /// Symlinks are followed and yielded under their link path. Dangling
    /// links are skipped.
    pub fn files_with_extension<'a>(
        &'a self,
        extensions: &'a [&'a str],
    ) -> impl Iterator<Item = PathBuf> + 'a {
        WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                has_extension(entry.path(), extensions).then(|| entry.into_path())
            })
    }

    pub fn first_with_extension(&self, extensions: &[&str]) -> Option<PathBuf> {
        self.files_with_extension(extensions).next()
    }
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use super::*;

    #[test]
    fn matches_extension_ignoring_case() {
        assert!(has_extension(Path::new("a/IMG_0001.JPG"), &["jpg"]));
        assert!(has_extension(Path::new("scene.dmap"), &["log", "dmap"]));
        assert!(!has_extension(Path::new("notes.txt"), &["jpg"]));
        assert!(!has_extension(Path::new("jpg"), &["jpg"]));
    }

    #[test]
    fn shallow_skips_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("top.log"), b"").unwrap();
        fs::write(dir.path().join("nested/deep.log"), b"").unwrap();

        let shallow: Vec<_> = Filesystem::shallow(dir.path().to_path_buf())
            .files_with_extension(&["log"])
            .collect();
        assert_eq!(shallow, vec![dir.path().join("top.log")]);

        let mut deep: Vec<_> = Filesystem::new(dir.path().to_path_buf())
            .files_with_extension(&["log"])
            .collect();
        deep.sort();
        assert_eq!(deep, vec![dir.path().join("nested/deep.log"), dir.path().join("top.log")]);
    }

    #[cfg(unix)]
    #[test]
    fn follows_file_links_and_skips_dangling_ones() {
        let dir = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        fs::write(store.path().join("run.log"), b"log").unwrap();
        std::os::unix::fs::symlink(store.path().join("run.log"), dir.path().join("linked.log")).unwrap();
        std::os::unix::fs::symlink(store.path().join("gone.log"), dir.path().join("dangling.log")).unwrap();

        let found: Vec<_> = Filesystem::shallow(dir.path().to_path_buf())
            .files_with_extension(&["log"])
            .collect();
        assert_eq!(found, vec![dir.path().join("linked.log")]);
    }

    #[test]
    fn directories_never_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("photos.jpg")).unwrap();

        let fs = Filesystem::new(dir.path().to_path_buf());
        assert_eq!(fs.first_with_extension(&["jpg"]), None);
    }
}
