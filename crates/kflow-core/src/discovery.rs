//! Graph File Discovery
//!
//! Finds every `.ci` file under a work directory. The result is sorted so
//! that progress indices are reproducible between runs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Extension of VCG call-graph dumps produced by `gcc -fcallgraph-info`.
pub const DEFAULT_EXTENSION: &str = "ci";

/// Errors during file discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Root path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Recursive file finder for a single extension.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    extension: String,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl FileDiscovery {
    /// Create a finder for `extension` (with or without the leading dot).
    pub fn new(extension: impl AsRef<str>) -> Self {
        Self {
            extension: extension.as_ref().trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension() == Some(OsStr::new(&self.extension))
    }

    /// Return absolute paths of all matching regular files under `root`.
    ///
    /// Directory symlinks are not followed, so link cycles cannot cause an
    /// endless walk. A symlink to a regular file counts as that file.
    /// Entries that can't be read are logged and skipped.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let root = root
            .canonicalize()
            .map_err(|_| DiscoveryError::RootNotFound(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(root));
        }

        info!("Discovering .{} files under {:?}", self.extension, root);

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !Self::is_regular_file(&entry) {
                continue;
            }

            if self.matches(entry.path()) {
                debug!("Found {:?}", entry.path());
                files.push(entry.into_path());
            }
        }

        files.sort();
        info!("Discovered {} file(s)", files.len());
        Ok(files)
    }

    fn is_regular_file(entry: &DirEntry) -> bool {
        if !entry.path_is_symlink() {
            return entry.file_type().is_file();
        }
        match std::fs::metadata(entry.path()) {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                warn!("Skipping broken link {:?}: {}", entry.path(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discovers_only_matching_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a/x.ci");
        touch(temp.path(), "a/b/y.ci");
        touch(temp.path(), "c.txt");

        let files = FileDiscovery::default().discover(temp.path()).unwrap();
        let root = temp.path().canonicalize().unwrap();

        assert_eq!(files, vec![root.join("a/b/y.ci"), root.join("a/x.ci")]);
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_results_are_sorted() {
        let temp = TempDir::new().unwrap();
        for name in ["z.ci", "m/n.ci", "a.ci", "m/a.ci"] {
            touch(temp.path(), name);
        }

        let files = FileDiscovery::default().discover(temp.path()).unwrap();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_extension_must_match_exactly() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "keep.ci");
        touch(temp.path(), "skip.cij");
        touch(temp.path(), "skip.c");
        touch(temp.path(), "ci");
        fs::create_dir_all(temp.path().join("dir.ci")).unwrap();

        let files = FileDiscovery::new(".ci").discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.ci"));
    }

    #[test]
    fn test_custom_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "g.vcg");
        touch(temp.path(), "g.ci");

        let discovery = FileDiscovery::new("vcg");
        assert_eq!(discovery.extension(), "vcg");
        let files = discovery.discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("g.vcg"));
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        let files = FileDiscovery::default().discover(temp.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_missing_root() {
        let err = FileDiscovery::default()
            .discover(Path::new("/nonexistent/kflow/root"))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::RootNotFound(_)));
    }

    #[test]
    fn test_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "only.ci");
        let err = FileDiscovery::default()
            .discover(&temp.path().join("only.ci"))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a/x.ci");
        std::os::unix::fs::symlink(temp.path().join("a"), temp.path().join("a/loop")).unwrap();

        let files = FileDiscovery::default().discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_discovered() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "real/x.ci");
        fs::create_dir_all(temp.path().join("work")).unwrap();
        std::os::unix::fs::symlink("../real/x.ci", temp.path().join("work/x.ci")).unwrap();
        std::os::unix::fs::symlink("../real/gone.ci", temp.path().join("work/gone.ci")).unwrap();

        let work = temp.path().join("work");
        let files = FileDiscovery::default().discover(&work).unwrap();
        assert_eq!(files, vec![work.canonicalize().unwrap().join("x.ci")]);
    }
}
