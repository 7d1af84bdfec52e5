//! Per-job scratch directory.
//!
//! Every intermediate artifact of a composition run lives under one
//! `WorkDir`, which is removed when the value is dropped or closed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Scoped scratch directory for one composition run.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
    counter: AtomicUsize,
}

impl WorkDir {
    /// Create a fresh directory for `job_id` under `root`.
    pub fn create(root: impl AsRef<Path>, job_id: &str) -> MediaResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", sanitize(job_id)))
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created work dir");

        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    /// Root of the scratch area.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a named file inside the scratch area.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A fresh, never-before-returned file path like `prefix-0003.ext`.
    pub fn unique_path(&self, prefix: &str, ext: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.path_for(&format!("{}-{:04}.{}", prefix, n, ext))
    }

    /// Create (if needed) and return a subdirectory.
    pub fn subdir(&self, name: &str) -> MediaResult<PathBuf> {
        let path = self.path_for(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Delete the directory now, reporting failures.
    pub fn close(self) -> MediaResult<()> {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove work dir");
            return Err(e.into());
        }
        debug!(path = %path.display(), "Removed work dir");
        Ok(())
    }
}

/// Keep job ids safe for use in a directory name.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::create(root.path(), "job-1").unwrap();
            std::fs::write(work.path_for("a.txt"), b"x").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(root.path(), "job/../evil").unwrap();
        let path = work.path().to_path_buf();

        assert!(path.starts_with(root.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("job-job____evil-"));

        work.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unique_paths_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(root.path(), "j").unwrap();
        let a = work.unique_path("norm", "mp4");
        let b = work.unique_path("norm", "mp4");
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "mp4");
    }

    #[test]
    fn test_jobs_get_disjoint_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create(root.path(), "same").unwrap();
        let b = WorkDir::create(root.path(), "same").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
