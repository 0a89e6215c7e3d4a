//! Per-run scratch space.
//!
//! Layout:
//!
//! ```text
//! apkjoin-XXXXXX/
//! ├── container/     # extracted input container
//! ├── members/       # one extracted tree per package member
//! ├── merged/        # merge destination
//! └── unsigned.apk   # repackaged archive before signing
//! ```
//!
//! The directory is removed when the [`WorkArea`] is dropped, whether the run
//! succeeded or not. Read-only permission bits are cleared first so nothing
//! extracted from an archive can block the removal.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Exclusive scratch directory for one merge invocation.
#[derive(Debug)]
pub struct WorkArea {
    temp_dir: Option<TempDir>,
}

impl WorkArea {
    /// Create a fresh, uniquely named work area under `parent` (or the system temp dir).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("apkjoin-");
        let temp_dir = match parent {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!("Work area: {}", temp_dir.path().display());
        Ok(Self {
            temp_dir: Some(temp_dir),
        })
    }

    /// Root of the work area.
    pub fn path(&self) -> &Path {
        self.temp_dir
            .as_ref()
            .map_or_else(|| Path::new(""), TempDir::path)
    }

    /// Where the input container is extracted.
    pub fn container_dir(&self) -> PathBuf {
        self.path().join("container")
    }

    /// Extraction root for the member at `index`.
    pub fn member_dir(&self, index: usize, stem: &str) -> PathBuf {
        self.path().join("members").join(format!("{index:02}-{stem}"))
    }

    /// Merge destination.
    pub fn merged_dir(&self) -> PathBuf {
        self.path().join("merged")
    }

    /// Repackaged, not yet signed archive.
    pub fn unsigned_path(&self) -> PathBuf {
        self.path().join("unsigned.apk")
    }

    /// Remove the work area now, reporting failures instead of ignoring them.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory could not be removed.
    pub fn close(mut self) -> io::Result<()> {
        match self.temp_dir.take() {
            Some(dir) => {
                make_writable(dir.path());
                dir.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if let Some(dir) = self.temp_dir.take() {
            make_writable(dir.path());
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove work area {}: {e}", path.display());
            }
        }
    }
}

fn make_writable(root: &Path) {
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        if !permissions.readonly() {
            continue;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            permissions.set_mode(permissions.mode() | 0o700);
        }
        #[cfg(not(unix))]
        permissions.set_readonly(false);
        let _ = std::fs::set_permissions(entry.path(), permissions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_layout_is_inside_root() {
        let parent = tempdir().unwrap();
        let work = WorkArea::new(Some(parent.path())).unwrap();
        assert!(work.path().starts_with(parent.path()));
        assert!(
            work.path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("apkjoin-")
        );
        assert!(work.member_dir(1, "base").ends_with("members/01-base"));
        assert!(work.unsigned_path().starts_with(work.path()));
    }

    #[test]
    fn test_drop_removes_read_only_tree() {
        let parent = tempdir().unwrap();
        let work = WorkArea::new(Some(parent.path())).unwrap();
        let root = work.path().to_path_buf();

        let nested = work.merged_dir().join("res").join("raw");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("locked.bin");
        fs::write(&file, b"data").unwrap();

        for path in [&file, &nested] {
            let mut perms = fs::metadata(path).unwrap().permissions();
            perms.set_readonly(true);
            fs::set_permissions(path, perms).unwrap();
        }

        drop(work);
        assert!(!root.exists());
    }

    #[test]
    fn test_close_reports_success() {
        let work = WorkArea::new(None).unwrap();
        let root = work.path().to_path_buf();
        fs::create_dir_all(work.container_dir()).unwrap();
        work.close().unwrap();
        assert!(!root.exists());
    }
}
