//! Cross-process file locking for per-template record files.
//!
//! The in-process writer lock serializes mutations inside one engine
//! instance. This lock additionally keeps two processes sharing a data
//! directory from interleaving writes to the same template. The lock is
//! released when the [`StoreLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock on one template directory.
pub struct StoreLock {
    _file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquire the exclusive lock for `template_dir`, creating the directory
    /// and its `.lock` file when missing.
    ///
    /// Blocking file locking runs on the blocking thread pool so the tokio
    /// runtime is never stalled. The call waits until any other holder
    /// releases the lock; callers bound it with a timeout.
    ///
    /// # Errors
    ///
    /// Fails when the directory or lock file cannot be created, or the file
    /// system does not support locking.
    pub async fn acquire(template_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(template_dir).await.with_context(|| {
            format!("Failed to create template directory {}", template_dir.display())
        })?;

        let lock_path = template_dir.join(".lock");
        let lock_path_clone = lock_path.clone();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive().with_context(|| {
                format!("Failed to acquire lock: {}", lock_path_clone.display())
            })?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self._file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
