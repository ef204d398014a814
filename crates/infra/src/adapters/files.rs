//! Local file storage for entity attachments.
//!
//! Files live under `{root}/{kind}/{id}/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dealflow_core::FileStore;
use dealflow_domain::{DealflowError, EntityRef, Result};
use tokio::fs;
use tracing::debug;

/// [`FileStore`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Store files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding files owned by `owner`.
    pub fn directory_for(&self, owner: EntityRef) -> PathBuf {
        self.root.join(owner.kind().as_str()).join(owner.id().to_string())
    }
}

async fn count_files(dir: &Path) -> Result<u64> {
    let mut pending = vec![dir.to_path_buf()];
    let mut files = 0_u64;
    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            if entry.file_type().await.map_err(io_error)?.is_dir() {
                pending.push(entry.path());
            } else {
                files += 1;
            }
        }
    }
    Ok(files)
}

fn io_error(err: std::io::Error) -> DealflowError {
    DealflowError::DependencyUnavailable(format!("file storage: {err}"))
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn delete_all(&self, owner: EntityRef) -> Result<u64> {
        let dir = self.directory_for(owner);
        let removed = match count_files(&dir).await {
            Ok(count) => count,
            Err(_) if !fs::try_exists(&dir).await.unwrap_or(false) => return Ok(0),
            Err(err) => return Err(err),
        };
        if let Err(err) = fs::remove_dir_all(&dir).await {
            if err.kind() == ErrorKind::NotFound {
                return Ok(0);
            }
            return Err(io_error(err));
        }
        debug!(owner = %owner, removed, "owner files removed");
        Ok(removed)
    }
}
