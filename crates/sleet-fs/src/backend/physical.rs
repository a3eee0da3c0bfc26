use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use sleet_utils::fs::collect_files;
use tracing::{debug, trace};

use super::{is_lock_path, StorageBackend, LOCK_FILE_NAME};
use crate::{
    error::{FsError, FsResult},
    lock::{file::FileLeaseBackend, LeaseBackend},
};

/// Feed stored in a local directory.
#[derive(Debug, Clone)]
pub struct PhysicalBackend {
    root: PathBuf,
}

impl PhysicalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn backend_error(action: &'static str, path: &str, source: std::io::Error) -> FsError {
        FsError::Backend {
            action,
            path: path.to_string(),
            source,
        }
    }

    /// Removes empty directories between `path` and the feed root.
    async fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // Fails when the directory still has entries.
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            trace!("removed empty directory {}", dir.display());
            current = dir.parent();
        }
    }
}

#[async_trait]
impl StorageBackend for PhysicalBackend {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn read(&self, path: &str) -> FsResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.full_path(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::backend_error("read", path, err)),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> FsResult<()> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| Self::backend_error("create directory for", path, err))?;
        }
        tokio::fs::write(&full_path, bytes)
            .await
            .map_err(|err| Self::backend_error("write", path, err))
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        let full_path = self.full_path(path);
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => {
                self.prune_empty_parents(&full_path).await;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::backend_error("delete", path, err)),
        }
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        tokio::fs::try_exists(self.full_path(path))
            .await
            .map_err(|err| Self::backend_error("check", path, err))
    }

    async fn list(&self) -> FsResult<Vec<String>> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || collect_files(&root, ""))
            .await
            .map_err(|err| Self::backend_error("list", "", std::io::Error::other(err)))??;

        let mut paths: Vec<String> = files
            .iter()
            .filter_map(|file| file.strip_prefix(&self.root).ok())
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .filter(|path| !is_lock_path(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn validate(&self) -> FsResult<bool> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("creating feed directory {}", self.root.display());
                tokio::fs::create_dir_all(&self.root)
                    .await
                    .map_err(|err| Self::backend_error("create", &self.describe(), err))?;
                Ok(true)
            }
            Err(err) => Err(Self::backend_error("inspect", &self.describe(), err)),
        }
    }

    fn lock_backend(&self) -> Arc<dyn LeaseBackend> {
        Arc::new(FileLeaseBackend::new(self.root.join(LOCK_FILE_NAME)))
    }
}
