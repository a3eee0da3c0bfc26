use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::{
    backend::StorageBackend,
    error::{ErrorContext, FsError, FsResult},
    json::to_canonical_vec,
    retry::RetryPolicy,
};

#[derive(Debug, Default)]
struct FetchState {
    fetched: bool,
    present: bool,
}

/// Handle to a single feed file.
///
/// The remote copy is downloaded into the local cache on first access. Writes and deletes
/// only touch the cache and mark the file dirty until [`SleetFile::push`] runs.
#[derive(Debug)]
pub struct SleetFile {
    path: String,
    uri: Url,
    cache_path: PathBuf,
    backend: Arc<dyn StorageBackend>,
    retry: RetryPolicy,
    token: CancellationToken,
    state: Mutex<FetchState>,
    dirty: AtomicBool,
}

impl SleetFile {
    pub(crate) fn new(
        path: String,
        uri: Url,
        cache_path: PathBuf,
        backend: Arc<dyn StorageBackend>,
        retry: RetryPolicy,
        token: CancellationToken,
    ) -> Self {
        Self {
            path,
            uri,
            cache_path,
            backend,
            retry,
            token,
            state: Mutex::new(FetchState::default()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Feed relative path, lower-cased.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn has_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> FsResult<()> {
        if self.token.is_cancelled() {
            return Err(FsError::Cancelled);
        }
        Ok(())
    }

    async fn fetch(&self, state: &mut FetchState) -> FsResult<()> {
        if state.fetched {
            return Ok(());
        }
        self.check_cancelled()?;

        let backend = &self.backend;
        let path = self.path.as_str();
        let remote = self
            .retry
            .run(&format!("read {path}"), || backend.read(path))
            .await?;

        match remote {
            Some(bytes) => {
                trace!("fetched {} ({} bytes)", self.path, bytes.len());
                self.write_cache(&bytes).await?;
                state.present = true;
            }
            None => {
                remove_if_exists(&self.cache_path).await?;
                state.present = false;
            }
        }
        state.fetched = true;
        Ok(())
    }

    async fn write_cache(&self, bytes: &[u8]) -> FsResult<()> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }
        tokio::fs::write(&self.cache_path, bytes)
            .await
            .with_context(|| format!("writing cache file {}", self.cache_path.display()))
    }

    pub async fn exists(&self) -> FsResult<bool> {
        let mut state = self.state.lock().await;
        self.fetch(&mut state).await?;
        Ok(state.present)
    }

    pub async fn read_bytes(&self) -> FsResult<Vec<u8>> {
        let mut state = self.state.lock().await;
        self.fetch(&mut state).await?;
        if !state.present {
            return Err(FsError::NotFound(self.path.clone()));
        }
        tokio::fs::read(&self.cache_path)
            .await
            .with_context(|| format!("reading cache file {}", self.cache_path.display()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self) -> FsResult<T> {
        let bytes = self.read_bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            FsError::Json {
                path: self.path.clone(),
                source: err,
            }
        })
    }

    /// Like [`SleetFile::get_json`], but a missing file yields `None`.
    pub async fn get_json_if_exists<T: DeserializeOwned>(&self) -> FsResult<Option<T>> {
        if !self.exists().await? {
            return Ok(None);
        }
        self.get_json().await.map(Some)
    }

    pub async fn get_json_value(&self) -> FsResult<Value> {
        self.get_json().await
    }

    pub async fn write_bytes(&self, bytes: &[u8]) -> FsResult<()> {
        self.check_cancelled()?;
        let mut state = self.state.lock().await;
        self.write_cache(bytes).await?;
        state.fetched = true;
        state.present = true;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Writes `value` with properties in canonical order.
    pub async fn write_json<T: Serialize>(&self, value: &T) -> FsResult<()> {
        let json_error = |err| {
            FsError::Json {
                path: self.path.clone(),
                source: err,
            }
        };
        let value = serde_json::to_value(value).map_err(json_error)?;
        let bytes = to_canonical_vec(value).map_err(json_error)?;
        self.write_bytes(&bytes).await
    }

    /// Replaces the content with a local file.
    pub async fn copy_from(&self, source: &Path) -> FsResult<()> {
        self.check_cancelled()?;
        let mut state = self.state.lock().await;
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }
        tokio::fs::copy(source, &self.cache_path)
            .await
            .with_context(|| {
                format!(
                    "copying {} to {}",
                    source.display(),
                    self.cache_path.display()
                )
            })?;
        state.fetched = true;
        state.present = true;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn delete(&self) -> FsResult<()> {
        self.check_cancelled()?;
        let mut state = self.state.lock().await;
        remove_if_exists(&self.cache_path).await?;
        state.fetched = true;
        state.present = false;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Uploads or deletes the remote copy. Returns whether anything was sent.
    pub async fn push(&self) -> FsResult<bool> {
        let state = self.state.lock().await;
        if !self.has_changes() {
            return Ok(false);
        }
        self.check_cancelled()?;

        let backend = &self.backend;
        let path = self.path.as_str();
        if state.present {
            let bytes = tokio::fs::read(&self.cache_path)
                .await
                .with_context(|| format!("reading cache file {}", self.cache_path.display()))?;
            self.retry
                .run(&format!("write {path}"), || backend.write(path, &bytes))
                .await?;
            debug!("pushed {path}");
        } else {
            self.retry
                .run(&format!("delete {path}"), || backend.delete(path))
                .await?;
            debug!("removed {path}");
        }

        self.dirty.store(false, Ordering::SeqCst);
        Ok(true)
    }

    /// Copies the current content to a local path. Returns `false` when the file is missing.
    pub async fn download_to(&self, target: &Path) -> FsResult<bool> {
        let mut state = self.state.lock().await;
        self.fetch(&mut state).await?;
        if !state.present {
            return Ok(false);
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        tokio::fs::copy(&self.cache_path, target)
            .await
            .with_context(|| format!("copying {} to {}", self.path, target.display()))?;
        Ok(true)
    }
}

async fn remove_if_exists(path: &Path) -> FsResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
    }
}
