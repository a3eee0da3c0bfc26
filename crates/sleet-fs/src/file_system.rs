use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    backend::StorageBackend,
    error::{FsError, FsResult},
    file::SleetFile,
    lock::LeaseLock,
    retry::RetryPolicy,
};

pub const DEFAULT_COMMIT_CONCURRENCY: usize = 4;

/// Cached view of a feed shared by every service of a command.
///
/// Handles are unique per path, so services that touch the same file see each other's
/// uncommitted changes.
#[derive(Debug)]
pub struct SleetFileSystem {
    backend: Arc<dyn StorageBackend>,
    base_uri: Url,
    cache_root: PathBuf,
    retry: RetryPolicy,
    commit_concurrency: usize,
    token: CancellationToken,
    files: Mutex<HashMap<String, Arc<SleetFile>>>,
}

/// Normalizes a feed path: forward slashes, no leading slash, lower case.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches('/')
        .to_lowercase()
}

impl SleetFileSystem {
    /// Creates a file system caching under a fresh directory below `cache_root`.
    pub fn new(backend: Arc<dyn StorageBackend>, base_uri: Url, cache_root: PathBuf) -> Self {
        let session = cache_root.join(format!("session-{}", Uuid::new_v4().simple()));
        Self {
            backend,
            base_uri,
            cache_root: session,
            retry: RetryPolicy::default(),
            commit_concurrency: DEFAULT_COMMIT_CONCURRENCY,
            token: CancellationToken::new(),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_commit_concurrency(mut self, concurrency: usize) -> Self {
        self.commit_concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Absolute URI of a feed path, always below the base URI.
    ///
    /// Each path segment is appended and percent-encoded, so no segment can change the
    /// scheme or host.
    pub fn get_uri(&self, path: &str) -> Url {
        let path = normalize_path(path);
        let mut uri = self.base_uri.clone();
        match uri.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().extend(path.split('/'));
            }
            Err(()) => warn!("Base URI {} cannot hold the path {path}", self.base_uri),
        }
        uri
    }

    /// Feed path of a URI below the base URI.
    pub fn get_path(&self, uri: &Url) -> Option<String> {
        uri.as_str()
            .strip_prefix(self.base_uri.as_str())
            .map(|rest| rest.split('#').next().unwrap_or_default().to_string())
    }

    pub fn get(&self, path: &str) -> Arc<SleetFile> {
        let path = normalize_path(path);
        let mut files = self
            .files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        files
            .entry(path.clone())
            .or_insert_with(|| {
                let cache_path = path
                    .split('/')
                    .fold(self.cache_root.clone(), |acc, segment| acc.join(segment));
                Arc::new(SleetFile::new(
                    path.clone(),
                    self.get_uri(&path),
                    cache_path,
                    self.backend.clone(),
                    self.retry,
                    self.token.clone(),
                ))
            })
            .clone()
    }

    pub fn get_by_uri(&self, uri: &Url) -> Option<Arc<SleetFile>> {
        self.get_path(uri).map(|path| self.get(&path))
    }

    fn handles(&self) -> Vec<Arc<SleetFile>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.handles().iter().any(|file| file.has_changes())
    }

    /// Pushes every dirty file with bounded concurrency.
    ///
    /// Returns whether anything was pushed.
    pub async fn commit(&self) -> FsResult<bool> {
        let mut dirty: Vec<Arc<SleetFile>> = self
            .handles()
            .into_iter()
            .filter(|file| file.has_changes())
            .collect();
        if dirty.is_empty() {
            debug!("nothing to commit");
            return Ok(false);
        }
        dirty.sort_by(|a, b| a.path().cmp(b.path()));

        info!("Committing {} files to {}", dirty.len(), self.backend.describe());

        let pushed: Vec<bool> = stream::iter(dirty.into_iter().map(|file| {
            let token = self.token.clone();
            async move {
                if token.is_cancelled() {
                    return Err(FsError::Cancelled);
                }
                file.push().await
            }
        }))
        .buffer_unordered(self.commit_concurrency)
        .try_collect()
        .await?;

        Ok(pushed.into_iter().any(|sent| sent))
    }

    /// Every file currently in the feed, excluding the lock.
    pub async fn list_files(&self) -> FsResult<Vec<String>> {
        let backend = &self.backend;
        self.retry.run("list feed files", || backend.list()).await
    }

    pub async fn validate(&self) -> FsResult<bool> {
        let backend = &self.backend;
        self.retry.run("validate feed", || backend.validate()).await
    }

    /// Deletes every feed file except the lock. Returns whether anything was removed.
    pub async fn destroy(&self) -> FsResult<bool> {
        let paths = self.list_files().await?;
        for path in &paths {
            self.get(path).delete().await?;
        }
        let removed = self.commit().await?;
        self.reset();
        Ok(removed)
    }

    /// Drops every cached handle so the next access refetches.
    pub fn reset(&self) {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn create_lock(&self) -> LeaseLock {
        LeaseLock::new(self.backend.lock_backend())
    }
}

impl Drop for SleetFileSystem {
    fn drop(&mut self) {
        if self.cache_root.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.cache_root) {
                warn!(
                    "Failed to remove cache directory {}: {err}",
                    self.cache_root.display()
                );
            }
        }
    }
}
