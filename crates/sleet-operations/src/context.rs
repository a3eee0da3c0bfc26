use std::{future::Future, sync::Arc, time::Duration};

use sleet_config::config::Config;
use sleet_core::{service_index::ServiceIndex, FeedSettings, SleetContext};
use sleet_fs::{
    FeedLock, FsError, LeaseLock, PhysicalBackend, RetryPolicy, SleetFileSystem, StorageBackend,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{error::SleetError, SleetResult};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Everything a command needs to reach one feed.
pub struct FeedContext {
    name: String,
    fs: Arc<SleetFileSystem>,
    lock_timeout: Duration,
    worker_threads: usize,
}

impl FeedContext {
    pub fn new(name: impl Into<String>, fs: Arc<SleetFileSystem>) -> Self {
        Self {
            name: name.into(),
            fs,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            worker_threads: 4,
        }
    }

    /// Opens the configured source `source`, or the default one.
    pub fn from_config(
        config: &Config,
        source: Option<&str>,
        token: CancellationToken,
    ) -> SleetResult<Self> {
        let source = config.get_source(source)?;
        let backend: Arc<dyn StorageBackend> = Arc::new(PhysicalBackend::new(source.get_path()?));
        debug!(source = %source.name, backend = %backend.describe(), "opening feed");

        let fs = SleetFileSystem::new(backend, source.get_base_uri()?, source.get_cache_path()?)
            .with_retry(RetryPolicy::new(
                config.retry_attempts(),
                config.retry_delay()?,
            ))
            .with_commit_concurrency(config.commit_concurrency())
            .with_cancellation(token);

        Ok(Self {
            name: source.name.clone(),
            fs: Arc::new(fs),
            lock_timeout: config.lock_timeout()?,
            worker_threads: config.worker_threads(),
        })
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fs(&self) -> &Arc<SleetFileSystem> {
        &self.fs
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Fails early when the storage behind the feed cannot be used.
    pub(crate) async fn ensure_storage(&self) -> SleetResult<()> {
        if !self.fs.validate().await? {
            return Err(SleetError::StorageUnavailable(self.name.clone()));
        }
        Ok(())
    }

    /// Takes the feed lock, waiting up to the configured timeout.
    pub(crate) async fn lock(&self, message: &str) -> SleetResult<LeaseLock> {
        self.ensure_storage().await?;

        let mut lock = self.fs.create_lock();
        debug!(feed = %self.name, reason = message, "acquiring feed lock");
        if !lock
            .get_lock(self.lock_timeout, message, self.fs.token())
            .await?
        {
            return Err(FsError::LockTimeout {
                timeout: self.lock_timeout,
            }
            .into());
        }
        info!("Acquired feed lock");
        Ok(lock)
    }

    /// Runs `body` while holding the feed lock. The lock is released whatever the outcome.
    ///
    /// Fails when the lease was lost to another client while `body` ran.
    pub(crate) async fn locked<T, F, Fut>(&self, message: &str, body: F) -> SleetResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SleetResult<T>>,
    {
        let mut lock = self.lock(message).await?;
        let result = body().await;
        let lost = !lock.is_locked();
        lock.release().await;

        match result {
            Ok(_) if lost => Err(FsError::LeaseLost(self.name.clone()).into()),
            result => result,
        }
    }

    /// Request context with the settings stored on the feed.
    pub(crate) async fn load_context(&self) -> SleetResult<SleetContext> {
        let settings = FeedSettings::load(&self.fs).await?;
        Ok(SleetContext::new(self.fs.clone(), settings))
    }

    /// Like [`FeedContext::load_context`], failing when the feed has no service index.
    pub(crate) async fn initialized_context(&self) -> SleetResult<SleetContext> {
        let ctx = self.load_context().await?;
        if !ServiceIndex::exists(&ctx).await? {
            return Err(SleetError::FeedNotInitialized(self.name.clone()));
        }
        Ok(ctx)
    }
}
