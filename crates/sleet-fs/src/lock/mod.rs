//! Exclusive feed lock built on renewable leases.

pub mod file;
pub mod memory;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{FsError, FsResult};

/// Who holds the lock and why, shown to clients waiting on it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockMessage {
    pub date: DateTime<Utc>,
    pub message: String,
}

impl LockMessage {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            date: Utc::now(),
            message: message.into(),
        }
    }
}

/// Storage primitive for a single renewable lease.
#[async_trait]
pub trait LeaseBackend: Send + Sync {
    /// Prepares the lock location, without taking the lease.
    async fn ensure_exists(&self) -> FsResult<()>;

    /// Returns the new lease id, or `None` when another client holds an unexpired lease.
    async fn try_acquire(&self, duration: Duration) -> FsResult<Option<String>>;

    async fn renew(&self, lease_id: &str, duration: Duration) -> FsResult<()>;

    async fn release(&self, lease_id: &str) -> FsResult<()>;

    async fn read_message(&self) -> FsResult<Option<LockMessage>>;

    async fn write_message(&self, lease_id: &str, message: &LockMessage) -> FsResult<()>;

    async fn clear_message(&self, lease_id: &str) -> FsResult<()>;
}

/// Exclusive writer lock for a feed.
#[async_trait]
pub trait FeedLock: Send {
    /// Waits up to `timeout` for the lock. Returns `false` when it could not be obtained.
    async fn get_lock(
        &mut self,
        timeout: Duration,
        message: &str,
        token: &CancellationToken,
    ) -> FsResult<bool>;

    fn is_locked(&self) -> bool;

    /// Releases the lock. Failures are logged and never returned.
    async fn release(&mut self);
}

struct HeldLease {
    lease_id: String,
    stop_renewal: CancellationToken,
    /// Cancelled by the renewal task once another client owns the lease.
    lost: CancellationToken,
    renewal: JoinHandle<()>,
}

/// [`FeedLock`] over a [`LeaseBackend`], renewed in the background while held.
pub struct LeaseLock {
    backend: Arc<dyn LeaseBackend>,
    lease_duration: Duration,
    initial_delay: Duration,
    max_delay: Duration,
    held: Option<HeldLease>,
}

impl fmt::Debug for LeaseLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseLock")
            .field("lease_id", &self.lease_id())
            .field("lease_duration", &self.lease_duration)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl LeaseLock {
    pub fn new(backend: Arc<dyn LeaseBackend>) -> Self {
        Self {
            backend,
            lease_duration: Duration::from_secs(60),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            held: None,
        }
    }

    pub fn with_lease_duration(mut self, duration: Duration) -> Self {
        self.lease_duration = duration;
        self
    }

    pub fn with_poll_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max.max(initial);
        self
    }

    pub fn lease_id(&self) -> Option<&str> {
        self.held.as_ref().map(|held| held.lease_id.as_str())
    }

    fn start_renewal(&self, lease_id: String) -> HeldLease {
        let stop_renewal = CancellationToken::new();
        let backend = self.backend.clone();
        let duration = self.lease_duration;
        let interval = (duration / 3).max(Duration::from_millis(10));
        let stop = stop_renewal.clone();
        let lost = CancellationToken::new();
        let on_lost = lost.clone();
        let id = lease_id.clone();

        let renewal = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        match backend.renew(&id, duration).await {
                            Ok(()) => debug!("renewed feed lease {id}"),
                            Err(FsError::LeaseLost(_)) => {
                                error!("The feed lock was taken by another client");
                                on_lost.cancel();
                                break;
                            }
                            Err(err) => warn!("Failed to renew feed lease: {err}"),
                        }
                    }
                }
            }
        });

        HeldLease {
            lease_id,
            stop_renewal,
            lost,
            renewal,
        }
    }
}

#[async_trait]
impl FeedLock for LeaseLock {
    async fn get_lock(
        &mut self,
        timeout: Duration,
        message: &str,
        token: &CancellationToken,
    ) -> FsResult<bool> {
        if self.held.is_some() {
            return Ok(true);
        }

        self.backend.ensure_exists().await?;

        let started = tokio::time::Instant::now();
        let mut delay = self.initial_delay;
        let mut reported = false;

        loop {
            if token.is_cancelled() {
                return Err(FsError::Cancelled);
            }

            if let Some(lease_id) = self.backend.try_acquire(self.lease_duration).await? {
                debug!("acquired feed lease {lease_id}");
                if let Err(err) = self
                    .backend
                    .write_message(&lease_id, &LockMessage::now(message))
                    .await
                {
                    warn!("Failed to write lock message: {err}");
                }
                self.held = Some(self.start_renewal(lease_id));
                return Ok(true);
            }

            if !reported {
                reported = true;
                match self.backend.read_message().await {
                    Ok(Some(holder)) if !holder.message.is_empty() => {
                        info!(
                            "Waiting to obtain an exclusive lock on the feed. Locked since {}: {}",
                            holder.date.to_rfc3339(),
                            holder.message
                        );
                    }
                    _ => info!("Waiting to obtain an exclusive lock on the feed."),
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }

            let wait = delay.min(timeout - elapsed);
            tokio::select! {
                _ = token.cancelled() => return Err(FsError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
            delay = (delay * 2).min(self.max_delay);
        }
    }

    fn is_locked(&self) -> bool {
        self.held
            .as_ref()
            .is_some_and(|held| !held.lost.is_cancelled())
    }

    async fn release(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };

        held.stop_renewal.cancel();
        if let Err(err) = held.renewal.await {
            debug!("lease renewal task ended abnormally: {err}");
        }

        if let Err(err) = self.backend.clear_message(&held.lease_id).await {
            debug!("failed to clear lock message: {err}");
        }

        match self.backend.release(&held.lease_id).await {
            Ok(()) => debug!("released feed lease {}", held.lease_id),
            Err(err) => warn!("Failed to release feed lock: {err}"),
        }
    }
}

impl Drop for LeaseLock {
    fn drop(&mut self) {
        // The lease expires on its own once renewal stops.
        if let Some(held) = self.held.take() {
            held.stop_renewal.cancel();
        }
    }
}
