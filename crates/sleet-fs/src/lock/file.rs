use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{LeaseBackend, LockMessage};
use crate::error::{ErrorContext, FsError, FsResult};

fn expiry(duration: Duration) -> DateTime<Utc> {
    let lease =
        chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(1));
    Utc::now() + lease
}

/// Content of the `.lock` file at the feed root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockFile {
    lease_id: String,
    expires: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(default)]
    message: String,
}

impl LockFile {
    fn holder(&self) -> Option<LockMessage> {
        self.date.map(|date| {
            LockMessage {
                date,
                message: self.message.clone(),
            }
        })
    }
}

/// What a client finds at the lock path.
#[derive(Debug)]
enum LockState {
    Missing,
    Held(LockFile),
    /// Content that does not parse, such as a file another client is still writing.
    Unreadable { modified: SystemTime },
}

impl LockState {
    /// A lock nobody renewed within its lease. Unreadable files get one lease counted from
    /// their last modification.
    fn is_abandoned(&self, duration: Duration) -> bool {
        match self {
            LockState::Missing => true,
            LockState::Held(lock) => lock.expires <= Utc::now(),
            LockState::Unreadable { modified } => modified
                .checked_add(duration)
                .is_none_or(|deadline| deadline <= SystemTime::now()),
        }
    }
}

/// Lease stored as a lock file next to the feed files.
///
/// The file is created exclusively, so only one client wins a race, and rewritten by
/// renaming a complete copy over it. A lock file is only taken over once its lease expired.
#[derive(Debug, Clone)]
pub struct FileLeaseBackend {
    path: PathBuf,
}

impl FileLeaseBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sibling of the lock file, unique to this call.
    fn scratch_path(&self, kind: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{kind}-{}", Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }

    fn encode(&self, lock: &LockFile) -> FsResult<Vec<u8>> {
        serde_json::to_vec_pretty(lock).map_err(|err| {
            FsError::Json {
                path: self.path.display().to_string(),
                source: err,
            }
        })
    }

    async fn read_state(path: &Path) -> FsResult<LockState> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LockState::Missing),
            Err(err) => {
                return Err(err).with_context(|| format!("reading lock file {}", path.display()))
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(lock) => Ok(LockState::Held(lock)),
            Err(err) => {
                debug!("unreadable lock file {}: {err}", path.display());
                match tokio::fs::metadata(path).await {
                    Ok(meta) => {
                        Ok(LockState::Unreadable {
                            modified: meta.modified().unwrap_or_else(|_| SystemTime::now()),
                        })
                    }
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(LockState::Missing),
                    Err(err) => {
                        Err(err).with_context(|| format!("reading lock file {}", path.display()))
                    }
                }
            }
        }
    }

    async fn read_lock(&self) -> FsResult<Option<LockFile>> {
        match Self::read_state(&self.path).await? {
            LockState::Held(lock) => Ok(Some(lock)),
            _ => Ok(None),
        }
    }

    /// Replaces the lock file in one step, readers see the old or the new content.
    async fn write_lock(&self, lock: &LockFile) -> FsResult<()> {
        let bytes = self.encode(lock)?;
        let scratch = self.scratch_path("tmp");

        tokio::fs::write(&scratch, bytes)
            .await
            .with_context(|| format!("writing lock file {}", scratch.display()))?;
        if let Err(err) = tokio::fs::rename(&scratch, &self.path).await {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(err).with_context(|| format!("replacing lock file {}", self.path.display()));
        }
        Ok(())
    }

    async fn owned_lock(&self, lease_id: &str) -> FsResult<LockFile> {
        match self.read_lock().await? {
            Some(lock) if lock.lease_id == lease_id => Ok(lock),
            _ => Err(FsError::LeaseLost(lease_id.to_string())),
        }
    }

    async fn create_exclusive(&self, lock: &LockFile) -> FsResult<bool> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;

        let mut file = match file {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("creating lock file {}", self.path.display()))
            }
        };

        let bytes = self.encode(lock)?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("writing lock file {}", self.path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("writing lock file {}", self.path.display()))?;
        Ok(true)
    }

    /// Moves an abandoned lock file out of the way.
    ///
    /// The file is renamed first and checked again, so a lock another client created in the
    /// meantime is put back instead of deleted. Returns whether the lock path is free.
    async fn take_over(&self, duration: Duration) -> FsResult<bool> {
        let stale = self.scratch_path("stale");
        match tokio::fs::rename(&self.path, &stale).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("moving lock file {}", self.path.display()))
            }
        }

        let abandoned = Self::read_state(&stale).await?.is_abandoned(duration);
        if !abandoned {
            debug!("lock file {} was renewed, restoring it", self.path.display());
            match tokio::fs::hard_link(&stale, &self.path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("restoring lock file {}", self.path.display()))
                }
            }
        } else {
            warn!("Removing abandoned feed lock {}", self.path.display());
        }

        match tokio::fs::remove_file(&stale).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("removing lock file {}", stale.display()))
            }
        }
        Ok(abandoned)
    }
}

#[async_trait]
impl LeaseBackend for FileLeaseBackend {
    async fn ensure_exists(&self) -> FsResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        Ok(())
    }

    async fn try_acquire(&self, duration: Duration) -> FsResult<Option<String>> {
        let lease = LockFile {
            lease_id: Uuid::new_v4().to_string(),
            expires: expiry(duration),
            date: None,
            message: String::new(),
        };

        if self.create_exclusive(&lease).await? {
            return Ok(Some(lease.lease_id));
        }

        let state = Self::read_state(&self.path).await?;
        if !state.is_abandoned(duration) {
            return Ok(None);
        }
        if !matches!(state, LockState::Missing) && !self.take_over(duration).await? {
            return Ok(None);
        }

        if self.create_exclusive(&lease).await? {
            Ok(Some(lease.lease_id))
        } else {
            Ok(None)
        }
    }

    async fn renew(&self, lease_id: &str, duration: Duration) -> FsResult<()> {
        let mut lock = self.owned_lock(lease_id).await?;
        lock.expires = expiry(duration);
        self.write_lock(&lock).await
    }

    async fn release(&self, lease_id: &str) -> FsResult<()> {
        self.owned_lock(lease_id).await?;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("removing lock file {}", self.path.display()))
            }
        }
    }

    async fn read_message(&self) -> FsResult<Option<LockMessage>> {
        Ok(self.read_lock().await?.and_then(|lock| lock.holder()))
    }

    async fn write_message(&self, lease_id: &str, message: &LockMessage) -> FsResult<()> {
        let mut lock = self.owned_lock(lease_id).await?;
        lock.date = Some(message.date);
        lock.message = message.message.clone();
        self.write_lock(&lock).await
    }

    async fn clear_message(&self, lease_id: &str) -> FsResult<()> {
        let mut lock = self.owned_lock(lease_id).await?;
        lock.date = None;
        lock.message.clear();
        self.write_lock(&lock).await
    }
}
