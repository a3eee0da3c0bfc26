//! Remote storage behind a feed.

pub mod memory;
pub mod physical;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{error::FsResult, lock::LeaseBackend};

/// Name of the lock file kept at the root of every feed.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Whether a root-relative path is the lock file or one of its scratch copies.
pub fn is_lock_path(path: &str) -> bool {
    path == LOCK_FILE_NAME
        || path
            .strip_prefix(LOCK_FILE_NAME)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Raw access to the files of a feed.
///
/// Paths are relative to the feed root, use `/` separators and never start with `/`.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Short human readable description used in log lines.
    fn describe(&self) -> String;

    /// Returns `None` when the file does not exist.
    async fn read(&self, path: &str) -> FsResult<Option<Vec<u8>>>;

    async fn write(&self, path: &str, bytes: &[u8]) -> FsResult<()>;

    /// Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> FsResult<()>;

    async fn exists(&self, path: &str) -> FsResult<bool>;

    /// Every feed file, sorted, excluding the lock file.
    async fn list(&self) -> FsResult<Vec<String>>;

    /// Checks the feed container is usable, creating it when possible.
    async fn validate(&self) -> FsResult<bool>;

    /// Lease primitive guarding writers of this feed.
    fn lock_backend(&self) -> Arc<dyn LeaseBackend>;
}
