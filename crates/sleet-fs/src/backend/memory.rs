use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use super::StorageBackend;
use crate::{
    error::{FsError, FsResult},
    lock::{memory::MemoryLeaseBackend, LeaseBackend},
};

/// Feed kept in process memory. Clones share the same files and lease.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    lease: Arc<MemoryLeaseBackend>,
    failing_writes: Arc<AtomicU32>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes fail with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Snapshot of every stored file.
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.with_files(|files| files.clone())
    }

    fn with_files<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> T) -> T {
        let mut guard = self
            .files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn take_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn read(&self, path: &str) -> FsResult<Option<Vec<u8>>> {
        Ok(self.with_files(|files| files.get(path).cloned()))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> FsResult<()> {
        if self.take_failure() {
            return Err(FsError::Backend {
                action: "write",
                path: path.to_string(),
                source: std::io::Error::other("injected failure"),
            });
        }
        self.with_files(|files| files.insert(path.to_string(), bytes.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        self.with_files(|files| files.remove(path));
        Ok(())
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        Ok(self.with_files(|files| files.contains_key(path)))
    }

    async fn list(&self) -> FsResult<Vec<String>> {
        Ok(self.with_files(|files| files.keys().cloned().collect()))
    }

    async fn validate(&self) -> FsResult<bool> {
        Ok(true)
    }

    fn lock_backend(&self) -> Arc<dyn LeaseBackend> {
        self.lease.clone()
    }
}
