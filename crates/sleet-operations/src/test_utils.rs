use std::{path::PathBuf, sync::Arc, time::Duration};

use sleet_core::test_utils::{write_nupkg, write_symbols_nupkg, TestPackage, TEST_FEED_URI};
use sleet_fs::{MemoryBackend, RetryPolicy, SleetFileSystem};
use tempfile::TempDir;
use url::Url;

use crate::{init::init_feed, FeedContext};

/// An uninitialized feed on `backend`. The returned dir holds the local cache.
pub fn memory_feed_on(backend: MemoryBackend) -> (FeedContext, TempDir) {
    let cache = tempfile::tempdir().unwrap();
    let fs = SleetFileSystem::new(
        Arc::new(backend),
        Url::parse(TEST_FEED_URI).unwrap(),
        cache.path().to_path_buf(),
    )
    .with_retry(RetryPolicy::none());
    let feed = FeedContext::new("test", Arc::new(fs)).with_lock_timeout(Duration::from_secs(5));
    (feed, cache)
}

/// An initialized feed with default settings.
pub async fn memory_feed() -> (FeedContext, TempDir) {
    let (feed, cache) = memory_feed_on(MemoryBackend::new());
    init_feed(&feed, None).await.unwrap();
    (feed, cache)
}

/// Scratch dir of nupkg files to push.
pub struct PackageDir {
    pub dir: TempDir,
}

impl PackageDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn add(&self, package: &TestPackage) -> PathBuf {
        write_nupkg(self.dir.path(), package)
    }

    pub fn add_symbols(&self, package: &TestPackage) -> PathBuf {
        write_symbols_nupkg(self.dir.path(), package)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        vec![self.dir.path().to_path_buf()]
    }
}
