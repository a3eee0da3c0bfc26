//! File abstraction for sleet feeds.
//!
//! A feed is a tree of static files behind a [`StorageBackend`]. Commands work
//! against [`SleetFileSystem`], which hands out cached [`SleetFile`] handles,
//! tracks which ones changed and pushes only those on [`SleetFileSystem::commit`].
//! Writers serialize through a [`FeedLock`].

pub mod backend;
pub mod error;
pub mod file;
pub mod file_system;
pub mod json;
pub mod lock;
pub mod retry;

pub use backend::{memory::MemoryBackend, physical::PhysicalBackend, StorageBackend};
pub use error::{FsError, FsResult};
pub use file::SleetFile;
pub use file_system::SleetFileSystem;
pub use lock::{FeedLock, LeaseLock, LockMessage};
pub use retry::RetryPolicy;
