//! Error types for feed storage.

use std::time::Duration;

use miette::Diagnostic;
use sleet_utils::error::FileSystemError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum FsError {
    #[error("Failed to {action} '{path}': {source}")]
    #[diagnostic(
        code(sleet_fs::backend),
        help("Check that the feed storage is reachable and writable")
    )]
    Backend {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {0}")]
    #[diagnostic(code(sleet_fs::not_found))]
    NotFound(String),

    #[error("Invalid JSON in '{path}': {source}")]
    #[diagnostic(
        code(sleet_fs::json),
        help("The feed file may be corrupted, run 'sleet validate' or 'sleet recreate'")
    )]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unable to obtain a lock on the feed within {}s", .timeout.as_secs())]
    #[diagnostic(
        code(sleet_fs::lock_timeout),
        help(
            "Another client may be updating the feed. If no other client is running, delete the \
             .lock file at the root of the feed to unlock it manually"
        )
    )]
    LockTimeout { timeout: Duration },

    #[error("Lease on the feed lock was lost: {0}")]
    #[diagnostic(code(sleet_fs::lease_lost))]
    LeaseLost(String),

    #[error("Operation cancelled")]
    #[diagnostic(code(sleet_fs::cancelled))]
    Cancelled,

    #[error("Error while {action}")]
    #[diagnostic(code(sleet_fs::io), help("Check file permissions and disk space"))]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(sleet_fs::file_system))]
    FileSystem(#[from] FileSystemError),
}

impl FsError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FsError::Backend { .. })
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> FsResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> FsResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            FsError::Io {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let backend = FsError::Backend {
            action: "read",
            path: "index.json".into(),
            source: std::io::Error::other("timeout"),
        };
        assert!(backend.is_transient());
        assert!(!FsError::NotFound("index.json".into()).is_transient());
        assert!(!FsError::Cancelled.is_transient());
    }

    #[test]
    fn test_lock_timeout_display() {
        let err = FsError::LockTimeout {
            timeout: Duration::from_secs(90),
        };
        assert_eq!(
            err.to_string(),
            "Unable to obtain a lock on the feed within 90s"
        );
    }
}
