use std::path::PathBuf;

use miette::Diagnostic;
use sleet_config::error::ConfigError;
use sleet_core::CoreError;
use sleet_fs::FsError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum SleetError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),

    #[error("Feed '{0}' has not been initialized")]
    #[diagnostic(
        code(sleet::not_initialized),
        help("Run 'sleet init' to create the feed first")
    )]
    FeedNotInitialized(String),

    #[error("Storage for feed '{0}' is not available")]
    #[diagnostic(
        code(sleet::storage_unavailable),
        help("Check that the source path exists and is a writable directory")
    )]
    StorageUnavailable(String),

    #[error("Error while {action}")]
    #[diagnostic(code(sleet::io), help("Check file permissions and disk space"))]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Recreating the feed failed, its packages were saved to {}", .saved.display())]
    #[diagnostic(
        code(sleet::recreate_failed),
        help("Fix the cause, then run 'sleet init' and push the saved directory back")
    )]
    RecreateFailed {
        saved: PathBuf,
        #[source]
        source: Box<SleetError>,
    },

    #[error("{0}")]
    #[diagnostic(code(sleet::custom))]
    Custom(String),
}

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T, SleetError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T, SleetError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            SleetError::Io {
                action: context(),
                source: err,
            }
        })
    }
}
