use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DurationError {
    #[error("Invalid duration `{input}`, expected a value like `30s`, `5m` or `1h30m`")]
    Invalid { input: String },
}

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,

    #[error("Environment variable `{var}` is not set, used in `{input}`")]
    UnsetVariable { var: String, input: String },

    #[error("Unclosed `${{` in `{input}`")]
    UnclosedVariable { input: String },

    #[error("Failed to get current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

#[derive(Debug, Error)]
#[error("Failed to read directory `{}`: {source}", path.display())]
pub struct FileSystemError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub type DurationResult<T> = std::result::Result<T, DurationError>;
pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type PathResult<T> = std::result::Result<T, PathError>;

#[cfg(test)]
mod tests {
    use std::{error::Error, io};

    use super::*;

    #[test]
    fn test_path_error_messages() {
        let unset = PathError::UnsetVariable {
            var: "FEED".to_string(),
            input: "$FEED/packages".to_string(),
        };
        assert_eq!(
            unset.to_string(),
            "Environment variable `FEED` is not set, used in `$FEED/packages`"
        );
        assert_eq!(
            PathError::UnclosedVariable {
                input: "${FEED".to_string()
            }
            .to_string(),
            "Unclosed `${` in `${FEED`"
        );
        assert!(PathError::CurrentDir(io::Error::other("gone")).source().is_some());
    }

    #[test]
    fn test_file_system_error_keeps_source() {
        let err = FileSystemError {
            path: PathBuf::from("/feed/packages"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read directory `/feed/packages`: permission denied"
        );
        assert!(err.source().is_some());
    }
}
