//! Error types for sleet-core.

use std::path::PathBuf;

use miette::Diagnostic;
use sleet_fs::FsError;
use sleet_utils::error::FileSystemError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    #[diagnostic(code(sleet_core::file_system))]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(sleet_core::io), help("Check file permissions and disk space"))]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is missing the required '{node}' node")]
    #[diagnostic(
        code(sleet_core::missing_node),
        help("The feed is corrupted, run 'sleet recreate' to rebuild it")
    )]
    MissingNode { path: String, node: &'static str },

    #[error("Unknown catalog operation '{operation}' in '{path}'")]
    #[diagnostic(
        code(sleet_core::invalid_operation),
        help("The catalog is corrupted, run 'sleet recreate' to rebuild it")
    )]
    InvalidOperation { path: String, operation: String },

    #[error("Package '{}' does not contain a nuspec file", .0.display())]
    #[diagnostic(
        code(sleet_core::missing_nuspec),
        help("A nupkg must contain '<id>.nuspec' at the root of the archive")
    )]
    MissingNuspec(PathBuf),

    #[error("Invalid nuspec in '{}': {reason}", .path.display())]
    #[diagnostic(code(sleet_core::invalid_nuspec))]
    InvalidNuspec { path: PathBuf, reason: String },

    #[error("Failed to read package '{}'", .path.display())]
    #[diagnostic(
        code(sleet_core::invalid_package),
        help("The file is not a valid nupkg archive")
    )]
    InvalidPackage {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Invalid package version '{0}'")]
    #[diagnostic(
        code(sleet_core::invalid_version),
        help("Versions look like 1.2.3, 1.2.3.4 or 1.2.3-beta.1")
    )]
    InvalidVersion(String),

    #[error("Invalid package id '{0}'")]
    #[diagnostic(code(sleet_core::invalid_id))]
    InvalidPackageId(String),

    #[error("Duplicate packages in the same batch: {}", .0.join(", "))]
    #[diagnostic(
        code(sleet_core::duplicate_packages),
        help("Remove the duplicates or pass --force to keep the last one")
    )]
    DuplicatePackages(Vec<String>),

    #[error("Package '{0}' already exists in the feed")]
    #[diagnostic(
        code(sleet_core::package_exists),
        help("Pass --force to replace it or --skip-existing to ignore it")
    )]
    PackageAlreadyExists(String),

    #[error("Package '{0}' has no content to add")]
    #[diagnostic(code(sleet_core::missing_content))]
    MissingPackageContent(String),

    #[error("No packages found in {0}")]
    #[diagnostic(
        code(sleet_core::no_packages),
        help("Pass .nupkg files or directories containing them")
    )]
    NoPackages(String),

    #[error("Unknown feed setting '{0}'")]
    #[diagnostic(
        code(sleet_core::unknown_setting),
        help("Known settings: catalogEnabled, symbolsEnabled, catalogPageSize")
    )]
    UnknownSetting(String),

    #[error("Invalid value '{value}' for feed setting '{key}'")]
    #[diagnostic(code(sleet_core::invalid_setting))]
    InvalidSetting { key: String, value: String },

    #[error("Background task failed: {0}")]
    #[diagnostic(code(sleet_core::task))]
    TaskFailed(String),
}

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T, CoreError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T, CoreError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            CoreError::Io {
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
    fn test_duplicate_packages_display() {
        let err = CoreError::DuplicatePackages(vec![
            "packageA 1.0.0".to_string(),
            "packageB 2.0.0".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Duplicate packages in the same batch: packageA 1.0.0, packageB 2.0.0"
        );
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::other("boom"));
        let err = result.with_context(|| "reading a.nupkg".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Error while reading a.nupkg");
    }
}
