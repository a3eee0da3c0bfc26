pub mod constants;
pub mod context;
pub mod details;
pub mod error;
pub mod identity;
pub mod input;
pub mod nuspec;
pub mod operations;
pub mod package_set;
pub mod paths;
pub mod service_index;
pub mod services;
pub mod settings;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use context::SleetContext;
pub use error::CoreError;
pub use identity::{PackageIdentity, PackageVersion};
pub use input::PackageInput;
pub use operations::SleetOperations;
pub use package_set::{PackageSet, PackageSets};
pub use settings::FeedSettings;

pub type CoreResult<T> = std::result::Result<T, CoreError>;
