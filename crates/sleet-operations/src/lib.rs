//! Feed commands: each takes the feed lock, runs one batch through the feed
//! services and commits the result.

pub mod context;
pub mod error;
pub mod types;

pub mod delete;
pub mod destroy;
pub mod download;
pub mod feed_settings;
pub mod init;
pub mod prune;
pub mod push;
pub mod recreate;
pub mod stats;
pub mod validate;

#[cfg(test)]
mod test_utils;

pub use context::FeedContext;
pub use error::SleetError;
pub use types::*;

pub type SleetResult<T> = std::result::Result<T, SleetError>;
