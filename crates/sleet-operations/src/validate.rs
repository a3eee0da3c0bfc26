use sleet_core::validation::validate_feed;
use tracing::{debug, info, warn};

use crate::{FeedContext, SleetResult, ValidateReport};

/// Checks every service against the package index.
///
/// Mismatches are part of the report, not an error.
pub async fn validate(feed: &FeedContext) -> SleetResult<ValidateReport> {
    debug!(feed = feed.name(), "validating feed");
    feed.locked("sleet validate", || validate_locked(feed))
        .await
}

async fn validate_locked(feed: &FeedContext) -> SleetResult<ValidateReport> {
    let ctx = feed.initialized_context().await?;
    let report = validate_feed(&ctx).await?;

    if report.is_valid() {
        info!("Feed valid");
    } else {
        warn!("Feed invalid! Run 'sleet recreate' to rebuild it from the stored packages");
    }
    Ok(report)
}
