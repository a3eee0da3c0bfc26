use tracing::{debug, info};

use crate::{DestroyReport, FeedContext, SleetResult};

/// Deletes every file of the feed except the lock.
pub async fn destroy_feed(feed: &FeedContext) -> SleetResult<DestroyReport> {
    debug!(feed = feed.name(), "destroying feed");
    feed.locked("sleet destroy", || destroy_locked(feed))
        .await
}

async fn destroy_locked(feed: &FeedContext) -> SleetResult<DestroyReport> {
    info!("Removing all files from the feed");
    let removed = feed.fs().destroy().await?;
    if removed {
        info!("Feed '{}' destroyed", feed.name());
    } else {
        info!("Feed '{}' is already empty", feed.name());
    }
    Ok(DestroyReport { removed })
}

#[cfg(test)]
mod tests {
    use sleet_core::test_utils::TestPackage;

    use super::*;
    use crate::{
        push::push_packages,
        stats::feed_stats,
        test_utils::{memory_feed, PackageDir},
        PushOptions, SleetError,
    };

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let (feed, _cache) = memory_feed().await;
        let dir = PackageDir::new();
        dir.add(&TestPackage::new("packageA", "1.0.0"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        let report = destroy_feed(&feed).await.unwrap();
        assert!(report.removed);
        assert!(feed.fs().list_files().await.unwrap().is_empty());

        let err = feed_stats(&feed).await.unwrap_err();
        assert!(matches!(err, SleetError::FeedNotInitialized(_)));

        let report = destroy_feed(&feed).await.unwrap();
        assert!(!report.removed);
    }
}
