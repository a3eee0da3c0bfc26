use sleet_core::services::PackageIndex;
use tracing::{debug, info};

use crate::{FeedContext, SleetResult, StatsReport};

/// Counts the packages in the feed's package index.
pub async fn feed_stats(feed: &FeedContext) -> SleetResult<StatsReport> {
    debug!(feed = feed.name(), "reading feed stats");
    feed.locked("sleet stats", || stats_locked(feed)).await
}

async fn stats_locked(feed: &FeedContext) -> SleetResult<StatsReport> {
    let ctx = feed.initialized_context().await?;
    let sets = PackageIndex.get_package_sets(&ctx).await?;

    let report = StatsReport {
        packages: sets.packages.len(),
        ids: sets.packages.ids().len(),
        symbols_packages: sets.symbols.len(),
    };
    info!("Packages in feed: {}", report.packages);
    info!("Unique package ids in feed: {}", report.ids);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use sleet_core::test_utils::TestPackage;

    use super::*;
    use crate::{
        push::push_packages,
        test_utils::{memory_feed, PackageDir},
        PushOptions,
    };

    #[tokio::test]
    async fn test_counts_versions_and_ids() {
        let (feed, _cache) = memory_feed().await;
        assert_eq!(feed_stats(&feed).await.unwrap(), StatsReport::default());

        let dir = PackageDir::new();
        dir.add(&TestPackage::new("packageA", "1.0.0"));
        dir.add(&TestPackage::new("PackageA", "2.0.0"));
        dir.add(&TestPackage::new("packageB", "1.0.0"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        let stats = feed_stats(&feed).await.unwrap();
        assert_eq!(stats.packages, 3);
        assert_eq!(stats.ids, 2);
        assert_eq!(stats.symbols_packages, 0);
    }
}
