use sleet_core::{
    input::{load_inputs, PackageInput},
    services::PackageIndex,
    SleetContext,
};
use tracing::{debug, error, info, warn};

use crate::{
    download::download_sets, error::ErrorContext, init::write_feed, push::apply_push, FeedContext,
    PushOptions, RecreateReport, SleetError, SleetResult,
};

/// Rebuilds every feed document from the nupkg files stored in the feed.
///
/// The packages are copied out and loaded, the feed is destroyed and re-initialized with
/// the same settings, then everything is pushed back. All of it happens under one lock.
/// Nothing is removed until every package loads. If the rebuild fails after that, the
/// copies are kept on disk and their location is part of the error.
pub async fn recreate_feed(feed: &FeedContext) -> SleetResult<RecreateReport> {
    debug!(feed = feed.name(), "recreating feed");
    feed.locked("sleet recreate", || recreate_locked(feed))
        .await
}

async fn recreate_locked(feed: &FeedContext) -> SleetResult<RecreateReport> {
    let ctx = feed.initialized_context().await?;
    let sets = PackageIndex.get_package_sets(&ctx).await?;

    let work_dir = tempfile::tempdir().with_context(|| "creating a temp directory".to_string())?;
    let packages_dir = work_dir.path().join("packages");
    let symbols_dir = work_dir.path().join("symbols");

    info!("Downloading packages from the feed");
    let downloaded = download_sets(&ctx, &sets, &packages_dir, &symbols_dir).await?;
    if !downloaded.missing.is_empty() {
        warn!(
            "{} package(s) listed in the index have no nupkg and will be dropped",
            downloaded.missing.len()
        );
    }

    let inputs = if downloaded.downloaded.is_empty() {
        Vec::new()
    } else {
        load_inputs(&[work_dir.path().to_path_buf()], feed.worker_threads()).await?
    };

    match rebuild(feed, ctx, inputs).await {
        Ok(report) => Ok(report),
        Err(err) if downloaded.downloaded.is_empty() => Err(err),
        Err(err) => {
            let saved = work_dir.keep();
            error!(
                "Recreate failed, the feed packages were saved to {}",
                saved.display()
            );
            Err(SleetError::RecreateFailed {
                saved,
                source: Box::new(err),
            })
        }
    }
}

async fn rebuild(
    feed: &FeedContext,
    ctx: SleetContext,
    inputs: Vec<PackageInput>,
) -> SleetResult<RecreateReport> {
    info!("Removing all files from the feed");
    feed.fs().destroy().await?;

    let ctx = ctx.next_commit();
    write_feed(&ctx).await?;
    feed.fs().commit().await?;

    if inputs.is_empty() {
        info!("Feed recreated, it has no packages");
        return Ok(RecreateReport::default());
    }

    let pushed = apply_push(feed, &ctx, inputs, PushOptions::default()).await?;

    let report = RecreateReport {
        packages: pushed.added.iter().filter(|p| !p.is_symbols).count(),
        symbols_packages: pushed.added.iter().filter(|p| p.is_symbols).count(),
    };
    info!(
        "Feed recreated with {} package(s) and {} symbols package(s)",
        report.packages, report.symbols_packages
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use sleet_core::{
        services::{Catalog, Search},
        test_utils::TestPackage,
        validation::validate_feed,
        FeedSettings, PackageIdentity,
    };
    use sleet_fs::MemoryBackend;

    use super::*;
    use crate::{
        init::init_feed,
        push::push_packages,
        test_utils::{memory_feed, memory_feed_on, PackageDir},
    };

    #[tokio::test]
    async fn test_recreate_repairs_feed() {
        let (feed, _cache) = memory_feed().await;
        let dir = PackageDir::new();
        dir.add(&TestPackage::new("packageA", "1.0.0").with_description("a"));
        dir.add(&TestPackage::new("packageB", "2.0.0"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        // Break search so validation fails.
        let ctx = feed.load_context().await.unwrap();
        ctx.fs.get("search/query").delete().await.unwrap();
        feed.fs().commit().await.unwrap();
        assert!(!validate_feed(&ctx).await.unwrap().is_valid());

        let report = recreate_feed(&feed).await.unwrap();
        assert_eq!(report.packages, 2);

        let ctx = feed.load_context().await.unwrap();
        assert!(validate_feed(&ctx).await.unwrap().is_valid());
        let entry = Search.get_entry(&ctx, "packageA").await.unwrap().unwrap();
        assert_eq!(entry.description, "a");
        assert_eq!(PackageIndex.get_packages(&ctx).await.unwrap().len(), 2);
        // The catalog starts over.
        assert_eq!(Catalog.get_index_entries(&ctx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_recreate_keeps_settings_and_symbols() {
        let (feed, _cache) = memory_feed_on(MemoryBackend::new());
        let settings = FeedSettings {
            symbols_enabled: true,
            catalog_enabled: false,
            ..Default::default()
        };
        init_feed(&feed, Some(settings.clone())).await.unwrap();

        let dir = PackageDir::new();
        dir.add(&TestPackage::new("packageA", "1.0.0"));
        dir.add_symbols(&TestPackage::new("packageA", "1.0.0"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        let report = recreate_feed(&feed).await.unwrap();
        assert_eq!(report.packages, 1);
        assert_eq!(report.symbols_packages, 1);

        let ctx = feed.load_context().await.unwrap();
        assert_eq!(ctx.settings, settings);
        let identity = PackageIdentity::parse("packageA", "1.0.0").unwrap();
        assert!(PackageIndex.symbols_exists(&ctx, &identity).await.unwrap());
        assert!(validate_feed(&ctx).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_corrupt_package_leaves_feed_untouched() {
        let (feed, _cache) = memory_feed().await;
        let dir = PackageDir::new();
        dir.add(&TestPackage::new("packageA", "1.0.0"));
        dir.add(&TestPackage::new("packageB", "2.0.0"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        let ctx = feed.load_context().await.unwrap();
        ctx.fs
            .get("flatcontainer/packageb/2.0.0/packageb.2.0.0.nupkg")
            .write_bytes(b"corrupt")
            .await
            .unwrap();
        feed.fs().commit().await.unwrap();

        assert!(recreate_feed(&feed).await.is_err());

        let files = feed.fs().list_files().await.unwrap();
        assert!(files
            .iter()
            .any(|file| file == "flatcontainer/packagea/1.0.0/packagea.1.0.0.nupkg"));
        assert_eq!(PackageIndex.get_packages(&ctx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_downloaded_packages() {
        let backend = MemoryBackend::new();
        let (feed, _cache) = memory_feed_on(backend.clone());
        init_feed(&feed, None).await.unwrap();
        let dir = PackageDir::new();
        dir.add(&TestPackage::new("packageA", "1.0.0"));
        dir.add(&TestPackage::new("packageB", "2.0.0"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        backend.fail_next_writes(u32::MAX);
        let err = recreate_feed(&feed).await.unwrap_err();
        let SleetError::RecreateFailed { saved, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(saved.join("packages/packagea.1.0.0.nupkg").exists());
        assert!(saved.join("packages/packageb.2.0.0.nupkg").exists());

        // The saved copies are enough to rebuild the feed.
        backend.fail_next_writes(0);
        let (restored, _cache) = memory_feed_on(backend);
        init_feed(&restored, None).await.unwrap();
        push_packages(&restored, &[saved.clone()], PushOptions::default())
            .await
            .unwrap();
        let ctx = restored.load_context().await.unwrap();
        assert_eq!(PackageIndex.get_packages(&ctx).await.unwrap().len(), 2);
        assert!(validate_feed(&ctx).await.unwrap().is_valid());

        std::fs::remove_dir_all(saved).unwrap();
    }

    #[tokio::test]
    async fn test_recreate_empty_feed() {
        let (feed, _cache) = memory_feed().await;
        let report = recreate_feed(&feed).await.unwrap();
        assert_eq!(report.packages, 0);

        let files = feed.fs().list_files().await.unwrap();
        assert!(files.iter().any(|file| file == "index.json"));
    }
}
