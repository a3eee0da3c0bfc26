use std::{collections::BTreeMap, path::PathBuf};

use sleet_core::{
    input::load_inputs,
    services::{self, PackageIndex},
    CoreError, PackageIdentity, PackageInput, SleetContext, SleetOperations,
};
use tracing::{debug, info, warn};

use crate::{FeedContext, PushOptions, PushReport, PushedInfo, SleetResult};

/// Adds every nupkg found under `paths` to the feed in one batch.
///
/// Packages are read before the feed lock is taken.
pub async fn push_packages(
    feed: &FeedContext,
    paths: &[PathBuf],
    options: PushOptions,
) -> SleetResult<PushReport> {
    let inputs = load_inputs(paths, feed.worker_threads()).await?;
    debug!(count = inputs.len(), ?options, "pushing packages");

    feed.locked("sleet push", || push_locked(feed, inputs, options))
        .await
}

async fn push_locked(
    feed: &FeedContext,
    inputs: Vec<PackageInput>,
    options: PushOptions,
) -> SleetResult<PushReport> {
    let ctx = feed.initialized_context().await?;
    apply_push(feed, &ctx, inputs, options).await
}

/// Pushes `inputs` while the caller holds the feed lock.
pub(crate) async fn apply_push(
    feed: &FeedContext,
    ctx: &SleetContext,
    inputs: Vec<PackageInput>,
    options: PushOptions,
) -> SleetResult<PushReport> {
    let mut report = PushReport::default();

    let mut unique: BTreeMap<(PackageIdentity, bool), PackageInput> = BTreeMap::new();
    let mut duplicates = Vec::new();
    for input in inputs {
        if input.is_symbols && !ctx.settings.symbols_enabled {
            warn!(
                "Symbols packages are disabled on this feed, skipping {}",
                input.identity
            );
            report.skipped.push(PushedInfo {
                identity: input.identity,
                is_symbols: true,
                replaced: false,
            });
            continue;
        }

        let name = input.identity.to_string();
        let key = (input.identity.clone(), input.is_symbols);
        if unique.insert(key, input).is_some() {
            duplicates.push(name);
        }
    }

    if !duplicates.is_empty() {
        if !options.force {
            return Err(CoreError::DuplicatePackages(duplicates).into());
        }
        warn!(
            "Duplicate packages in the batch, keeping the last of each: {}",
            duplicates.join(", ")
        );
    }

    let original = PackageIndex.get_package_sets(ctx).await?;
    let mut to_add = Vec::with_capacity(unique.len());
    let mut to_remove = Vec::new();

    for ((identity, is_symbols), input) in unique {
        let exists = original.set(is_symbols).contains(&identity);
        if exists && options.skip_existing {
            info!("Skipping {identity}, it already exists in the feed");
            report.skipped.push(PushedInfo {
                identity,
                is_symbols,
                replaced: false,
            });
            continue;
        }
        if exists && !options.force {
            return Err(CoreError::PackageAlreadyExists(identity.to_string()).into());
        }
        if exists {
            to_remove.push(PackageInput::removal(identity.clone(), is_symbols));
        }

        report.added.push(PushedInfo {
            identity,
            is_symbols,
            replaced: exists,
        });
        to_add.push(input);
    }

    if to_add.is_empty() {
        info!("Nothing to push");
        report.unchanged = true;
        return Ok(report);
    }

    for pushed in &report.added {
        match (pushed.is_symbols, pushed.replaced) {
            (true, _) => info!("Adding symbols package {}", pushed.identity),
            (false, true) => info!("Replacing {}", pushed.identity),
            (false, false) => info!("Adding {}", pushed.identity),
        }
    }

    let operations = SleetOperations::create(original, to_add, to_remove);
    services::apply_operations(ctx, &operations).await?;
    feed.fs().commit().await?;

    info!("Successfully pushed {} package(s)", report.added.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use sleet_core::{
        services::{
            catalog::CatalogOperation, Catalog, FlatContainer, Registrations, Search,
        },
        test_utils::TestPackage,
        FeedSettings,
    };
    use sleet_fs::MemoryBackend;

    use super::*;
    use crate::{
        init::init_feed,
        test_utils::{memory_feed, memory_feed_on, PackageDir},
        SleetError,
    };

    fn id(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    #[tokio::test]
    async fn test_push_updates_every_service() {
        let (feed, _cache) = memory_feed().await;
        let packages = PackageDir::new();
        packages.add(&TestPackage::new("packageA", "1.0.0"));

        let report = push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap();
        assert_eq!(report.added.len(), 1);
        assert!(!report.added[0].replaced);

        let ctx = feed.load_context().await.unwrap();
        let index = PackageIndex.get_packages(&ctx).await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains(&id("packageA", "1.0.0")));

        let entries = Catalog.get_index_entries(&ctx).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, CatalogOperation::Add);

        let registrations = Registrations
            .get_packages_by_id(&ctx, "packagea")
            .await
            .unwrap();
        assert_eq!(registrations.len(), 1);

        let versions = FlatContainer::packages()
            .get_versions(&ctx, "packagea")
            .await
            .unwrap();
        let versions: Vec<String> = versions.iter().map(|v| v.to_normalized_string()).collect();
        assert_eq!(versions, vec!["1.0.0"]);

        let search = Search.load(&ctx).await.unwrap().unwrap();
        assert_eq!(search.data.len(), 1);
        assert_eq!(search.data[0].versions.len(), 1);
        assert_eq!(search.data[0].versions[0].version, "1.0.0");
    }

    #[tokio::test]
    async fn test_latest_version_metadata_in_search() {
        let (feed, _cache) = memory_feed().await;

        let first = PackageDir::new();
        first.add(&TestPackage::new("packageA", "1.0.0").with_description("first"));
        push_packages(&feed, &first.paths(), PushOptions::default())
            .await
            .unwrap();

        let second = PackageDir::new();
        second.add(&TestPackage::new("packageA", "2.0.0").with_description("second"));
        push_packages(&feed, &second.paths(), PushOptions::default())
            .await
            .unwrap();

        let ctx = feed.load_context().await.unwrap();
        let entry = Search.get_entry(&ctx, "packageA").await.unwrap().unwrap();
        assert_eq!(entry.version, "2.0.0");
        assert_eq!(entry.description, "second");
        let versions: Vec<&str> = entry.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
    }

    #[tokio::test]
    async fn test_duplicates_in_batch_are_rejected() {
        let (feed, _cache) = memory_feed().await;
        let a = PackageDir::new();
        let b = PackageDir::new();
        a.add(&TestPackage::new("packageA", "1.0.0"));
        b.add(&TestPackage::new("packageA", "1.0.0"));
        let paths = vec![a.dir.path().to_path_buf(), b.dir.path().to_path_buf()];

        let err = push_packages(&feed, &paths, PushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SleetError::Core(CoreError::DuplicatePackages(_))
        ));

        let ctx = feed.load_context().await.unwrap();
        assert!(PackageIndex.get_packages(&ctx).await.unwrap().is_empty());
        assert!(Search.load(&ctx).await.unwrap().unwrap().data.is_empty());

        let options = PushOptions {
            force: true,
            ..Default::default()
        };
        let report = push_packages(&feed, &paths, options).await.unwrap();
        assert_eq!(report.added.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_package() {
        let (feed, _cache) = memory_feed().await;
        let packages = PackageDir::new();
        packages.add(&TestPackage::new("packageA", "1.0.0").with_description("old"));
        push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap();

        let err = push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SleetError::Core(CoreError::PackageAlreadyExists(_))
        ));

        let skip = PushOptions {
            skip_existing: true,
            ..Default::default()
        };
        let report = push_packages(&feed, &packages.paths(), skip).await.unwrap();
        assert!(report.unchanged);
        assert_eq!(report.skipped.len(), 1);

        let replacement = PackageDir::new();
        replacement.add(&TestPackage::new("packageA", "1.0.0").with_description("new"));
        let force = PushOptions {
            force: true,
            ..Default::default()
        };
        let report = push_packages(&feed, &replacement.paths(), force)
            .await
            .unwrap();
        assert!(report.added[0].replaced);

        let ctx = feed.load_context().await.unwrap();
        let entry = Search.get_entry(&ctx, "packageA").await.unwrap().unwrap();
        assert_eq!(entry.description, "new");
        assert_eq!(PackageIndex.get_packages(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookups_ignore_case() {
        let (feed, _cache) = memory_feed().await;
        let packages = PackageDir::new();
        packages.add(&TestPackage::new("PackageA", "1.0.0"));
        push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap();

        let ctx = feed.load_context().await.unwrap();
        let expected = id("PackageA", "1.0.0");
        for query in ["packagea", "PACKAGEA", "PackageA"] {
            assert_eq!(
                PackageIndex.get_packages_by_id(&ctx, query).await.unwrap(),
                vec![expected.clone()]
            );
            assert_eq!(
                Registrations.get_packages_by_id(&ctx, query).await.unwrap(),
                vec![expected.clone()]
            );
            assert_eq!(
                FlatContainer::packages()
                    .get_packages_by_id(&ctx, query)
                    .await
                    .unwrap(),
                vec![expected.clone()]
            );
        }
    }

    #[tokio::test]
    async fn test_symbols_packages_follow_settings() {
        let (feed, _cache) = memory_feed().await;
        let packages = PackageDir::new();
        packages.add_symbols(&TestPackage::new("packageA", "1.0.0"));

        let report = push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap();
        assert!(report.unchanged);
        assert!(report.skipped[0].is_symbols);

        let (feed, _cache) = memory_feed_on(MemoryBackend::new());
        let settings = FeedSettings {
            symbols_enabled: true,
            ..Default::default()
        };
        init_feed(&feed, Some(settings)).await.unwrap();
        push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap();

        let ctx = feed.load_context().await.unwrap();
        let symbols = PackageIndex.get_symbols_packages(&ctx).await.unwrap();
        assert!(symbols.contains(&id("packageA", "1.0.0")));
        assert!(PackageIndex.get_packages(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_requires_initialized_feed() {
        let (feed, _cache) = memory_feed_on(MemoryBackend::new());
        let packages = PackageDir::new();
        packages.add(&TestPackage::new("packageA", "1.0.0"));

        let err = push_packages(&feed, &packages.paths(), PushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SleetError::FeedNotInitialized(_)));
    }
}
