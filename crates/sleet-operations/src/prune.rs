use std::collections::BTreeSet;

use sleet_core::{services::PackageIndex, PackageIdentity, PackageSet};
use tracing::{debug, info};

use crate::{delete::apply_delete, FeedContext, PruneOptions, PruneReport, SleetResult};

/// Deletes all but the newest stable and prerelease versions of each id.
pub async fn prune_feed(feed: &FeedContext, options: &PruneOptions) -> SleetResult<PruneReport> {
    debug!(?options, "pruning feed");
    feed.locked("sleet prune", || prune_locked(feed, options))
        .await
}

async fn prune_locked(feed: &FeedContext, options: &PruneOptions) -> SleetResult<PruneReport> {
    let ctx = feed.initialized_context().await?;
    let original = PackageIndex.get_package_sets(&ctx).await?;

    let pruned = select_pruned(&original.packages, options);
    if pruned.is_empty() {
        info!("No packages to prune");
        return Ok(PruneReport {
            pruned,
            dry_run: options.dry_run,
        });
    }

    if options.dry_run {
        for identity in &pruned {
            info!("Would prune {identity}");
        }
        return Ok(PruneReport {
            pruned,
            dry_run: true,
        });
    }

    let symbols: Vec<PackageIdentity> = pruned
        .iter()
        .filter(|identity| original.symbols.contains(identity))
        .cloned()
        .collect();
    let deleted = apply_delete(feed, &ctx, original, pruned, symbols).await?;

    info!("Pruned {} package(s)", deleted.removed.len());
    Ok(PruneReport {
        pruned: deleted.removed,
        dry_run: false,
    })
}

/// Versions to delete, oldest first within each id.
fn select_pruned(packages: &PackageSet, options: &PruneOptions) -> Vec<PackageIdentity> {
    let filter: BTreeSet<String> = options.ids.iter().map(|id| id.to_lowercase()).collect();

    let mut pruned = Vec::new();
    for lower_id in packages.ids().keys() {
        if !filter.is_empty() && !filter.contains(lower_id) {
            continue;
        }

        let mut versions = packages.get_packages_by_id(lower_id);
        versions.sort_by(|a, b| b.version().cmp(a.version()));
        let (prerelease, stable): (Vec<_>, Vec<_>) = versions
            .into_iter()
            .partition(|identity| identity.version().is_prerelease());

        for (candidates, keep) in [
            (stable, options.stable_versions_to_keep),
            (prerelease, options.prerelease_versions_to_keep),
        ] {
            let Some(keep) = keep else {
                continue;
            };
            let mut old: Vec<PackageIdentity> = candidates.into_iter().skip(keep).collect();
            old.reverse();
            pruned.extend(old);
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use sleet_core::{test_utils::TestPackage, validation::validate_feed};

    use super::*;
    use crate::{
        push::push_packages,
        test_utils::{memory_feed, PackageDir},
        PushOptions,
    };

    fn id(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    fn set(identities: &[(&str, &str)]) -> PackageSet {
        identities.iter().map(|(i, v)| id(i, v)).collect()
    }

    #[test]
    fn test_select_keeps_newest_per_category() {
        let packages = set(&[
            ("a", "1.0.0"),
            ("a", "2.0.0"),
            ("a", "3.0.0"),
            ("a", "3.1.0-beta"),
            ("a", "3.1.0-rc"),
            ("b", "1.0.0"),
        ]);

        let options = PruneOptions {
            stable_versions_to_keep: Some(1),
            prerelease_versions_to_keep: Some(1),
            ..Default::default()
        };
        assert_eq!(
            select_pruned(&packages, &options),
            vec![id("a", "1.0.0"), id("a", "2.0.0"), id("a", "3.1.0-beta")]
        );
    }

    #[test]
    fn test_select_unset_category_is_kept() {
        let packages = set(&[
            ("a", "1.0.0"),
            ("a", "2.0.0"),
            ("a", "3.0.0-beta"),
            ("a", "4.0.0-beta"),
        ]);

        let options = PruneOptions {
            stable_versions_to_keep: Some(1),
            ..Default::default()
        };
        assert_eq!(select_pruned(&packages, &options), vec![id("a", "1.0.0")]);
    }

    #[test]
    fn test_select_respects_id_filter() {
        let packages = set(&[("a", "1.0.0"), ("a", "2.0.0"), ("b", "1.0.0"), ("b", "2.0.0")]);

        let options = PruneOptions {
            stable_versions_to_keep: Some(1),
            ids: vec!["B".to_string()],
            ..Default::default()
        };
        assert_eq!(select_pruned(&packages, &options), vec![id("b", "1.0.0")]);
    }

    #[tokio::test]
    async fn test_prune_feed() {
        let (feed, _cache) = memory_feed().await;
        let dir = PackageDir::new();
        for version in ["1.0.0", "2.0.0", "3.0.0"] {
            dir.add(&TestPackage::new("packageA", version));
        }
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        let mut options = PruneOptions {
            stable_versions_to_keep: Some(2),
            dry_run: true,
            ..Default::default()
        };
        let report = prune_feed(&feed, &options).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.pruned, vec![id("packageA", "1.0.0")]);

        let ctx = feed.load_context().await.unwrap();
        assert_eq!(PackageIndex.get_packages(&ctx).await.unwrap().len(), 3);

        options.dry_run = false;
        let report = prune_feed(&feed, &options).await.unwrap();
        assert_eq!(report.pruned, vec![id("packageA", "1.0.0")]);

        let remaining = PackageIndex.get_packages(&ctx).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&id("packageA", "1.0.0")));
        assert!(validate_feed(&ctx).await.unwrap().is_valid());
    }
}
