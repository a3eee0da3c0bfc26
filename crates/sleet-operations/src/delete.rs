use sleet_core::{
    services::{self, PackageIndex},
    PackageIdentity, PackageSets, PackageVersion, SleetContext, SleetOperations,
};
use tracing::{debug, info, warn};

use crate::{DeleteReport, FeedContext, SleetResult};

/// Removes one version of `id`, or every version when `version` is `None`.
///
/// Matching symbols packages go with them. Unknown packages only log a warning.
pub async fn delete_packages(
    feed: &FeedContext,
    id: &str,
    version: Option<&str>,
) -> SleetResult<DeleteReport> {
    let version = version.map(PackageVersion::parse).transpose()?;
    debug!(id, version = ?version, "deleting packages");

    feed.locked("sleet delete", || delete_locked(feed, id, version))
        .await
}

async fn delete_locked(
    feed: &FeedContext,
    id: &str,
    version: Option<PackageVersion>,
) -> SleetResult<DeleteReport> {
    let ctx = feed.initialized_context().await?;
    let original = PackageIndex.get_package_sets(&ctx).await?;

    let matches = |symbols: bool| -> Vec<PackageIdentity> {
        original
            .set(symbols)
            .get_packages_by_id(id)
            .into_iter()
            .filter(|identity| version.as_ref().is_none_or(|v| identity.version() == v))
            .collect()
    };
    let packages = matches(false);
    let symbols = matches(true);

    if packages.is_empty() && symbols.is_empty() {
        match &version {
            Some(version) => warn!("Package {id} {version} does not exist in the feed"),
            None => warn!("Package {id} does not exist in the feed"),
        }
        return Ok(DeleteReport::default());
    }

    apply_delete(feed, &ctx, original, packages, symbols).await
}

/// Removes `packages` and `symbols` in one batch while the caller holds the feed lock.
pub(crate) async fn apply_delete(
    feed: &FeedContext,
    ctx: &SleetContext,
    original: PackageSets,
    packages: Vec<PackageIdentity>,
    symbols: Vec<PackageIdentity>,
) -> SleetResult<DeleteReport> {
    for identity in &packages {
        info!("Removing {identity}");
    }
    for identity in &symbols {
        info!("Removing symbols package {identity}");
    }

    let operations =
        SleetOperations::create_delete(original, packages.iter().cloned(), symbols.iter().cloned());
    services::apply_operations(ctx, &operations).await?;
    feed.fs().commit().await?;

    Ok(DeleteReport {
        removed: packages,
        removed_symbols: symbols,
    })
}
