use std::path::{Path, PathBuf};

use sleet_core::{
    input::{NUPKG_EXTENSION, SYMBOLS_NUPKG_EXTENSION},
    services::{FlatContainer, PackageIndex},
    PackageSets, SleetContext,
};
use tracing::{debug, info, warn};

use crate::{error::ErrorContext, DownloadReport, FeedContext, SleetResult};

/// Copies every nupkg in the feed, symbols packages included, into `output`.
pub async fn download_packages(feed: &FeedContext, output: &Path) -> SleetResult<DownloadReport> {
    debug!(output = %output.display(), "downloading feed packages");
    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("creating directory {}", output.display()))?;

    feed.locked("sleet download", || download_locked(feed, output))
        .await
}

async fn download_locked(feed: &FeedContext, output: &Path) -> SleetResult<DownloadReport> {
    let ctx = feed.initialized_context().await?;
    let sets = PackageIndex.get_package_sets(&ctx).await?;
    let report = download_sets(&ctx, &sets, output, output).await?;

    info!(
        "Downloaded {} package(s) to {}",
        report.downloaded.len(),
        output.display()
    );
    Ok(report)
}

/// Copies the nupkg of every package in `sets`, regular packages into `packages_dir` and
/// symbols packages into `symbols_dir`.
pub(crate) async fn download_sets(
    ctx: &SleetContext,
    sets: &PackageSets,
    packages_dir: &Path,
    symbols_dir: &Path,
) -> SleetResult<DownloadReport> {
    let mut report = DownloadReport::default();

    for (symbols, dir, extension) in [
        (false, packages_dir, NUPKG_EXTENSION),
        (true, symbols_dir, SYMBOLS_NUPKG_EXTENSION),
    ] {
        let container = if symbols {
            FlatContainer::symbols()
        } else {
            FlatContainer::packages()
        };

        for identity in sets.set(symbols) {
            let target: PathBuf = dir.join(format!("{}{extension}", identity.file_stem()));
            if container.download(ctx, identity, &target).await? {
                debug!(package = %identity, target = %target.display(), "downloaded");
                report.downloaded.push(target);
            } else {
                warn!("Unable to find the nupkg of {identity}, skipping");
                report.missing.push(identity.clone());
            }
        }
    }

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
    async fn test_download_copies_every_nupkg() {
        let (feed, _cache) = memory_feed().await;
        let dir = PackageDir::new();
        let original = dir.add(&TestPackage::new("PackageA", "1.0.0"));
        dir.add(&TestPackage::new("PackageB", "2.0.0-beta"));
        push_packages(&feed, &dir.paths(), PushOptions::default())
            .await
            .unwrap();

        let output = tempfile::tempdir().unwrap();
        let target = output.path().join("nested");
        let report = download_packages(&feed, &target).await.unwrap();

        assert_eq!(report.downloaded.len(), 2);
        assert!(report.missing.is_empty());
        let copy = target.join("packagea.1.0.0.nupkg");
        assert_eq!(std::fs::read(copy).unwrap(), std::fs::read(original).unwrap());
        assert!(target.join("packageb.2.0.0-beta.nupkg").exists());
    }

    #[tokio::test]
    async fn test_download_empty_feed() {
        let (feed, _cache) = memory_feed().await;
        let output = tempfile::tempdir().unwrap();

        let report = download_packages(&feed, output.path()).await.unwrap();
        assert!(report.downloaded.is_empty());
    }
}
