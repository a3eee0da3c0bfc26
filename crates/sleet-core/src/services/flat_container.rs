//! Raw nupkg layout: `{root}/{id}/{version}/{id}.{version}.nupkg` plus a per-id version list.
//!
//! The same service backs `flatcontainer/` for regular packages and `symbolspackages/` for
//! symbols packages.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    context::SleetContext,
    identity::{PackageIdentity, PackageVersion},
    input::PackageInput,
    operations::SleetOperations,
    paths, CoreResult,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsIndex {
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct FlatContainer {
    symbols: bool,
}

impl FlatContainer {
    pub const fn packages() -> Self {
        Self { symbols: false }
    }

    pub const fn symbols() -> Self {
        Self { symbols: true }
    }

    pub fn is_symbols(&self) -> bool {
        self.symbols
    }

    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        let mut by_id: BTreeMap<String, (Vec<&PackageInput>, Vec<&PackageInput>)> =
            BTreeMap::new();
        for input in operations.removes(self.symbols) {
            by_id.entry(input.identity.lower_id()).or_default().0.push(input);
        }
        for input in operations.adds(self.symbols) {
            by_id.entry(input.identity.lower_id()).or_default().1.push(input);
        }

        for (id, (removes, adds)) in by_id {
            let mut versions = self.get_versions(ctx, &id).await?;

            for input in removes {
                self.remove_files(ctx, &input.identity).await?;
                versions.retain(|version| version != input.identity.version());
            }
            for input in adds {
                self.add_files(ctx, input).await?;
                if !versions.contains(input.identity.version()) {
                    versions.push(input.identity.version().clone());
                }
            }

            self.write_versions(ctx, &id, versions).await?;
        }
        Ok(())
    }

    async fn add_files(&self, ctx: &SleetContext, input: &PackageInput) -> CoreResult<()> {
        let loaded = input.loaded()?;
        debug!(package = %input.identity, symbols = self.symbols, "writing nupkg");

        ctx.fs
            .get(&paths::nupkg(self.symbols, &input.identity))
            .copy_from(&loaded.path)
            .await?;
        if !self.symbols {
            ctx.fs
                .get(&paths::nuspec(false, &input.identity))
                .write_bytes(&loaded.nuspec_bytes)
                .await?;
        }
        Ok(())
    }

    async fn remove_files(&self, ctx: &SleetContext, identity: &PackageIdentity) -> CoreResult<()> {
        debug!(package = %identity, symbols = self.symbols, "deleting nupkg");
        ctx.fs
            .get(&paths::nupkg(self.symbols, identity))
            .delete()
            .await?;
        if !self.symbols {
            ctx.fs.get(&paths::nuspec(false, identity)).delete().await?;
        }
        Ok(())
    }

    async fn write_versions(
        &self,
        ctx: &SleetContext,
        id: &str,
        mut versions: Vec<PackageVersion>,
    ) -> CoreResult<()> {
        let file = ctx.fs.get(&paths::package_versions(self.symbols, id));
        if versions.is_empty() {
            file.delete().await?;
            return Ok(());
        }

        versions.sort();
        let index = VersionsIndex {
            versions: versions
                .iter()
                .map(|version| version.to_normalized_string().to_lowercase())
                .collect(),
        };
        file.write_json(&index).await?;
        Ok(())
    }

    /// Versions listed for `id`, ascending.
    pub async fn get_versions(&self, ctx: &SleetContext, id: &str) -> CoreResult<Vec<PackageVersion>> {
        let Some(index) = ctx
            .fs
            .get(&paths::package_versions(self.symbols, id))
            .get_json_if_exists::<VersionsIndex>()
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut versions = index
            .versions
            .iter()
            .map(|version| PackageVersion::parse(version))
            .collect::<CoreResult<Vec<_>>>()?;
        versions.sort();
        Ok(versions)
    }

    pub async fn get_packages_by_id(
        &self,
        ctx: &SleetContext,
        id: &str,
    ) -> CoreResult<Vec<PackageIdentity>> {
        self.get_versions(ctx, id)
            .await?
            .into_iter()
            .map(|version| PackageIdentity::new(id.to_lowercase(), version))
            .collect()
    }

    pub fn nupkg_uri(&self, ctx: &SleetContext, identity: &PackageIdentity) -> Url {
        ctx.fs.get_uri(&paths::nupkg(self.symbols, identity))
    }

    pub async fn read_nupkg(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
    ) -> CoreResult<Vec<u8>> {
        Ok(ctx
            .fs
            .get(&paths::nupkg(self.symbols, identity))
            .read_bytes()
            .await?)
    }

    /// Copies the nupkg of `identity` to `target`. Returns false when it is not in the feed.
    pub async fn download(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
        target: &Path,
    ) -> CoreResult<bool> {
        Ok(ctx
            .fs
            .get(&paths::nupkg(self.symbols, identity))
            .download_to(target)
            .await?)
    }
}
