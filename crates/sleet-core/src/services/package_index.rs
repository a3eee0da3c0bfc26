//! `sleet.packageindex.json`: the authoritative id to versions map.

use serde_json::{json, Value};
use tracing::debug;

use crate::{
    constants::PACKAGE_INDEX_PATH,
    context::SleetContext,
    error::CoreError,
    identity::PackageIdentity,
    operations::SleetOperations,
    package_set::{PackageSet, PackageSets},
    CoreResult,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct PackageIndex;

impl PackageIndex {
    /// Current sets, empty when the document does not exist yet.
    pub async fn get_package_sets(&self, ctx: &SleetContext) -> CoreResult<PackageSets> {
        let Some(json) = ctx
            .fs
            .get(PACKAGE_INDEX_PATH)
            .get_json_if_exists::<Value>()
            .await?
        else {
            return Ok(PackageSets::default());
        };

        let node = |name: &'static str| {
            json.get(name).ok_or_else(|| {
                CoreError::MissingNode {
                    path: PACKAGE_INDEX_PATH.to_string(),
                    node: name,
                }
            })
        };

        Ok(PackageSets {
            packages: PackageSet::from_json(PACKAGE_INDEX_PATH, node("packages")?)?,
            symbols: PackageSet::from_json(PACKAGE_INDEX_PATH, node("symbols")?)?,
        })
    }

    pub async fn get_packages(&self, ctx: &SleetContext) -> CoreResult<PackageSet> {
        Ok(self.get_package_sets(ctx).await?.packages)
    }

    pub async fn get_symbols_packages(&self, ctx: &SleetContext) -> CoreResult<PackageSet> {
        Ok(self.get_package_sets(ctx).await?.symbols)
    }

    pub async fn get_packages_by_id(
        &self,
        ctx: &SleetContext,
        id: &str,
    ) -> CoreResult<Vec<PackageIdentity>> {
        Ok(self.get_packages(ctx).await?.get_packages_by_id(id))
    }

    pub async fn get_symbols_packages_by_id(
        &self,
        ctx: &SleetContext,
        id: &str,
    ) -> CoreResult<Vec<PackageIdentity>> {
        Ok(self.get_symbols_packages(ctx).await?.get_packages_by_id(id))
    }

    pub async fn exists(&self, ctx: &SleetContext, identity: &PackageIdentity) -> CoreResult<bool> {
        Ok(self.get_packages(ctx).await?.contains(identity))
    }

    pub async fn symbols_exists(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
    ) -> CoreResult<bool> {
        Ok(self.get_symbols_packages(ctx).await?.contains(identity))
    }

    pub async fn add_package(
        &self,
        ctx: &SleetContext,
        identity: PackageIdentity,
        symbols: bool,
    ) -> CoreResult<()> {
        let mut sets = self.get_package_sets(ctx).await?;
        if sets.set_mut(symbols).add(identity) {
            self.write_sets(ctx, &sets).await?;
        }
        Ok(())
    }

    /// No-op when the identity is not present.
    pub async fn remove_package(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
        symbols: bool,
    ) -> CoreResult<()> {
        let mut sets = self.get_package_sets(ctx).await?;
        if sets.set_mut(symbols).remove(identity) {
            self.write_sets(ctx, &sets).await?;
        }
        Ok(())
    }

    /// Writes the index. It is kept even when both sets are empty.
    pub async fn write_sets(&self, ctx: &SleetContext, sets: &PackageSets) -> CoreResult<()> {
        let json = json!({
            "packages": sets.packages.to_json(),
            "symbols": sets.symbols.to_json(),
        });
        ctx.fs.get(PACKAGE_INDEX_PATH).write_json(&json).await?;
        Ok(())
    }

    /// Creates an empty index when none exists.
    pub async fn init(&self, ctx: &SleetContext) -> CoreResult<()> {
        if !ctx.fs.get(PACKAGE_INDEX_PATH).exists().await? {
            self.write_sets(ctx, &PackageSets::default()).await?;
        }
        Ok(())
    }

    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        let current = self.get_package_sets(ctx).await?;
        if &current == operations.updated_index() && ctx.fs.get(PACKAGE_INDEX_PATH).exists().await?
        {
            debug!("package index unchanged");
            return Ok(());
        }
        self.write_sets(ctx, operations.updated_index()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::memory_context;

    fn id(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let (ctx, _guard) = memory_context().await;
        let sets = PackageIndex.get_package_sets(&ctx).await.unwrap();
        assert!(sets.is_empty());
    }

    #[tokio::test]
    async fn test_add_remove_and_lookup_by_id() {
        let (ctx, _guard) = memory_context().await;
        let index = PackageIndex;

        index
            .add_package(&ctx, id("PackageA", "1.0.0"), false)
            .await
            .unwrap();
        index
            .add_package(&ctx, id("PackageA", "1.0.0"), true)
            .await
            .unwrap();

        let found = index.get_packages_by_id(&ctx, "packagea").await.unwrap();
        assert_eq!(found, vec![id("PackageA", "1.0.0")]);
        assert!(index.exists(&ctx, &id("PACKAGEA", "1.0")).await.unwrap());
        assert!(index
            .symbols_exists(&ctx, &id("packagea", "1.0.0"))
            .await
            .unwrap());

        index
            .remove_package(&ctx, &id("packagea", "1.0.0"), false)
            .await
            .unwrap();
        assert!(index.get_packages(&ctx).await.unwrap().is_empty());
        assert_eq!(index.get_symbols_packages(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_is_persisted() {
        let (ctx, _guard) = memory_context().await;
        PackageIndex.init(&ctx).await.unwrap();

        let json: Value = ctx
            .fs
            .get(PACKAGE_INDEX_PATH)
            .get_json()
            .await
            .unwrap();
        assert_eq!(json, json!({ "packages": {}, "symbols": {} }));
    }

    #[tokio::test]
    async fn test_missing_node_is_fatal() {
        let (ctx, _guard) = memory_context().await;
        ctx.fs
            .get(PACKAGE_INDEX_PATH)
            .write_json(&json!({ "packages": {} }))
            .await
            .unwrap();

        assert!(matches!(
            PackageIndex.get_package_sets(&ctx).await,
            Err(CoreError::MissingNode { node: "symbols", .. })
        ));
    }
}
