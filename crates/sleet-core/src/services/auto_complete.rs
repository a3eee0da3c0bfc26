//! `autocomplete/query`: every id with at least one version, for name completion.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    constants::*, context::SleetContext, operations::SleetOperations, package_set::PackageSet,
    CoreResult,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoCompleteDocument {
    pub total_hits: usize,
    pub data: Vec<String>,
    #[serde(rename = "@context")]
    pub context: Value,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AutoComplete;

impl AutoComplete {
    pub async fn load(&self, ctx: &SleetContext) -> CoreResult<Option<AutoCompleteDocument>> {
        Ok(ctx
            .fs
            .get(AUTOCOMPLETE_PATH)
            .get_json_if_exists::<AutoCompleteDocument>()
            .await?)
    }

    /// Ids currently listed, in document order.
    pub async fn get_ids(&self, ctx: &SleetContext) -> CoreResult<Vec<String>> {
        Ok(self.load(ctx).await?.unwrap_or_default().data)
    }

    pub async fn init(&self, ctx: &SleetContext) -> CoreResult<()> {
        if self.load(ctx).await?.is_none() {
            self.write(ctx, Vec::new()).await?;
        }
        Ok(())
    }

    async fn write(&self, ctx: &SleetContext, data: Vec<String>) -> CoreResult<()> {
        let document = AutoCompleteDocument {
            total_hits: data.len(),
            data,
            context: json!({ "@vocab": NUGET_SCHEMA }),
        };
        ctx.fs.get(AUTOCOMPLETE_PATH).write_json(&document).await?;
        Ok(())
    }

    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        let ids = sorted_ids(&operations.updated_index().packages);
        let current = self.load(ctx).await?;

        if current.is_some_and(|document| document.data == ids) {
            debug!("auto complete ids unchanged");
            return Ok(());
        }
        self.write(ctx, ids).await
    }
}

/// Display ids ordered case-insensitively, one per distinct lower-cased id.
fn sorted_ids(packages: &PackageSet) -> Vec<String> {
    packages.ids().into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::PackageIdentity,
        package_set::PackageSets,
        test_utils::{memory_context, package_input, TestPackage},
    };

    #[tokio::test]
    async fn test_ids_are_sorted_case_insensitively() {
        let (ctx, _guard) = memory_context().await;
        let (b, _b) = package_input(&TestPackage::new("beta", "1.0.0"));
        let (a, _a) = package_input(&TestPackage::new("Alpha", "1.0.0"));
        let (a2, _a2) = package_input(&TestPackage::new("Alpha", "2.0.0"));

        let ops = SleetOperations::create(PackageSets::default(), vec![b, a, a2], vec![]);
        AutoComplete.apply_operations(&ctx, &ops).await.unwrap();

        let document = AutoComplete.load(&ctx).await.unwrap().unwrap();
        assert_eq!(document.data, vec!["Alpha", "beta"]);
        assert_eq!(document.total_hits, 2);
    }

    #[tokio::test]
    async fn test_unchanged_ids_skip_the_write() {
        let (ctx, _guard) = memory_context().await;
        let (a, _a) = package_input(&TestPackage::new("Alpha", "1.0.0"));
        let ops = SleetOperations::create(PackageSets::default(), vec![a], vec![]);
        AutoComplete.apply_operations(&ctx, &ops).await.unwrap();
        ctx.fs.commit().await.unwrap();

        let (a2, _a2) = package_input(&TestPackage::new("Alpha", "2.0.0"));
        let ops = SleetOperations::create(ops.updated_index().clone(), vec![a2], vec![]);
        AutoComplete.apply_operations(&ctx, &ops).await.unwrap();

        assert!(!ctx.fs.get(AUTOCOMPLETE_PATH).has_changes());
    }

    #[tokio::test]
    async fn test_removed_id_disappears() {
        let (ctx, _guard) = memory_context().await;
        let (a, _a) = package_input(&TestPackage::new("Alpha", "1.0.0"));
        let ops = SleetOperations::create(PackageSets::default(), vec![a], vec![]);
        AutoComplete.apply_operations(&ctx, &ops).await.unwrap();

        let remove = SleetOperations::create_delete(
            ops.updated_index().clone(),
            vec![PackageIdentity::parse("alpha", "1.0.0").unwrap()],
            vec![],
        );
        AutoComplete.apply_operations(&ctx, &remove).await.unwrap();

        assert!(AutoComplete.get_ids(&ctx).await.unwrap().is_empty());
    }
}
