//! Append-only ledger of every add and remove commit.
//!
//! `catalog/index.json` lists the pages, `catalog/page.{n}.json` hold the commit items and
//! `catalog/data/{guid}.json` hold the permanent details documents the items point to.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
    constants::CATALOG_INDEX_PATH,
    context::SleetContext,
    details::{catalog_context, PackageDelete, PackageDetails},
    error::CoreError,
    identity::PackageIdentity,
    operations::SleetOperations,
    package_set::PackageSet,
    paths, CoreResult,
};

pub const ADD_OPERATION: &str = "add";
pub const REMOVE_OPERATION: &str = "remove";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogOperation {
    Add,
    Remove,
}

impl CatalogOperation {
    fn parse(path: &str, value: &str) -> CoreResult<Self> {
        match value {
            ADD_OPERATION => Ok(Self::Add),
            REMOVE_OPERATION => Ok(Self::Remove),
            _ => {
                Err(CoreError::InvalidOperation {
                    path: path.to_string(),
                    operation: value.to_string(),
                })
            }
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogPageRef {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    pub count: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogIndexDocument {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: Vec<String>,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    pub count: usize,
    #[serde(rename = "nuget:lastCreated", skip_serializing_if = "Option::is_none")]
    pub last_created: Option<DateTime<Utc>>,
    #[serde(rename = "nuget:lastDeleted", skip_serializing_if = "Option::is_none")]
    pub last_deleted: Option<DateTime<Utc>>,
    pub items: Vec<CatalogPageRef>,
    #[serde(rename = "@context")]
    pub context: Value,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogItem {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    #[serde(rename = "nuget:id")]
    pub id: String,
    #[serde(rename = "nuget:version")]
    pub version: String,
    #[serde(rename = "sleet:operation")]
    pub operation: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogPageDocument {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    pub count: usize,
    pub parent: String,
    pub items: Vec<CatalogItem>,
    #[serde(rename = "@context")]
    pub context: Value,
}

/// A parsed view of one commit item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogIndexEntry {
    pub identity: PackageIdentity,
    pub commit_time: DateTime<Utc>,
    pub commit_id: String,
    pub operation: CatalogOperation,
    pub details_uri: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum CatalogDocument {
    Details(Box<PackageDetails>),
    Delete(PackageDelete),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Catalog;

impl Catalog {
    async fn load_index(&self, ctx: &SleetContext) -> CoreResult<Option<CatalogIndexDocument>> {
        Ok(ctx
            .fs
            .get(CATALOG_INDEX_PATH)
            .get_json_if_exists::<CatalogIndexDocument>()
            .await?)
    }

    fn empty_index(&self, ctx: &SleetContext) -> CatalogIndexDocument {
        CatalogIndexDocument {
            uri: ctx.fs.get_uri(CATALOG_INDEX_PATH).to_string(),
            kind: vec![
                "CatalogRoot".to_string(),
                "AppendOnlyCatalog".to_string(),
                "Permalink".to_string(),
            ],
            commit_id: ctx.commit_id_string(),
            commit_time_stamp: ctx.now,
            context: catalog_context(),
            ..Default::default()
        }
    }

    /// Writes an empty index when the catalog is enabled and none exists.
    pub async fn init(&self, ctx: &SleetContext) -> CoreResult<()> {
        if ctx.settings.catalog_enabled && self.load_index(ctx).await?.is_none() {
            ctx.fs
                .get(CATALOG_INDEX_PATH)
                .write_json(&self.empty_index(ctx))
                .await?;
        }
        Ok(())
    }

    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        if !ctx.settings.catalog_enabled {
            return Ok(());
        }

        let commit_id = ctx.commit_id_string();
        let mut items = Vec::new();
        let mut documents = Vec::new();

        for input in operations.removes(false) {
            let details_id = Uuid::new_v4();
            let path = paths::catalog_details(&details_id);
            let uri = ctx.fs.get_uri(&path).to_string();
            items.push(CatalogItem {
                uri: uri.clone(),
                kind: "nuget:PackageDelete".to_string(),
                commit_id: commit_id.clone(),
                commit_time_stamp: ctx.now,
                id: input.identity.id().to_string(),
                version: input.identity.version().to_normalized_string(),
                operation: REMOVE_OPERATION.to_string(),
            });
            documents.push((
                path,
                CatalogDocument::Delete(PackageDelete::new(ctx, &input.identity, uri)),
            ));
        }

        for input in operations.adds(false) {
            let details = PackageDetails::from_input(ctx, input)?;
            let path = paths::catalog_details(&input.loaded()?.details_id);
            items.push(CatalogItem {
                uri: details.uri.clone(),
                kind: "nuget:PackageDetails".to_string(),
                commit_id: commit_id.clone(),
                commit_time_stamp: ctx.now,
                id: input.identity.id().to_string(),
                version: input.identity.version().to_normalized_string(),
                operation: ADD_OPERATION.to_string(),
            });
            documents.push((path, CatalogDocument::Details(Box::new(details))));
        }

        if items.is_empty() {
            return Ok(());
        }

        try_join_all(documents.iter().map(|(path, document)| {
            async move { ctx.fs.get(path).write_json(document).await }
        }))
        .await?;

        self.add_commits(ctx, operations, items).await
    }

    /// Appends one batch of items to the current page, starting a new page when it is full.
    async fn add_commits(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
        items: Vec<CatalogItem>,
    ) -> CoreResult<()> {
        let mut index = match self.load_index(ctx).await? {
            Some(index) => index,
            None => self.empty_index(ctx),
        };
        let index_uri = ctx.fs.get_uri(CATALOG_INDEX_PATH).to_string();
        let page_size = ctx.settings.catalog_page_size.max(1);

        let current = index
            .items
            .iter()
            .enumerate()
            .max_by_key(|(_, page)| page.commit_time_stamp)
            .filter(|(_, page)| page.count < page_size)
            .map(|(position, _)| position);

        let (position, mut page) = match current {
            Some(position) => {
                let path = paths::catalog_page(position);
                let page: CatalogPageDocument = ctx.fs.get(&path).get_json().await?;
                (position, page)
            }
            None => {
                let position = index.items.len();
                let page = CatalogPageDocument {
                    uri: ctx.fs.get_uri(&paths::catalog_page(position)).to_string(),
                    kind: "CatalogPage".to_string(),
                    parent: index_uri.clone(),
                    context: catalog_context(),
                    ..Default::default()
                };
                index.items.push(CatalogPageRef {
                    uri: page.uri.clone(),
                    kind: "CatalogPage".to_string(),
                    ..Default::default()
                });
                (position, page)
            }
        };

        debug!(
            page = position,
            new_items = items.len(),
            existing_items = page.items.len(),
            "adding catalog commits"
        );

        page.items.extend(items);
        page.count = page.items.len();
        page.commit_id = ctx.commit_id_string();
        page.commit_time_stamp = ctx.now;

        if let Some(page_ref) = index.items.get_mut(position) {
            page_ref.count = page.count;
            page_ref.commit_id = page.commit_id.clone();
            page_ref.commit_time_stamp = ctx.now;
        }
        index.uri = index_uri;
        index.count = index.items.len();
        index.commit_id = ctx.commit_id_string();
        index.commit_time_stamp = ctx.now;
        if operations.adds(false).next().is_some() {
            index.last_created = Some(ctx.now);
        }
        if operations.removes(false).next().is_some() {
            index.last_deleted = Some(ctx.now);
        }

        ctx.fs
            .get(&paths::catalog_page(position))
            .write_json(&page)
            .await?;
        ctx.fs.get(CATALOG_INDEX_PATH).write_json(&index).await?;
        Ok(())
    }

    /// Every commit item, newest first. Ties on the timestamp go to the later item.
    pub async fn get_index_entries(&self, ctx: &SleetContext) -> CoreResult<Vec<CatalogIndexEntry>> {
        let Some(index) = self.load_index(ctx).await? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for position in 0..index.items.len() {
            let path = paths::catalog_page(position);
            let page: CatalogPageDocument = ctx.fs.get(&path).get_json().await?;
            trace!(page = position, items = page.items.len(), "reading catalog page");

            for item in page.items {
                let operation = CatalogOperation::parse(&path, &item.operation)?;
                entries.push(CatalogIndexEntry {
                    identity: PackageIdentity::parse(&item.id, &item.version)?,
                    commit_time: item.commit_time_stamp,
                    commit_id: item.commit_id,
                    operation,
                    details_uri: item.uri,
                });
            }
        }

        entries.reverse();
        entries.sort_by(|a, b| b.commit_time.cmp(&a.commit_time));
        Ok(entries)
    }

    /// The newest entry of every identity.
    pub async fn get_rolled_up_entries(
        &self,
        ctx: &SleetContext,
    ) -> CoreResult<Vec<CatalogIndexEntry>> {
        let mut seen = BTreeSet::new();
        Ok(self
            .get_index_entries(ctx)
            .await?
            .into_iter()
            .filter(|entry| seen.insert(entry.identity.clone()))
            .collect())
    }

    /// Identities whose latest commit is an add.
    pub async fn get_existing_packages(&self, ctx: &SleetContext) -> CoreResult<PackageSet> {
        Ok(self
            .get_rolled_up_entries(ctx)
            .await?
            .into_iter()
            .filter(|entry| entry.operation == CatalogOperation::Add)
            .map(|entry| entry.identity)
            .collect())
    }

    pub async fn get_latest_entry(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
    ) -> CoreResult<Option<CatalogIndexEntry>> {
        Ok(self
            .get_index_entries(ctx)
            .await?
            .into_iter()
            .find(|entry| &entry.identity == identity))
    }

    pub async fn exists(&self, ctx: &SleetContext, identity: &PackageIdentity) -> CoreResult<bool> {
        Ok(self
            .get_latest_entry(ctx, identity)
            .await?
            .is_some_and(|entry| entry.operation == CatalogOperation::Add))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        package_set::PackageSets,
        test_utils::{memory_context, package_input, TestPackage},
    };

    fn id(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_remove() {
        let (ctx, _guard) = memory_context().await;
        let (input, _dir) = package_input(&TestPackage::new("PackageA", "1.0.0"));
        let details_id = input.loaded().unwrap().details_id;

        let add = SleetOperations::create(PackageSets::default(), vec![input], vec![]);
        Catalog.apply_operations(&ctx, &add).await.unwrap();

        assert!(Catalog.exists(&ctx, &id("packagea", "1.0.0")).await.unwrap());
        let details: Value = ctx
            .fs
            .get(&paths::catalog_details(&details_id))
            .get_json()
            .await
            .unwrap();
        assert_eq!(details["id"], "PackageA");

        let ctx = ctx.next_commit();
        let remove = SleetOperations::create_delete(
            add.updated_index().clone(),
            vec![id("PackageA", "1.0.0")],
            vec![],
        );
        Catalog.apply_operations(&ctx, &remove).await.unwrap();

        let entries = Catalog.get_index_entries(&ctx).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, CatalogOperation::Remove);
        assert!(!Catalog.exists(&ctx, &id("PackageA", "1.0.0")).await.unwrap());
        assert!(Catalog.get_existing_packages(&ctx).await.unwrap().is_empty());

        let index: Value = ctx.fs.get(CATALOG_INDEX_PATH).get_json().await.unwrap();
        assert!(index.get("nuget:lastCreated").is_some());
        assert!(index.get("nuget:lastDeleted").is_some());
    }

    #[tokio::test]
    async fn test_same_batch_replace_resolves_to_add() {
        let (ctx, _guard) = memory_context().await;
        let (first, _a) = package_input(&TestPackage::new("PackageA", "1.0.0"));
        let add = SleetOperations::create(PackageSets::default(), vec![first], vec![]);
        Catalog.apply_operations(&ctx, &add).await.unwrap();

        let (second, _b) = package_input(&TestPackage::new("PackageA", "1.0.0"));
        let replace = SleetOperations::create(
            add.updated_index().clone(),
            vec![second],
            vec![crate::input::PackageInput::removal(id("PackageA", "1.0.0"), false)],
        );
        Catalog.apply_operations(&ctx, &replace).await.unwrap();

        let rolled_up = Catalog.get_rolled_up_entries(&ctx).await.unwrap();
        assert_eq!(rolled_up.len(), 1);
        assert_eq!(rolled_up[0].operation, CatalogOperation::Add);
        assert_eq!(Catalog.get_index_entries(&ctx).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_full_page_starts_new_page() {
        let (ctx, _guard) = memory_context().await;
        let mut settings = ctx.settings.clone();
        settings.catalog_page_size = 1;
        let ctx = ctx.with_settings(settings);

        let mut sets = PackageSets::default();
        let mut dirs = Vec::new();
        for version in ["1.0.0", "2.0.0"] {
            let (input, dir) = package_input(&TestPackage::new("PackageA", version));
            dirs.push(dir);
            let ops = SleetOperations::create(sets.clone(), vec![input], vec![]);
            Catalog.apply_operations(&ctx, &ops).await.unwrap();
            sets = ops.updated_index().clone();
        }

        let index: CatalogIndexDocument = ctx.fs.get(CATALOG_INDEX_PATH).get_json().await.unwrap();
        assert_eq!(index.count, 2);
        assert!(ctx.fs.get("catalog/page.1.json").exists().await.unwrap());
        assert_eq!(Catalog.get_existing_packages(&ctx).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_fatal() {
        let (ctx, _guard) = memory_context().await;
        Catalog.init(&ctx).await.unwrap();
        let mut index: CatalogIndexDocument =
            ctx.fs.get(CATALOG_INDEX_PATH).get_json().await.unwrap();
        index.items.push(CatalogPageRef::default());
        ctx.fs
            .get(CATALOG_INDEX_PATH)
            .write_json(&index)
            .await
            .unwrap();
        ctx.fs
            .get(&paths::catalog_page(0))
            .write_json(&json!({
                "items": [{
                    "nuget:id": "a",
                    "nuget:version": "1.0.0",
                    "sleet:operation": "rename"
                }]
            }))
            .await
            .unwrap();

        assert!(matches!(
            Catalog.get_index_entries(&ctx).await,
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_catalog_writes_nothing() {
        let (ctx, _guard) = memory_context().await;
        let mut settings = ctx.settings.clone();
        settings.catalog_enabled = false;
        let ctx = ctx.with_settings(settings);

        let (input, _dir) = package_input(&TestPackage::new("PackageA", "1.0.0"));
        let ops = SleetOperations::create(PackageSets::default(), vec![input], vec![]);
        Catalog.apply_operations(&ctx, &ops).await.unwrap();

        assert!(!ctx.fs.get(CATALOG_INDEX_PATH).exists().await.unwrap());
        assert!(Catalog.get_index_entries(&ctx).await.unwrap().is_empty());
    }
}
