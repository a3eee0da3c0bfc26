//! The `search/query` aggregate document: one entry per id with at least one version.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    constants::*,
    context::SleetContext,
    details::PackageDetails,
    identity::PackageIdentity,
    operations::SleetOperations,
    package_set::PackageSet,
    paths,
    services::registrations::Registrations,
    CoreResult,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchVersion {
    #[serde(rename = "@id")]
    pub uri: String,
    pub version: String,
    pub downloads: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchEntry {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub authors: Vec<String>,
    pub description: String,
    pub icon_url: String,
    pub id: String,
    pub license_url: String,
    pub project_url: String,
    pub registration: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub title: String,
    pub total_downloads: u64,
    pub version: String,
    pub versions: Vec<SearchVersion>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchDocument {
    pub total_hits: usize,
    pub data: Vec<SearchEntry>,
    #[serde(rename = "@context")]
    pub context: Value,
}

fn search_context(ctx: &SleetContext) -> Value {
    json!({
        "@vocab": NUGET_SCHEMA,
        "@base": ctx.fs.get_uri(&format!("{REGISTRATION_ROOT}/")).to_string()
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Search;

impl Search {
    pub async fn load(&self, ctx: &SleetContext) -> CoreResult<Option<SearchDocument>> {
        Ok(ctx
            .fs
            .get(SEARCH_PATH)
            .get_json_if_exists::<SearchDocument>()
            .await?)
    }

    async fn write(&self, ctx: &SleetContext, data: Vec<SearchEntry>) -> CoreResult<()> {
        let document = SearchDocument {
            total_hits: data.len(),
            data,
            context: search_context(ctx),
        };
        ctx.fs.get(SEARCH_PATH).write_json(&document).await?;
        Ok(())
    }

    /// Writes an empty document when none exists.
    pub async fn init(&self, ctx: &SleetContext) -> CoreResult<()> {
        if self.load(ctx).await?.is_none() {
            self.write(ctx, Vec::new()).await?;
        }
        Ok(())
    }

    /// Rebuilds the entries of every changed id from the updated package set.
    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        let changed = operations.get_changed_ids();
        if changed.is_empty() {
            return Ok(());
        }

        let mut entries: BTreeMap<String, SearchEntry> = self
            .load(ctx)
            .await?
            .unwrap_or_default()
            .data
            .into_iter()
            .map(|entry| (entry.id.to_lowercase(), entry))
            .collect();

        let packages = &operations.updated_index().packages;
        for id in &changed {
            entries.remove(id);

            let versions = packages.get_packages_by_id(id);
            let Some(latest) = versions.iter().max_by(|a, b| a.version().cmp(b.version())) else {
                debug!(id = %id, "removing search entry");
                continue;
            };

            debug!(id = %id, latest = %latest.version(), "rebuilding search entry");
            let details = self.latest_details(ctx, operations, latest).await?;
            entries.insert(
                id.clone(),
                self.create_entry(ctx, latest, details.as_ref(), &versions),
            );
        }

        self.write(ctx, entries.into_values().collect()).await
    }

    async fn latest_details(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
        latest: &PackageIdentity,
    ) -> CoreResult<Option<PackageDetails>> {
        if let Some(input) = operations.find_add(latest, false) {
            return Ok(Some(PackageDetails::from_input(ctx, input)?));
        }
        let details = Registrations.get_package_details(ctx, latest).await?;
        if details.is_none() {
            warn!("no registration found for {latest}, writing a minimal search entry");
        }
        Ok(details)
    }

    fn create_entry(
        &self,
        ctx: &SleetContext,
        latest: &PackageIdentity,
        details: Option<&PackageDetails>,
        versions: &[PackageIdentity],
    ) -> SearchEntry {
        let registration = ctx
            .fs
            .get_uri(&paths::registration_index(latest.id()))
            .to_string();
        let mut sorted = versions.to_vec();
        sorted.sort();

        let versions = sorted
            .iter()
            .map(|identity| {
                SearchVersion {
                    uri: ctx
                        .fs
                        .get_uri(&paths::registration_leaf(identity))
                        .to_string(),
                    version: identity.version().to_full_string(),
                    downloads: 0,
                }
            })
            .collect();

        let mut entry = SearchEntry {
            uri: registration.clone(),
            kind: "Package".to_string(),
            id: latest.id().to_string(),
            registration,
            version: latest.version().to_full_string(),
            versions,
            ..Default::default()
        };

        if let Some(details) = details {
            entry.id = details.id.clone();
            entry.authors = details
                .authors
                .split(',')
                .map(str::trim)
                .filter(|author| !author.is_empty())
                .map(str::to_string)
                .collect();
            entry.description = details.description.clone();
            entry.icon_url = details.icon_url.clone();
            entry.license_url = details.license_url.clone();
            entry.project_url = details.project_url.clone();
            entry.summary = details.summary.clone();
            entry.tags = details.tags.clone();
            entry.title = details.title.clone();
        }
        entry
    }

    /// Every id and version listed in the document.
    pub async fn get_packages(&self, ctx: &SleetContext) -> CoreResult<PackageSet> {
        let Some(document) = self.load(ctx).await? else {
            return Ok(PackageSet::new());
        };

        let mut packages = PackageSet::new();
        for entry in &document.data {
            for version in &entry.versions {
                packages.add(PackageIdentity::parse(&entry.id, &version.version)?);
            }
        }
        Ok(packages)
    }

    pub async fn get_entry(&self, ctx: &SleetContext, id: &str) -> CoreResult<Option<SearchEntry>> {
        Ok(self.load(ctx).await?.and_then(|document| {
            document
                .data
                .into_iter()
                .find(|entry| entry.id.eq_ignore_ascii_case(id))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        package_set::PackageSets,
        test_utils::{memory_context, package_input, TestPackage},
    };

    fn id(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    #[tokio::test]
    async fn test_latest_metadata_and_all_versions() {
        let (ctx, _guard) = memory_context().await;
        let (old, _a) =
            package_input(&TestPackage::new("PackageA", "1.0.0").with_description("old"));
        let ops = SleetOperations::create(PackageSets::default(), vec![old], vec![]);
        Registrations.apply_operations(&ctx, &ops).await.unwrap();
        Search.apply_operations(&ctx, &ops).await.unwrap();

        let (new, _b) =
            package_input(&TestPackage::new("PackageA", "2.0.0").with_description("new"));
        let ops = SleetOperations::create(ops.updated_index().clone(), vec![new], vec![]);
        Registrations.apply_operations(&ctx, &ops).await.unwrap();
        Search.apply_operations(&ctx, &ops).await.unwrap();

        let document = Search.load(&ctx).await.unwrap().unwrap();
        assert_eq!(document.total_hits, 1);
        let entry = &document.data[0];
        assert_eq!(entry.version, "2.0.0");
        assert_eq!(entry.description, "new");
        let versions: Vec<&str> = entry.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
        assert_eq!(
            entry.versions[0].uri,
            "https://example.com/feed/registration/packagea/1.0.0.json"
        );
    }

    #[tokio::test]
    async fn test_removed_latest_falls_back_to_registration() {
        let (ctx, _guard) = memory_context().await;
        let (a, _a) =
            package_input(&TestPackage::new("PackageA", "1.0.0").with_description("one"));
        let (b, _b) =
            package_input(&TestPackage::new("PackageA", "2.0.0").with_description("two"));
        let ops = SleetOperations::create(PackageSets::default(), vec![a, b], vec![]);
        Registrations.apply_operations(&ctx, &ops).await.unwrap();
        Search.apply_operations(&ctx, &ops).await.unwrap();

        let remove = SleetOperations::create_delete(
            ops.updated_index().clone(),
            vec![id("PackageA", "2.0.0")],
            vec![],
        );
        Registrations.apply_operations(&ctx, &remove).await.unwrap();
        Search.apply_operations(&ctx, &remove).await.unwrap();

        let entry = Search.get_entry(&ctx, "packagea").await.unwrap().unwrap();
        assert_eq!(entry.version, "1.0.0");
        assert_eq!(entry.description, "one");
        assert_eq!(entry.versions.len(), 1);
    }

    #[tokio::test]
    async fn test_last_version_removed_drops_entry() {
        let (ctx, _guard) = memory_context().await;
        let (a, _a) = package_input(&TestPackage::new("PackageA", "1.0.0"));
        let (b, _b) = package_input(&TestPackage::new("PackageB", "1.0.0"));
        let ops = SleetOperations::create(PackageSets::default(), vec![a, b], vec![]);
        Search.apply_operations(&ctx, &ops).await.unwrap();

        let remove = SleetOperations::create_delete(
            ops.updated_index().clone(),
            vec![id("PackageA", "1.0.0")],
            vec![],
        );
        Search.apply_operations(&ctx, &remove).await.unwrap();

        let packages = Search.get_packages(&ctx).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert!(packages.contains(&id("PackageB", "1.0.0")));
        assert!(Search.get_entry(&ctx, "PackageA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_registration_writes_minimal_entry() {
        let (ctx, _guard) = memory_context().await;
        let mut original = PackageSets::default();
        original.packages.add(id("PackageA", "1.0.0"));
        original.packages.add(id("PackageA", "2.0.0"));

        let ops = SleetOperations::create_delete(original, vec![id("PackageA", "2.0.0")], vec![]);
        Search.apply_operations(&ctx, &ops).await.unwrap();

        let entry = Search.get_entry(&ctx, "PackageA").await.unwrap().unwrap();
        assert_eq!(entry.version, "1.0.0");
        assert!(entry.description.is_empty());
    }
}
