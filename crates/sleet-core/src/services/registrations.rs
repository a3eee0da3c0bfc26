//! Per-id registration indexes under `registration/{id}/`.
//!
//! Every id keeps all of its versions in a single page embedded in `index.json`. Each version
//! also gets a standalone `{version}.json` blob carrying the full details document.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    constants::*,
    context::SleetContext,
    details::{DependencyGroup, PackageDetails},
    identity::{PackageIdentity, PackageVersion},
    input::PackageInput,
    operations::SleetOperations,
    paths, CoreResult,
};

pub fn registration_context() -> Value {
    json!({
        "@vocab": NUGET_SCHEMA,
        "catalog": NUGET_CATALOG_SCHEMA,
        "xsd": "http://www.w3.org/2001/XMLSchema#",
        "items": { "@id": "catalog:item", "@container": "@set" },
        "commitTimeStamp": { "@id": "catalog:commitTimeStamp", "@type": "xsd:dateTime" },
        "commitId": { "@id": "catalog:commitId" },
        "count": { "@id": "catalog:count" },
        "parent": { "@id": "catalog:parent", "@type": "@id" },
        "tags": { "@container": "@set", "@id": "tag" },
        "packageTargetFrameworks": { "@container": "@set", "@id": "packageTargetFramework" },
        "dependencyGroups": { "@container": "@set", "@id": "dependencyGroup" },
        "dependencies": { "@container": "@set", "@id": "dependency" },
        "packageContent": { "@type": "@id" },
        "published": { "@type": "xsd:dateTime" },
        "registration": { "@type": "@id" }
    })
}

/// The subset of [`PackageDetails`] embedded in registration leaves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEntry {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub authors: String,
    pub dependency_groups: Vec<DependencyGroup>,
    pub description: String,
    pub icon_url: String,
    pub id: String,
    pub language: String,
    pub license_url: String,
    pub listed: bool,
    pub min_client_version: String,
    pub package_content: String,
    pub project_url: String,
    pub published: DateTime<Utc>,
    pub require_license_acceptance: bool,
    pub summary: String,
    pub tags: Vec<String>,
    pub title: String,
    pub version: String,
}

impl From<&PackageDetails> for CatalogEntry {
    fn from(details: &PackageDetails) -> Self {
        Self {
            uri: details.uri.clone(),
            kind: "PackageDetails".to_string(),
            authors: details.authors.clone(),
            dependency_groups: details.dependency_groups.clone(),
            description: details.description.clone(),
            icon_url: details.icon_url.clone(),
            id: details.id.clone(),
            language: details.language.clone(),
            license_url: details.license_url.clone(),
            listed: details.listed,
            min_client_version: details.min_client_version.clone(),
            package_content: details.package_content.clone(),
            project_url: details.project_url.clone(),
            published: details.published,
            require_license_acceptance: details.require_license_acceptance,
            summary: details.summary.clone(),
            tags: details.tags.clone(),
            title: details.title.clone(),
            version: details.version.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationLeaf {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    pub catalog_entry: CatalogEntry,
    pub package_content: String,
    pub registration: String,
}

impl RegistrationLeaf {
    fn identity(&self) -> CoreResult<PackageIdentity> {
        PackageIdentity::parse(&self.catalog_entry.id, &self.catalog_entry.version)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationPage {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    pub count: usize,
    pub items: Vec<RegistrationLeaf>,
    pub lower: String,
    pub parent: String,
    pub upper: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationIndex {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: Vec<String>,
    pub commit_id: String,
    pub commit_time_stamp: DateTime<Utc>,
    pub count: usize,
    pub items: Vec<RegistrationPage>,
    #[serde(rename = "@context")]
    pub context: Value,
}

impl RegistrationIndex {
    fn into_leaves(self) -> Vec<RegistrationLeaf> {
        self.items.into_iter().flat_map(|page| page.items).collect()
    }
}

/// Standalone per-version document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageBlob {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: Vec<String>,
    pub catalog_entry: String,
    pub listed: bool,
    pub package_content: String,
    pub published: DateTime<Utc>,
    pub registration: String,
    #[serde(rename = "sleet:catalogEntry")]
    pub details: PackageDetails,
    #[serde(rename = "@context")]
    pub context: Value,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Registrations;

impl Registrations {
    async fn load_leaves(&self, ctx: &SleetContext, id: &str) -> CoreResult<Vec<RegistrationLeaf>> {
        Ok(ctx
            .fs
            .get(&paths::registration_index(id))
            .get_json_if_exists::<RegistrationIndex>()
            .await?
            .map(RegistrationIndex::into_leaves)
            .unwrap_or_default())
    }

    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        let mut by_id: BTreeMap<String, (Vec<&PackageInput>, Vec<&PackageInput>)> =
            BTreeMap::new();
        for input in operations.removes(false) {
            by_id.entry(input.identity.lower_id()).or_default().0.push(input);
        }
        for input in operations.adds(false) {
            by_id.entry(input.identity.lower_id()).or_default().1.push(input);
        }

        try_join_all(
            by_id
                .iter()
                .map(|(id, (removes, adds))| self.update_id(ctx, id, removes, adds)),
        )
        .await?;
        Ok(())
    }

    async fn update_id(
        &self,
        ctx: &SleetContext,
        id: &str,
        removes: &[&PackageInput],
        adds: &[&PackageInput],
    ) -> CoreResult<()> {
        let leaves = self.load_leaves(ctx, id).await?;

        let removed: BTreeSet<&PackageIdentity> =
            removes.iter().map(|input| &input.identity).collect();
        let mut kept = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            if removed.contains(&leaf.identity()?) {
                continue;
            }
            kept.push(leaf);
        }
        for input in removes {
            debug!(package = %input.identity, "removing registration");
            ctx.fs
                .get(&paths::registration_leaf(&input.identity))
                .delete()
                .await?;
        }

        for input in adds {
            let identity = &input.identity;
            let mut duplicate = false;
            let mut retained = Vec::with_capacity(kept.len());
            for leaf in kept {
                if &leaf.identity()? == identity {
                    duplicate = true;
                } else {
                    retained.push(leaf);
                }
            }
            kept = retained;
            if duplicate {
                warn!("replacing existing registration for {identity}");
            }

            let details = PackageDetails::from_input(ctx, input)?;
            kept.push(self.create_leaf(ctx, identity, &details));
            self.write_blob(ctx, identity, details).await?;
        }

        let index_path = paths::registration_index(id);
        if kept.is_empty() {
            debug!(id, "registration index is empty, deleting it");
            ctx.fs.get(&index_path).delete().await?;
            return Ok(());
        }

        let mut sorted = Vec::with_capacity(kept.len());
        for leaf in kept {
            sorted.push((leaf.identity()?.version().clone(), leaf));
        }
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let index = self.create_index(ctx, id, sorted);
        ctx.fs.get(&index_path).write_json(&index).await?;
        Ok(())
    }

    fn create_leaf(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
        details: &PackageDetails,
    ) -> RegistrationLeaf {
        RegistrationLeaf {
            uri: ctx.fs.get_uri(&paths::registration_leaf(identity)).to_string(),
            kind: "Package".to_string(),
            commit_id: ctx.commit_id_string(),
            commit_time_stamp: ctx.now,
            catalog_entry: CatalogEntry::from(details),
            package_content: details.package_content.clone(),
            registration: ctx
                .fs
                .get_uri(&paths::registration_index(identity.id()))
                .to_string(),
        }
    }

    fn create_index(
        &self,
        ctx: &SleetContext,
        id: &str,
        leaves: Vec<(PackageVersion, RegistrationLeaf)>,
    ) -> RegistrationIndex {
        let index_uri = ctx.fs.get_uri(&paths::registration_index(id)).to_string();
        let bound = |version: Option<&PackageVersion>| {
            version
                .map(PackageVersion::to_normalized_string)
                .unwrap_or_default()
                .to_lowercase()
        };
        let lower = bound(leaves.first().map(|(version, _)| version));
        let upper = bound(leaves.last().map(|(version, _)| version));
        let items: Vec<RegistrationLeaf> = leaves.into_iter().map(|(_, leaf)| leaf).collect();

        RegistrationIndex {
            uri: index_uri.clone(),
            kind: vec![
                "catalog:CatalogRoot".to_string(),
                "PackageRegistration".to_string(),
                "catalog:Permalink".to_string(),
            ],
            commit_id: ctx.commit_id_string(),
            commit_time_stamp: ctx.now,
            count: 1,
            items: vec![RegistrationPage {
                uri: format!("{index_uri}#page/{lower}/{upper}"),
                kind: "catalog:CatalogPage".to_string(),
                commit_id: ctx.commit_id_string(),
                commit_time_stamp: ctx.now,
                count: items.len(),
                items,
                lower,
                parent: index_uri,
                upper,
            }],
            context: registration_context(),
        }
    }

    async fn write_blob(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
        details: PackageDetails,
    ) -> CoreResult<()> {
        let path = paths::registration_leaf(identity);
        let blob = PackageBlob {
            uri: ctx.fs.get_uri(&path).to_string(),
            kind: vec![
                "Package".to_string(),
                format!("{NUGET_CATALOG_SCHEMA}Permalink"),
            ],
            catalog_entry: details.uri.clone(),
            listed: details.listed,
            package_content: details.package_content.clone(),
            published: details.published,
            registration: ctx
                .fs
                .get_uri(&paths::registration_index(identity.id()))
                .to_string(),
            details,
            context: registration_context(),
        };
        ctx.fs.get(&path).write_json(&blob).await?;
        Ok(())
    }

    /// Versions listed in the registration index of `id`.
    pub async fn get_packages_by_id(
        &self,
        ctx: &SleetContext,
        id: &str,
    ) -> CoreResult<Vec<PackageIdentity>> {
        let mut identities = self
            .load_leaves(ctx, id)
            .await?
            .iter()
            .map(RegistrationLeaf::identity)
            .collect::<CoreResult<Vec<_>>>()?;
        identities.sort();
        Ok(identities)
    }

    /// The full details document embedded in the package blob.
    pub async fn get_package_details(
        &self,
        ctx: &SleetContext,
        identity: &PackageIdentity,
    ) -> CoreResult<Option<PackageDetails>> {
        Ok(ctx
            .fs
            .get(&paths::registration_leaf(identity))
            .get_json_if_exists::<PackageBlob>()
            .await?
            .map(|blob| blob.details))
    }
}
