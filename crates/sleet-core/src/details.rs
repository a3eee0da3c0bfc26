//! Package details documents: the permanent per-package metadata written to the catalog
//! and embedded in registrations and search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    constants::*, context::SleetContext, identity::PackageIdentity, input::PackageInput, paths,
    CoreResult,
};

pub fn catalog_context() -> Value {
    json!({
        "@vocab": NUGET_SCHEMA,
        "catalog": NUGET_CATALOG_SCHEMA,
        "sleet": SLEET_SCHEMA,
        "xsd": "http://www.w3.org/2001/XMLSchema#",
        "commitTimeStamp": { "@id": "catalog:commitTimeStamp", "@type": "xsd:dateTime" },
        "commitId": { "@id": "catalog:commitId" },
        "count": { "@id": "catalog:count" },
        "items": { "@id": "catalog:item", "@container": "@set" },
        "parent": { "@id": "catalog:parent", "@type": "@id" },
        "dependencyGroups": { "@id": "dependencyGroup", "@container": "@set" },
        "dependencies": { "@id": "dependency", "@container": "@set" },
        "packageEntries": { "@id": "packageEntry", "@container": "@set" },
        "tags": { "@id": "tag", "@container": "@set" },
        "published": { "@type": "xsd:dateTime" },
        "created": { "@type": "xsd:dateTime" },
        "lastEdited": { "@type": "xsd:dateTime" }
    })
}

/// Normalizes a nuspec dependency version into an interval.
pub fn normalize_range(range: &str) -> String {
    let range = range.trim();
    if range.is_empty() {
        "(, )".to_string()
    } else if range.starts_with('[') || range.starts_with('(') {
        range.to_string()
    } else {
        format!("[{range}, )")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageDependency {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub id: String,
    pub range: String,
    pub registration: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyGroup {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageDependency>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageEntry {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub compressed_length: u64,
    pub full_name: String,
    pub length: u64,
    pub name: String,
}

/// Full metadata of one package version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageDetails {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: Vec<String>,
    pub authors: String,
    #[serde(rename = "catalog:commitId")]
    pub commit_id: String,
    #[serde(rename = "catalog:commitTimeStamp")]
    pub commit_time_stamp: DateTime<Utc>,
    pub copyright: String,
    pub created: DateTime<Utc>,
    pub dependency_groups: Vec<DependencyGroup>,
    pub description: String,
    pub icon_url: String,
    pub id: String,
    pub is_prerelease: bool,
    pub language: String,
    pub last_edited: DateTime<Utc>,
    pub license_url: String,
    pub listed: bool,
    pub min_client_version: String,
    pub owners: String,
    pub package_content: String,
    pub package_entries: Vec<PackageEntry>,
    pub package_hash: String,
    pub package_hash_algorithm: String,
    pub package_size: u64,
    pub project_url: String,
    pub published: DateTime<Utc>,
    pub release_notes: String,
    pub require_license_acceptance: bool,
    pub summary: String,
    pub tags: Vec<String>,
    pub title: String,
    pub verbatim_version: String,
    pub version: String,
}

/// Where the details document of `input` lives.
///
/// With the catalog disabled the registration leaf doubles as the permalink.
pub fn details_uri(ctx: &SleetContext, identity: &PackageIdentity, details_id: &Uuid) -> String {
    if ctx.settings.catalog_enabled {
        ctx.fs.get_uri(&paths::catalog_details(details_id)).to_string()
    } else {
        format!(
            "{}#catalogentry",
            ctx.fs.get_uri(&paths::registration_leaf(identity))
        )
    }
}

impl PackageDetails {
    pub fn from_input(ctx: &SleetContext, input: &PackageInput) -> CoreResult<Self> {
        let loaded = input.loaded()?;
        let nuspec = &loaded.nuspec;
        let identity = &input.identity;
        let uri = details_uri(ctx, identity, &loaded.details_id);

        let dependency_groups = nuspec
            .dependency_groups
            .iter()
            .map(|group| {
                let framework = group.target_framework.clone();
                let group_uri = format!(
                    "{uri}#dependencygroup/{}",
                    framework.as_deref().unwrap_or_default().to_lowercase()
                );
                let dependencies = group
                    .dependencies
                    .iter()
                    .map(|dependency| {
                        PackageDependency {
                            uri: format!("{group_uri}/{}", dependency.id.to_lowercase()),
                            kind: "PackageDependency".to_string(),
                            id: dependency.id.clone(),
                            range: normalize_range(&dependency.range),
                            registration: ctx
                                .fs
                                .get_uri(&paths::registration_index(&dependency.id))
                                .to_string(),
                        }
                    })
                    .collect();
                DependencyGroup {
                    uri: group_uri,
                    kind: "PackageDependencyGroup".to_string(),
                    target_framework: framework,
                    dependencies,
                }
            })
            .collect();

        let package_entries = loaded
            .files
            .iter()
            .map(|file| {
                PackageEntry {
                    uri: format!("{uri}#{}", file.full_name),
                    kind: "PackageEntry".to_string(),
                    compressed_length: file.compressed_length,
                    full_name: file.full_name.clone(),
                    length: file.length,
                    name: file
                        .full_name
                        .rsplit('/')
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                }
            })
            .collect();

        Ok(Self {
            uri,
            kind: vec!["PackageDetails".to_string(), "catalog:Permalink".to_string()],
            authors: nuspec.authors.clone(),
            commit_id: ctx.commit_id_string(),
            commit_time_stamp: ctx.now,
            copyright: nuspec.copyright.clone(),
            created: ctx.now,
            dependency_groups,
            description: nuspec.description.clone(),
            icon_url: nuspec.icon_url.clone(),
            id: identity.id().to_string(),
            is_prerelease: identity.version().is_prerelease(),
            language: nuspec.language.clone(),
            last_edited: ctx.now,
            license_url: nuspec.license_url.clone(),
            listed: true,
            min_client_version: nuspec.min_client_version.clone(),
            owners: nuspec.owners.clone(),
            package_content: ctx
                .fs
                .get_uri(&paths::nupkg(input.is_symbols, identity))
                .to_string(),
            package_entries,
            package_hash: loaded.hash.clone(),
            package_hash_algorithm: loaded.hash_algorithm.to_string(),
            package_size: loaded.size,
            project_url: nuspec.project_url.clone(),
            published: ctx.now,
            release_notes: nuspec.release_notes.clone(),
            require_license_acceptance: nuspec.require_license_acceptance,
            summary: nuspec.summary.clone(),
            tags: nuspec.tag_list(),
            title: nuspec.title.clone(),
            verbatim_version: identity.version().original().to_string(),
            version: identity.version().to_full_string(),
        })
    }
}

/// Tombstone written to the catalog when a package is removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageDelete {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: Vec<String>,
    #[serde(rename = "catalog:commitId")]
    pub commit_id: String,
    #[serde(rename = "catalog:commitTimeStamp")]
    pub commit_time_stamp: DateTime<Utc>,
    pub id: String,
    pub original_id: String,
    pub published: DateTime<Utc>,
    pub version: String,
}

impl PackageDelete {
    pub fn new(ctx: &SleetContext, identity: &PackageIdentity, uri: String) -> Self {
        Self {
            uri,
            kind: vec!["PackageDelete".to_string(), "catalog:Permalink".to_string()],
            commit_id: ctx.commit_id_string(),
            commit_time_stamp: ctx.now,
            id: identity.id().to_string(),
            original_id: identity.id().to_string(),
            published: ctx.now,
            version: identity.version().to_normalized_string(),
        }
    }
}
