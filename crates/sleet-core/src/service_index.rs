//! The `/index.json` service index clients start from.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{constants::*, context::SleetContext, CoreResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub uri: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceIndex {
    pub version: String,
    pub resources: Vec<ServiceResource>,
    #[serde(rename = "@context", default)]
    pub context: Value,
}

impl ServiceIndex {
    pub fn build(ctx: &SleetContext) -> Self {
        let uri = |path: &str| ctx.fs.get_uri(path).to_string();
        let mut resources = Vec::new();
        let mut add = |path: &str, kinds: &[&str], comment: &str| {
            for kind in kinds {
                resources.push(ServiceResource {
                    uri: uri(path),
                    kind: kind.to_string(),
                    comment: comment.to_string(),
                });
            }
        };

        add(
            SEARCH_PATH,
            &[
                "SearchQueryService",
                "SearchQueryService/3.0.0-beta",
                "SearchQueryService/3.0.0-rc",
            ],
            "Query endpoint of NuGet Search service.",
        );
        add(
            &format!("{REGISTRATION_ROOT}/"),
            &[
                "RegistrationsBaseUrl",
                "RegistrationsBaseUrl/3.0.0-beta",
                "RegistrationsBaseUrl/3.0.0-rc",
            ],
            "Base URL of where NuGet packages are stored, in the format \
             {registration}/{id-lower}/index.json",
        );
        add(
            &format!("{FLAT_CONTAINER_ROOT}/"),
            &["PackageBaseAddress/3.0.0"],
            "Base URL of where NuGet packages are stored, in the format \
             {flatcontainer}/{id-lower}/{version-lower}/{id-lower}.{version-lower}.nupkg",
        );
        add(
            AUTOCOMPLETE_PATH,
            &[
                "SearchAutocompleteService",
                "SearchAutocompleteService/3.0.0-beta",
                "SearchAutocompleteService/3.0.0-rc",
            ],
            "Autocomplete endpoint of NuGet Search service.",
        );
        add(
            PACKAGE_INDEX_PATH,
            &["http://schema.emgarten.com/sleet#PackageIndex/1.0.0"],
            "Sleet package index.",
        );
        if ctx.settings.catalog_enabled {
            add(
                CATALOG_INDEX_PATH,
                &["Catalog/3.0.0"],
                "Index of the package catalog.",
            );
        }
        if ctx.settings.symbols_enabled {
            add(
                &format!("{SYMBOLS_ROOT}/"),
                &["http://schema.emgarten.com/sleet#SymbolsPackageBaseAddress/1.0.0"],
                "Base URL of symbols packages.",
            );
        }

        Self {
            version: "3.0.0".to_string(),
            resources,
            context: json!({
                "@vocab": NUGET_SERVICES_SCHEMA,
                "comment": "http://www.w3.org/2000/01/rdf-schema#comment"
            }),
        }
    }

    pub async fn exists(ctx: &SleetContext) -> CoreResult<bool> {
        Ok(ctx.fs.get(SERVICE_INDEX_PATH).exists().await?)
    }

    pub async fn write(&self, ctx: &SleetContext) -> CoreResult<()> {
        ctx.fs.get(SERVICE_INDEX_PATH).write_json(self).await?;
        Ok(())
    }

    pub fn has_resource(&self, kind: &str) -> bool {
        self.resources.iter().any(|resource| resource.kind == kind)
    }
}
