//! Derived feed services and the order a batch is applied to them.

use tracing::debug;

use crate::{
    context::SleetContext, identity::PackageIdentity, operations::SleetOperations,
    package_set::PackageSet, settings::FeedSettings, CoreResult,
};

pub mod auto_complete;
pub mod catalog;
pub mod flat_container;
pub mod package_index;
pub mod registrations;
pub mod search;

pub use auto_complete::AutoComplete;
pub use catalog::Catalog;
pub use flat_container::FlatContainer;
pub use package_index::PackageIndex;
pub use registrations::Registrations;
pub use search::Search;

/// What a service can report for validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub can_list_all: bool,
    pub can_list_by_id: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedService {
    Catalog,
    Registrations,
    FlatContainer,
    Symbols,
    AutoComplete,
    Search,
    PackageIndex,
}

impl FeedService {
    pub fn descriptor(&self) -> ServiceDescriptor {
        let (name, can_list_all, can_list_by_id) = match self {
            Self::Catalog => ("Catalog", true, false),
            Self::Registrations => ("Registrations", false, true),
            Self::FlatContainer => ("FlatContainer", false, true),
            Self::Symbols => ("Symbols", false, true),
            Self::AutoComplete => ("AutoComplete", false, false),
            Self::Search => ("Search", true, false),
            Self::PackageIndex => ("PackageIndex", true, true),
        };
        ServiceDescriptor {
            name,
            can_list_all,
            can_list_by_id,
        }
    }

    /// Whether the service tracks symbols packages rather than regular packages.
    pub fn tracks_symbols(&self) -> bool {
        matches!(self, Self::Symbols)
    }

    pub async fn apply_operations(
        &self,
        ctx: &SleetContext,
        operations: &SleetOperations,
    ) -> CoreResult<()> {
        match self {
            Self::Catalog => Catalog.apply_operations(ctx, operations).await,
            Self::Registrations => Registrations.apply_operations(ctx, operations).await,
            Self::FlatContainer => {
                FlatContainer::packages()
                    .apply_operations(ctx, operations)
                    .await
            }
            Self::Symbols => {
                FlatContainer::symbols()
                    .apply_operations(ctx, operations)
                    .await
            }
            Self::AutoComplete => AutoComplete.apply_operations(ctx, operations).await,
            Self::Search => Search.apply_operations(ctx, operations).await,
            Self::PackageIndex => PackageIndex.apply_operations(ctx, operations).await,
        }
    }

    /// Every identity the service holds, for services that can list everything.
    pub async fn get_packages(&self, ctx: &SleetContext) -> CoreResult<Option<PackageSet>> {
        let packages = match self {
            Self::Catalog => Catalog.get_existing_packages(ctx).await?,
            Self::Search => Search.get_packages(ctx).await?,
            Self::PackageIndex => PackageIndex.get_packages(ctx).await?,
            _ => return Ok(None),
        };
        Ok(Some(packages))
    }

    /// Identities of one id, for services keyed by id.
    pub async fn get_packages_by_id(
        &self,
        ctx: &SleetContext,
        id: &str,
    ) -> CoreResult<Option<Vec<PackageIdentity>>> {
        let packages = match self {
            Self::Registrations => Registrations.get_packages_by_id(ctx, id).await?,
            Self::FlatContainer => FlatContainer::packages().get_packages_by_id(ctx, id).await?,
            Self::Symbols => FlatContainer::symbols().get_packages_by_id(ctx, id).await?,
            Self::PackageIndex => PackageIndex.get_packages_by_id(ctx, id).await?,
            _ => return Ok(None),
        };
        Ok(Some(packages))
    }
}

/// Services enabled by `settings`, in the order a batch is applied.
///
/// The package index comes last so a failed batch leaves it untouched.
pub fn feed_services(settings: &FeedSettings) -> Vec<FeedService> {
    let mut services = Vec::with_capacity(7);
    if settings.catalog_enabled {
        services.push(FeedService::Catalog);
    }
    services.push(FeedService::Registrations);
    services.push(FeedService::FlatContainer);
    if settings.symbols_enabled {
        services.push(FeedService::Symbols);
    }
    services.push(FeedService::AutoComplete);
    services.push(FeedService::Search);
    services.push(FeedService::PackageIndex);
    services
}

/// Applies one batch to every enabled service. Nothing is committed here.
pub async fn apply_operations(ctx: &SleetContext, operations: &SleetOperations) -> CoreResult<()> {
    for service in feed_services(&ctx.settings) {
        debug!(service = service.descriptor().name, "applying batch");
        service.apply_operations(ctx, operations).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{apply_batch, memory_context, package_input, TestPackage};

    #[test]
    fn test_feed_services_follow_settings() {
        let services = feed_services(&FeedSettings::default());
        assert_eq!(services.first(), Some(&FeedService::Catalog));
        assert_eq!(services.last(), Some(&FeedService::PackageIndex));
        assert!(!services.contains(&FeedService::Symbols));

        let settings = FeedSettings {
            catalog_enabled: false,
            symbols_enabled: true,
            ..Default::default()
        };
        let services = feed_services(&settings);
        assert!(!services.contains(&FeedService::Catalog));
        assert!(services.contains(&FeedService::Symbols));
    }

    #[tokio::test]
    async fn test_batch_reaches_every_service() {
        let (ctx, _guard) = memory_context().await;
        let (input, _dir) = package_input(&TestPackage::new("PackageA", "1.0.0"));
        let identity = input.identity.clone();

        apply_batch(&ctx, vec![input], vec![]).await;

        for service in feed_services(&ctx.settings) {
            if let Some(packages) = service.get_packages(&ctx).await.unwrap() {
                assert!(packages.contains(&identity), "{service:?}");
            }
            if let Some(packages) = service.get_packages_by_id(&ctx, "packagea").await.unwrap() {
                assert_eq!(packages, vec![identity.clone()], "{service:?}");
            }
        }
        assert_eq!(AutoComplete.get_ids(&ctx).await.unwrap(), vec!["PackageA"]);
    }
}
