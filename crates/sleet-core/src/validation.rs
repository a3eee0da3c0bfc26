//! Cross-service consistency check against the package index.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::{
    context::SleetContext,
    identity::PackageIdentity,
    package_set::PackageSet,
    services::{feed_services, FeedService, PackageIndex},
    CoreResult,
};

/// Differences between one service and the package index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceReport {
    pub service: &'static str,
    /// In the package index but not in the service.
    pub missing: Vec<PackageIdentity>,
    /// In the service but not in the package index.
    pub extra: Vec<PackageIdentity>,
}

impl ServiceReport {
    fn compare(service: &'static str, expected: &PackageSet, actual: &PackageSet) -> Self {
        let expected: BTreeSet<&PackageIdentity> = expected.iter().collect();
        let actual: BTreeSet<&PackageIdentity> = actual.iter().collect();
        Self {
            service,
            missing: expected.difference(&actual).map(|p| (*p).clone()).collect(),
            extra: actual.difference(&expected).map(|p| (*p).clone()).collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub services: Vec<ServiceReport>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.services.iter().all(ServiceReport::is_valid)
    }

    pub fn get(&self, service: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|report| report.service == service)
    }
}

/// Compares every listing service with the package index.
pub async fn validate_feed(ctx: &SleetContext) -> CoreResult<ValidationReport> {
    let index = PackageIndex.get_package_sets(ctx).await?;
    let mut report = ValidationReport::default();

    for service in feed_services(&ctx.settings) {
        if service == FeedService::PackageIndex {
            continue;
        }
        let descriptor = service.descriptor();
        let expected = index.set(service.tracks_symbols());

        let actual = if let Some(packages) = service.get_packages(ctx).await? {
            packages
        } else if descriptor.can_list_by_id {
            let mut packages = PackageSet::new();
            for id in expected.ids().keys() {
                if let Some(found) = service.get_packages_by_id(ctx, id).await? {
                    packages.extend(found);
                }
            }
            packages
        } else {
            debug!(service = descriptor.name, "service cannot list packages, skipping");
            continue;
        };

        info!("Validating {}", descriptor.name);
        let service_report = ServiceReport::compare(descriptor.name, expected, &actual);
        for identity in &service_report.missing {
            warn!("{} is missing {identity}", descriptor.name);
        }
        for identity in &service_report.extra {
            warn!("{} has extra package {identity}", descriptor.name);
        }
        report.services.push(service_report);
    }

    Ok(report)
}
