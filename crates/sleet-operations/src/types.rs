use std::path::PathBuf;

use sleet_core::{validation::ValidationReport, FeedSettings, PackageIdentity};

// ---- Init ----

/// Report returned by [`crate::init::init_feed`].
#[derive(Debug)]
pub struct InitReport {
    /// False when the feed already had a service index and nothing was written.
    pub created: bool,
    pub settings: FeedSettings,
}

// ---- Push ----

/// Options for a push.
#[derive(Clone, Copy, Debug, Default)]
pub struct PushOptions {
    /// Replace versions that already exist, and keep the last of in-batch duplicates.
    pub force: bool,
    /// Leave versions that already exist untouched.
    pub skip_existing: bool,
}

/// Report returned after a push completes.
#[derive(Debug, Default)]
pub struct PushReport {
    pub added: Vec<PushedInfo>,
    pub skipped: Vec<PushedInfo>,
    /// Set when nothing needed to be written.
    pub unchanged: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushedInfo {
    pub identity: PackageIdentity,
    pub is_symbols: bool,
    /// True when an existing version was overwritten.
    pub replaced: bool,
}

// ---- Delete ----

/// Report returned after a delete completes.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<PackageIdentity>,
    pub removed_symbols: Vec<PackageIdentity>,
}

impl DeleteReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.removed_symbols.is_empty()
    }
}

// ---- Validate ----

pub type ValidateReport = ValidationReport;

// ---- Stats ----

/// Package counts of a feed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsReport {
    pub packages: usize,
    pub ids: usize,
    pub symbols_packages: usize,
}

// ---- Prune ----

/// Options for a prune.
#[derive(Clone, Debug, Default)]
pub struct PruneOptions {
    /// Newest stable versions kept per id. `None` keeps every stable version.
    pub stable_versions_to_keep: Option<usize>,
    /// Newest prerelease versions kept per id. `None` keeps every prerelease version.
    pub prerelease_versions_to_keep: Option<usize>,
    /// Restrict pruning to these ids, matched case-insensitively. Empty means every id.
    pub ids: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub pruned: Vec<PackageIdentity>,
    pub dry_run: bool,
}

// ---- Recreate ----

#[derive(Debug, Default)]
pub struct RecreateReport {
    pub packages: usize,
    pub symbols_packages: usize,
}

// ---- Destroy ----

#[derive(Debug)]
pub struct DestroyReport {
    /// False when the feed was already empty.
    pub removed: bool,
}

// ---- Download ----

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: Vec<PathBuf>,
    /// Packages listed in the index whose nupkg was not found.
    pub missing: Vec<PackageIdentity>,
}

// ---- Feed settings ----

/// A change to the settings stored on the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingChange {
    Set { key: String, value: String },
    Unset { key: String },
}

impl SettingChange {
    /// Parses `key:value`.
    pub fn parse_set(input: &str) -> Option<Self> {
        let (key, value) = input.split_once(':')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::Set {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}
