//! Package ids and versions.
//!
//! Ids compare case-insensitively. Versions follow the NuGet flavour of SemVer: up to four
//! numeric parts, dot separated prerelease labels and ignored build metadata.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

#[derive(Clone, Debug)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    release: Vec<String>,
    metadata: Option<String>,
    original: String,
}

impl PackageVersion {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidVersion(input.to_string());
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (rest, metadata) = match trimmed.split_once('+') {
            Some((rest, metadata)) if !metadata.is_empty() => (rest, Some(metadata.to_string())),
            Some(_) => return Err(invalid()),
            None => (trimmed, None),
        };

        let (core, release) = match rest.split_once('-') {
            Some((core, release)) => {
                let labels: Vec<String> = release.split('.').map(str::to_string).collect();
                let valid = labels.iter().all(|label| {
                    !label.is_empty()
                        && label
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '-')
                });
                if !valid {
                    return Err(invalid());
                }
                (core, labels)
            }
            None => (rest, Vec::new()),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }
        let mut numbers = [0u64; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            revision: numbers[3],
            release,
            metadata,
            original: trimmed.to_string(),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn release_labels(&self) -> &[String] {
        &self.release
    }

    pub fn is_prerelease(&self) -> bool {
        !self.release.is_empty()
    }

    /// The version as written in the nuspec.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// `major.minor.patch[.revision][-release]`, without build metadata.
    pub fn to_normalized_string(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision > 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        if !self.release.is_empty() {
            out.push('-');
            out.push_str(&self.release.join("."));
        }
        out
    }

    /// Normalized form including build metadata.
    pub fn to_full_string(&self) -> String {
        match &self.metadata {
            Some(metadata) => format!("{}+{metadata}", self.to_normalized_string()),
            None => self.to_normalized_string(),
        }
    }

    /// Lower-cased normalized form used in feed paths.
    pub fn path_segment(&self) -> String {
        self.to_normalized_string().to_lowercase()
    }
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    let a_num = a.parse::<u64>().ok().filter(|_| a.chars().all(|c| c.is_ascii_digit()));
    let b_num = b.parse::<u64>().ok().filter(|_| b.chars().all(|c| c.is_ascii_digit()));
    match (a_num, b_num) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let core = (self.major, self.minor, self.patch, self.revision).cmp(&(
            other.major,
            other.minor,
            other.patch,
            other.revision,
        ));
        if core != Ordering::Equal {
            return core;
        }

        match (self.release.is_empty(), other.release.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                for (a, b) in self.release.iter().zip(&other.release) {
                    let label = compare_labels(a, b);
                    if label != Ordering::Equal {
                        return label;
                    }
                }
                self.release.len().cmp(&other.release.len())
            }
        }
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch, self.revision).hash(state);
        for label in &self.release {
            label.to_lowercase().hash(state);
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_normalized_string())
    }
}

impl FromStr for PackageVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_normalized_string())
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A package id plus version, the key used by every feed service.
#[derive(Clone, Debug)]
pub struct PackageIdentity {
    id: String,
    version: PackageVersion,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Result<Self, CoreError> {
        let id = id.into();
        let valid = !id.trim().is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(CoreError::InvalidPackageId(id));
        }
        Ok(Self { id, version })
    }

    pub fn parse(id: &str, version: &str) -> Result<Self, CoreError> {
        Self::new(id, PackageVersion::parse(version)?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lower_id(&self) -> String {
        self.id.to_lowercase()
    }

    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }

    /// `{id}.{version}`, lower-cased, used for nupkg file names.
    pub fn file_stem(&self) -> String {
        format!("{}.{}", self.lower_id(), self.version.path_segment())
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lower_id()
            .cmp(&other.lower_id())
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lower_id().hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}
