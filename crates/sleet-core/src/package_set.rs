use std::collections::{btree_set, BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::{
    error::CoreError,
    identity::{PackageIdentity, PackageVersion},
    CoreResult,
};

/// Sorted set of package identities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageSet {
    packages: BTreeSet<PackageIdentity>,
}

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the identity was already present.
    pub fn add(&mut self, identity: PackageIdentity) -> bool {
        self.packages.insert(identity)
    }

    /// Returns `false` when the identity was not present.
    pub fn remove(&mut self, identity: &PackageIdentity) -> bool {
        self.packages.remove(identity)
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.packages.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, PackageIdentity> {
        self.packages.iter()
    }

    /// Identities whose id matches `id` case-insensitively, in ascending version order.
    pub fn get_packages_by_id(&self, id: &str) -> Vec<PackageIdentity> {
        self.packages
            .iter()
            .filter(|identity| identity.has_id(id))
            .cloned()
            .collect()
    }

    /// Versions of `id`, ascending.
    pub fn get_versions(&self, id: &str) -> Vec<PackageVersion> {
        self.get_packages_by_id(id)
            .into_iter()
            .map(|identity| identity.version().clone())
            .collect()
    }

    /// Distinct ids keyed by their lower-cased form, keeping the first spelling seen.
    pub fn ids(&self) -> BTreeMap<String, String> {
        let mut ids = BTreeMap::new();
        for identity in &self.packages {
            ids.entry(identity.lower_id())
                .or_insert_with(|| identity.id().to_string());
        }
        ids
    }

    /// `{ id: [versions descending] }` as stored in the package index.
    pub fn to_json(&self) -> Value {
        let mut grouped: BTreeMap<String, (String, Vec<&PackageVersion>)> = BTreeMap::new();
        for identity in &self.packages {
            grouped
                .entry(identity.lower_id())
                .or_insert_with(|| (identity.id().to_string(), Vec::new()))
                .1
                .push(identity.version());
        }

        let mut map = Map::new();
        for (_, (id, mut versions)) in grouped {
            versions.sort_by(|a, b| b.cmp(a));
            let versions = versions
                .into_iter()
                .map(|version| Value::String(version.to_full_string()))
                .collect();
            map.insert(id, Value::Array(versions));
        }
        Value::Object(map)
    }

    pub fn from_json(path: &str, value: &Value) -> CoreResult<Self> {
        let invalid = |node| {
            CoreError::MissingNode {
                path: path.to_string(),
                node,
            }
        };
        let map = value.as_object().ok_or_else(|| invalid("packages"))?;

        let mut set = Self::new();
        for (id, versions) in map {
            let versions = versions.as_array().ok_or_else(|| invalid("versions"))?;
            for version in versions {
                let version = version.as_str().ok_or_else(|| invalid("versions"))?;
                set.add(PackageIdentity::parse(id, version)?);
            }
        }
        Ok(set)
    }
}

impl FromIterator<PackageIdentity> for PackageSet {
    fn from_iter<T: IntoIterator<Item = PackageIdentity>>(iter: T) -> Self {
        Self {
            packages: iter.into_iter().collect(),
        }
    }
}

impl Extend<PackageIdentity> for PackageSet {
    fn extend<T: IntoIterator<Item = PackageIdentity>>(&mut self, iter: T) {
        self.packages.extend(iter);
    }
}

impl<'a> IntoIterator for &'a PackageSet {
    type Item = &'a PackageIdentity;
    type IntoIter = btree_set::Iter<'a, PackageIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

/// The authoritative feed snapshot: regular packages and symbols packages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageSets {
    pub packages: PackageSet,
    pub symbols: PackageSet,
}

impl PackageSets {
    pub fn set(&self, symbols: bool) -> &PackageSet {
        if symbols {
            &self.symbols
        } else {
            &self.packages
        }
    }

    pub fn set_mut(&mut self, symbols: bool) -> &mut PackageSet {
        if symbols {
            &mut self.symbols
        } else {
            &mut self.packages
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.symbols.is_empty()
    }
}
