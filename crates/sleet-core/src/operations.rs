use std::collections::BTreeSet;

use tracing::trace;

use crate::{identity::PackageIdentity, input::PackageInput, package_set::PackageSets};

/// The before and after state of the feed for one batch of adds and removes.
///
/// Built once per command and shared read-only by every service.
#[derive(Clone, Debug)]
pub struct SleetOperations {
    to_add: Vec<PackageInput>,
    to_remove: Vec<PackageInput>,
    original_index: PackageSets,
    updated_index: PackageSets,
}

impl SleetOperations {
    /// Applies every removal, then every add, to a copy of `original_index`.
    pub fn create(
        original_index: PackageSets,
        mut to_add: Vec<PackageInput>,
        mut to_remove: Vec<PackageInput>,
    ) -> Self {
        to_add.sort();
        to_remove.sort();

        let mut updated_index = original_index.clone();
        for input in &to_remove {
            updated_index
                .set_mut(input.is_symbols)
                .remove(&input.identity);
        }
        for input in &to_add {
            updated_index
                .set_mut(input.is_symbols)
                .add(input.identity.clone());
        }

        trace!(
            adds = to_add.len(),
            removes = to_remove.len(),
            "created batch operations"
        );

        Self {
            to_add,
            to_remove,
            original_index,
            updated_index,
        }
    }

    /// A delete-only batch.
    pub fn create_delete(
        original_index: PackageSets,
        packages: impl IntoIterator<Item = PackageIdentity>,
        symbols: impl IntoIterator<Item = PackageIdentity>,
    ) -> Self {
        let to_remove = packages
            .into_iter()
            .map(|identity| PackageInput::removal(identity, false))
            .chain(
                symbols
                    .into_iter()
                    .map(|identity| PackageInput::removal(identity, true)),
            )
            .collect();
        Self::create(original_index, Vec::new(), to_remove)
    }

    pub fn to_add(&self) -> &[PackageInput] {
        &self.to_add
    }

    pub fn to_remove(&self) -> &[PackageInput] {
        &self.to_remove
    }

    /// Adds of regular or symbols packages.
    pub fn adds(&self, symbols: bool) -> impl Iterator<Item = &PackageInput> {
        self.to_add
            .iter()
            .filter(move |input| input.is_symbols == symbols)
    }

    /// Removals of regular or symbols packages.
    pub fn removes(&self, symbols: bool) -> impl Iterator<Item = &PackageInput> {
        self.to_remove
            .iter()
            .filter(move |input| input.is_symbols == symbols)
    }

    pub fn original_index(&self) -> &PackageSets {
        &self.original_index
    }

    pub fn updated_index(&self) -> &PackageSets {
        &self.updated_index
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// The added input for `identity`, if it is part of this batch.
    pub fn find_add(&self, identity: &PackageIdentity, symbols: bool) -> Option<&PackageInput> {
        self.adds(symbols).find(|input| &input.identity == identity)
    }

    /// Lower-cased ids of regular packages whose version set changed, plus every added id.
    pub fn get_changed_ids(&self) -> BTreeSet<String> {
        changed_ids(
            &self.original_index,
            &self.updated_index,
            self.adds(false),
            false,
        )
    }

    /// Same as [`SleetOperations::get_changed_ids`] for symbols packages.
    pub fn get_changed_symbols_ids(&self) -> BTreeSet<String> {
        changed_ids(
            &self.original_index,
            &self.updated_index,
            self.adds(true),
            true,
        )
    }
}

fn changed_ids<'a>(
    original: &PackageSets,
    updated: &PackageSets,
    adds: impl Iterator<Item = &'a PackageInput>,
    symbols: bool,
) -> BTreeSet<String> {
    let before = original.set(symbols);
    let after = updated.set(symbols);

    let mut all_ids: BTreeSet<String> = before.ids().into_keys().collect();
    all_ids.extend(after.ids().into_keys());

    let mut changed: BTreeSet<String> = all_ids
        .into_iter()
        .filter(|id| before.get_versions(id) != after.get_versions(id))
        .collect();
    changed.extend(adds.map(|input| input.identity.lower_id()));
    changed
}
