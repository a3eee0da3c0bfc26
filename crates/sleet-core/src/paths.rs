//! Relative locations of every feed document. All paths are lower case.

use uuid::Uuid;

use crate::{constants::*, identity::PackageIdentity};

pub fn catalog_page(index: usize) -> String {
    format!("{CATALOG_ROOT}/page.{index}.json")
}

pub fn catalog_details(details_id: &Uuid) -> String {
    format!("{CATALOG_ROOT}/data/{}.json", details_id.hyphenated())
}

pub fn registration_index(id: &str) -> String {
    format!("{REGISTRATION_ROOT}/{}/index.json", id.to_lowercase())
}

pub fn registration_leaf(identity: &PackageIdentity) -> String {
    format!(
        "{REGISTRATION_ROOT}/{}/{}.json",
        identity.lower_id(),
        identity.version().path_segment()
    )
}

/// Root folder of the nupkg layout for regular or symbols packages.
pub fn package_root(symbols: bool) -> &'static str {
    if symbols {
        SYMBOLS_ROOT
    } else {
        FLAT_CONTAINER_ROOT
    }
}

pub fn package_versions(symbols: bool, id: &str) -> String {
    format!("{}/{}/index.json", package_root(symbols), id.to_lowercase())
}

pub fn package_folder(symbols: bool, identity: &PackageIdentity) -> String {
    format!(
        "{}/{}/{}",
        package_root(symbols),
        identity.lower_id(),
        identity.version().path_segment()
    )
}

pub fn nupkg(symbols: bool, identity: &PackageIdentity) -> String {
    let extension = if symbols { "symbols.nupkg" } else { "nupkg" };
    format!(
        "{}/{}.{extension}",
        package_folder(symbols, identity),
        identity.file_stem()
    )
}

pub fn nuspec(symbols: bool, identity: &PackageIdentity) -> String {
    format!(
        "{}/{}.nuspec",
        package_folder(symbols, identity),
        identity.lower_id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_lower_case() {
        let identity = PackageIdentity::parse("PackageA", "1.0.0-Beta").unwrap();

        assert_eq!(
            registration_leaf(&identity),
            "registration/packagea/1.0.0-beta.json"
        );
        assert_eq!(registration_index("PackageA"), "registration/packagea/index.json");
        assert_eq!(
            nupkg(false, &identity),
            "flatcontainer/packagea/1.0.0-beta/packagea.1.0.0-beta.nupkg"
        );
        assert_eq!(
            nuspec(false, &identity),
            "flatcontainer/packagea/1.0.0-beta/packagea.nuspec"
        );
        assert_eq!(
            nupkg(true, &identity),
            "symbolspackages/packagea/1.0.0-beta/packagea.1.0.0-beta.symbols.nupkg"
        );
        assert_eq!(package_versions(true, "PackageA"), "symbolspackages/packagea/index.json");
        assert_eq!(catalog_page(3), "catalog/page.3.json");
    }
}
