//! Package files going into, or coming out of, a feed.

use std::{
    cmp::Ordering,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use sleet_utils::{
    fs::collect_files,
    hash::{sha512_base64, HASH_ALGORITHM},
};
use tokio::sync::Semaphore;
use tracing::{debug, trace};
use uuid::Uuid;
use zip::ZipArchive;

use crate::{
    error::{CoreError, ErrorContext},
    identity::{PackageIdentity, PackageVersion},
    nuspec::Nuspec,
    CoreResult,
};

pub const NUPKG_EXTENSION: &str = ".nupkg";
pub const SYMBOLS_NUPKG_EXTENSION: &str = ".symbols.nupkg";

/// One entry of the nupkg archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageFileEntry {
    pub full_name: String,
    pub length: u64,
    pub compressed_length: u64,
}

/// Everything read from a nupkg on disk.
#[derive(Clone, Debug)]
pub struct LoadedPackage {
    pub path: PathBuf,
    pub nuspec: Nuspec,
    pub nuspec_bytes: Vec<u8>,
    pub hash: String,
    pub hash_algorithm: &'static str,
    pub size: u64,
    pub files: Vec<PackageFileEntry>,
    /// Name of the permanent details document written for this package.
    pub details_id: Uuid,
}

/// A package being added to or removed from a feed.
///
/// Removals carry no content. Inputs order by identity, with the symbols variant after the
/// regular package.
#[derive(Clone, Debug)]
pub struct PackageInput {
    pub identity: PackageIdentity,
    pub is_symbols: bool,
    pub package: Option<Arc<LoadedPackage>>,
}

impl PackageInput {
    /// A content-less input, used for deletes.
    pub fn removal(identity: PackageIdentity, is_symbols: bool) -> Self {
        Self {
            identity,
            is_symbols,
            package: None,
        }
    }

    pub fn is_symbols_file(path: &Path) -> bool {
        path.file_name()
            .map(|name| {
                name.to_string_lossy()
                    .to_ascii_lowercase()
                    .ends_with(SYMBOLS_NUPKG_EXTENSION)
            })
            .unwrap_or(false)
    }

    /// Reads a nupkg: nuspec, content hash and file list.
    pub fn load(path: &Path) -> CoreResult<Self> {
        trace!("reading package {}", path.display());
        let bytes =
            std::fs::read(path).with_context(|| format!("reading package {}", path.display()))?;
        let size = bytes.len() as u64;
        let hash = sha512_base64(&bytes);

        let zip_error = |source| {
            CoreError::InvalidPackage {
                path: path.to_path_buf(),
                source,
            }
        };
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

        let mut files = Vec::with_capacity(archive.len());
        let mut nuspec_index = None;
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if !name.contains('/') && name.to_ascii_lowercase().ends_with(".nuspec") {
                nuspec_index.get_or_insert(i);
            }
            files.push(PackageFileEntry {
                full_name: name,
                length: entry.size(),
                compressed_length: entry.compressed_size(),
            });
        }

        let nuspec_index =
            nuspec_index.ok_or_else(|| CoreError::MissingNuspec(path.to_path_buf()))?;
        let mut nuspec_bytes = Vec::new();
        archive
            .by_index(nuspec_index)
            .map_err(zip_error)?
            .read_to_end(&mut nuspec_bytes)
            .with_context(|| format!("reading nuspec from {}", path.display()))?;

        let nuspec = Nuspec::parse(&nuspec_bytes, path)?;
        let version = PackageVersion::parse(&nuspec.version)?;
        let identity = PackageIdentity::new(nuspec.id.clone(), version)?;

        debug!(
            id = identity.id(),
            version = %identity.version(),
            size,
            "loaded package {}",
            path.display()
        );

        Ok(Self {
            identity,
            is_symbols: Self::is_symbols_file(path),
            package: Some(Arc::new(LoadedPackage {
                path: path.to_path_buf(),
                nuspec,
                nuspec_bytes,
                hash,
                hash_algorithm: HASH_ALGORITHM,
                size,
                files,
                details_id: Uuid::new_v4(),
            })),
        })
    }

    pub fn loaded(&self) -> CoreResult<&LoadedPackage> {
        self.package
            .as_deref()
            .ok_or_else(|| CoreError::MissingPackageContent(self.identity.to_string()))
    }
}

impl Ord for PackageInput {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity
            .cmp(&other.identity)
            .then_with(|| self.is_symbols.cmp(&other.is_symbols))
    }
}

impl PartialOrd for PackageInput {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageInput {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageInput {}

/// Expands files and directories into the nupkg files they contain, sorted and deduplicated.
pub fn find_packages(paths: &[PathBuf]) -> CoreResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(CoreError::NoPackages(path.display().to_string()));
        }
        found.extend(collect_files(path, NUPKG_EXTENSION)?);
    }
    found.sort();
    found.dedup();

    if found.is_empty() {
        let joined = paths
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CoreError::NoPackages(joined));
    }
    Ok(found)
}

/// Loads every package under `paths` using at most `worker_threads` readers at a time.
pub async fn load_inputs(
    paths: &[PathBuf],
    worker_threads: usize,
) -> CoreResult<Vec<PackageInput>> {
    let files = find_packages(paths)?;
    debug!(count = files.len(), worker_threads, "loading packages");

    let semaphore = Arc::new(Semaphore::new(worker_threads.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for file in files {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| CoreError::TaskFailed(err.to_string()))?;

        let handle = tokio::task::spawn_blocking(move || {
            let result = PackageInput::load(&file);
            drop(permit);
            result
        });
        handles.push(handle);
    }

    let mut inputs = Vec::with_capacity(handles.len());
    for handle in handles {
        let input = handle
            .await
            .map_err(|err| CoreError::TaskFailed(err.to_string()))??;
        inputs.push(input);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::{write_nupkg, write_symbols_nupkg, TestPackage};

    #[test]
    fn test_load_reads_nuspec_and_hash() {
        let dir = tempdir().unwrap();
        let path = write_nupkg(dir.path(), &TestPackage::new("PackageA", "1.0.0"));

        let input = PackageInput::load(&path).unwrap();
        let loaded = input.loaded().unwrap();

        assert_eq!(input.identity.id(), "PackageA");
        assert_eq!(input.identity.version().to_string(), "1.0.0");
        assert!(!input.is_symbols);
        assert_eq!(loaded.hash, sha512_base64(&std::fs::read(&path).unwrap()));
        assert_eq!(loaded.hash_algorithm, "SHA512");
        assert!(loaded
            .files
            .iter()
            .any(|file| file.full_name == "PackageA.nuspec"));
        assert!(loaded.files.iter().any(|file| file.full_name == "lib/net8.0/a.dll"));
    }

    #[test]
    fn test_symbols_package_detected() {
        let dir = tempdir().unwrap();
        let path = write_symbols_nupkg(dir.path(), &TestPackage::new("PackageA", "1.0.0"));

        let input = PackageInput::load(&path).unwrap();
        assert!(input.is_symbols);
    }

    #[test]
    fn test_missing_nuspec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.1.0.0.nupkg");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default();
        zip.start_file("lib/a.dll", options).unwrap();
        std::io::Write::write_all(&mut zip, b"dll").unwrap();
        zip.finish().unwrap();

        assert!(matches!(
            PackageInput::load(&path),
            Err(CoreError::MissingNuspec(_))
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.nupkg");
        std::fs::write(&path, b"not a zip").unwrap();

        assert!(matches!(
            PackageInput::load(&path),
            Err(CoreError::InvalidPackage { .. })
        ));
    }

    #[test]
    fn test_ordering_puts_symbols_last() {
        let identity = PackageIdentity::parse("a", "1.0.0").unwrap();
        let mut inputs = vec![
            PackageInput::removal(identity.clone(), true),
            PackageInput::removal(identity.clone(), false),
        ];
        inputs.sort();
        assert!(!inputs[0].is_symbols);
        assert!(inputs[1].is_symbols);
        assert_ne!(inputs[0], inputs[1]);
    }

    #[tokio::test]
    async fn test_load_inputs_from_directory() {
        let dir = tempdir().unwrap();
        write_nupkg(dir.path(), &TestPackage::new("PackageA", "1.0.0"));
        write_nupkg(dir.path(), &TestPackage::new("PackageB", "2.0.0"));
        std::fs::write(dir.path().join("readme.txt"), b"skip").unwrap();

        let mut inputs = load_inputs(&[dir.path().to_path_buf()], 2).await.unwrap();
        inputs.sort();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].identity.id(), "PackageA");
        assert_eq!(inputs[1].identity.id(), "PackageB");
    }

    #[test]
    fn test_find_packages_errors_when_empty() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            find_packages(&[dir.path().to_path_buf()]),
            Err(CoreError::NoPackages(_))
        ));
    }
}
