//! Helpers for building real nupkg files and in-memory feeds in tests.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use sleet_fs::{MemoryBackend, RetryPolicy, SleetFileSystem};
use tempfile::TempDir;
use url::Url;

use crate::{
    context::SleetContext, input::PackageInput, operations::SleetOperations,
    package_set::PackageSets, settings::FeedSettings,
};

pub const TEST_FEED_URI: &str = "https://example.com/feed/";

/// Describes the manifest of a generated package.
#[derive(Clone, Debug)]
pub struct TestPackage {
    pub id: String,
    pub version: String,
    pub description: String,
    pub title: String,
    pub tags: String,
    pub dependencies: Vec<(String, String)>,
}

impl TestPackage {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            description: format!("{id} description"),
            title: String::new(),
            tags: String::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = tags.to_string();
        self
    }

    pub fn with_dependency(mut self, id: &str, version: &str) -> Self {
        self.dependencies.push((id.to_string(), version.to_string()));
        self
    }

    pub fn nuspec(&self) -> String {
        let dependencies = if self.dependencies.is_empty() {
            String::new()
        } else {
            let entries: String = self
                .dependencies
                .iter()
                .map(|(id, version)| format!(r#"<dependency id="{id}" version="{version}" />"#))
                .collect();
            format!(
                r#"<dependencies><group targetFramework="net8.0">{entries}</group></dependencies>"#
            )
        };

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>{}</id>
    <version>{}</version>
    <title>{}</title>
    <authors>sleet</authors>
    <description>{}</description>
    <tags>{}</tags>
    {dependencies}
  </metadata>
</package>"#,
            self.id, self.version, self.title, self.description, self.tags
        )
    }

    pub fn file_name(&self, symbols: bool) -> String {
        let extension = if symbols { "symbols.nupkg" } else { "nupkg" };
        format!("{}.{}.{extension}", self.id, self.version)
    }
}

fn write_archive(path: &Path, package: &TestPackage) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(format!("{}.nuspec", package.id), options)
        .unwrap();
    zip.write_all(package.nuspec().as_bytes()).unwrap();
    zip.start_file("lib/net8.0/a.dll", options).unwrap();
    zip.write_all(format!("{} {}", package.id, package.version).as_bytes())
        .unwrap();
    zip.finish().unwrap();
}

/// Writes `{id}.{version}.nupkg` into `dir`.
pub fn write_nupkg(dir: &Path, package: &TestPackage) -> PathBuf {
    let path = dir.join(package.file_name(false));
    write_archive(&path, package);
    path
}

/// Writes `{id}.{version}.symbols.nupkg` into `dir`.
pub fn write_symbols_nupkg(dir: &Path, package: &TestPackage) -> PathBuf {
    let path = dir.join(package.file_name(true));
    write_archive(&path, package);
    path
}

/// A loaded input backed by a nupkg in a temp dir. Keep the dir alive while the input is used.
pub fn package_input(package: &TestPackage) -> (PackageInput, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_nupkg(dir.path(), package);
    (PackageInput::load(&path).unwrap(), dir)
}

pub fn symbols_input(package: &TestPackage) -> (PackageInput, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_symbols_nupkg(dir.path(), package);
    (PackageInput::load(&path).unwrap(), dir)
}

/// A feed on a fresh [`MemoryBackend`] with default settings.
pub async fn memory_context() -> (SleetContext, TempDir) {
    memory_context_with(MemoryBackend::new(), FeedSettings::default()).await
}

pub async fn memory_context_with(
    backend: MemoryBackend,
    settings: FeedSettings,
) -> (SleetContext, TempDir) {
    let cache = tempfile::tempdir().unwrap();
    let fs = SleetFileSystem::new(
        Arc::new(backend),
        Url::parse(TEST_FEED_URI).unwrap(),
        cache.path().to_path_buf(),
    )
    .with_retry(RetryPolicy::none());
    (SleetContext::new(Arc::new(fs), settings), cache)
}

/// Runs one batch through every enabled service and returns the updated sets.
pub async fn apply_batch(
    ctx: &SleetContext,
    to_add: Vec<PackageInput>,
    to_remove: Vec<PackageInput>,
) -> PackageSets {
    let original = crate::services::PackageIndex
        .get_package_sets(ctx)
        .await
        .unwrap();
    let operations = SleetOperations::create(original, to_add, to_remove);
    crate::services::apply_operations(ctx, &operations)
        .await
        .unwrap();
    operations.updated_index().clone()
}
