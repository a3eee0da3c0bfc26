use std::path::PathBuf;

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use sleet_utils::path::{resolve_path, xdg_cache_home};
use url::Url;

use crate::error::{ConfigError, Result};

/// Storage backend behind a feed source.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A directory on the local file system.
    #[default]
    Local,
}

/// A static package feed that sleet reads and writes.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Source {
    /// Unique name of the source.
    pub name: String,

    /// Storage backend type.
    /// Default: "local"
    #[serde(rename = "type", default)]
    pub kind: SourceKind,

    /// Directory that holds the feed files.
    pub path: String,

    /// Public URI the feed is served from, used inside every written document.
    /// Default: file URI of `path`
    pub base_uri: Option<String>,

    /// Directory used to cache feed files while a command runs.
    /// Default: $XDG_CACHE_HOME/sleet/<name>
    pub cache_path: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Local,
            path: path.into(),
            base_uri: None,
            cache_path: None,
        }
    }

    pub fn get_path(&self) -> Result<PathBuf> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::EmptySourcePath(self.name.clone()));
        }
        Ok(resolve_path(&self.path)?)
    }

    /// Base URI of the feed, always ending in `/`.
    pub fn get_base_uri(&self) -> Result<Url> {
        let invalid = |uri: &str| {
            ConfigError::InvalidBaseUri {
                name: self.name.clone(),
                uri: uri.to_string(),
            }
        };

        match self.base_uri.as_deref() {
            Some(uri) => {
                let with_slash = if uri.ends_with('/') {
                    uri.to_string()
                } else {
                    format!("{uri}/")
                };
                let parsed = Url::parse(&with_slash).map_err(|_| invalid(uri))?;
                if parsed.cannot_be_a_base() {
                    return Err(invalid(uri));
                }
                Ok(parsed)
            }
            None => {
                let path = self.get_path()?;
                Url::from_directory_path(&path).map_err(|_| invalid(&path.display().to_string()))
            }
        }
    }

    pub fn get_cache_path(&self) -> Result<PathBuf> {
        match self.cache_path.as_deref() {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(xdg_cache_home().join("sleet").join(&self.name)),
        }
    }
}
