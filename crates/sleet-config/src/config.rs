use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use sleet_utils::{path::xdg_config_home, time::parse_duration};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::{annotate_toml_array_of_tables, annotate_toml_table},
    error::{ConfigError, Result},
    source::Source,
};

pub const DEFAULT_LOCK_TIMEOUT: &str = "30m";
pub const DEFAULT_RETRY_DELAY: &str = "1s";
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_COMMIT_CONCURRENCY: usize = 4;

/// Client configuration for sleet.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Name of the source used when --source is not given.
    pub default_source: Option<String>,

    /// How long to wait for the feed lock before giving up.
    /// Default: "30m"
    pub lock_timeout: Option<String>,

    /// Maximum number of files uploaded at the same time during commit.
    /// Default: 4
    pub commit_concurrency: Option<usize>,

    /// Maximum number of packages read at the same time before the feed is locked.
    /// Default: twice the number of processors
    pub worker_threads: Option<usize>,

    /// Number of attempts for each storage read or write.
    /// Default: 5
    pub retry_attempts: Option<u32>,

    /// Delay between storage retries.
    /// Default: "1s"
    pub retry_delay: Option<String>,

    /// Feeds that sleet can operate on.
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Location of the config file: `$SLEET_CONFIG`, else `$XDG_CONFIG_HOME/sleet/config.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var("SLEET_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("sleet").join("config.toml"),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            default_source: Some("feed".to_string()),
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT.to_string()),
            commit_concurrency: Some(DEFAULT_COMMIT_CONCURRENCY),
            worker_threads: Some(default_worker_threads()),
            retry_attempts: Some(DEFAULT_RETRY_ATTEMPTS),
            retry_delay: Some(DEFAULT_RETRY_DELAY.to_string()),
            sources: vec![Source::new("feed", "~/sleet-feed")],
        }
    }

    /// Loads the configuration from `path` (or the default location) and validates it.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "no config at {}, using defaults",
                    config_path.display()
                );
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.to_lowercase()) {
                return Err(ConfigError::DuplicateSourceName(source.name.clone()));
            }
            if source.path.trim().is_empty() {
                return Err(ConfigError::EmptySourcePath(source.name.clone()));
            }
        }

        if let Some(default) = &self.default_source {
            if self.find_source(default).is_none() {
                return Err(ConfigError::MissingDefaultSource(default.clone()));
            }
        }

        self.lock_timeout
            .get_or_insert_with(|| DEFAULT_LOCK_TIMEOUT.to_string());
        self.retry_delay
            .get_or_insert_with(|| DEFAULT_RETRY_DELAY.to_string());
        self.retry_attempts.get_or_insert(DEFAULT_RETRY_ATTEMPTS);
        self.commit_concurrency
            .get_or_insert(DEFAULT_COMMIT_CONCURRENCY);
        self.worker_threads.get_or_insert_with(default_worker_threads);

        // Surface bad durations now rather than after the feed lock is taken.
        self.lock_timeout()?;
        self.retry_delay()?;

        Ok(())
    }

    fn find_source(&self, name: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|source| source.name.eq_ignore_ascii_case(name))
    }

    /// Picks the named source, else the default source, else the only configured source.
    pub fn get_source(&self, name: Option<&str>) -> Result<&Source> {
        if let Some(name) = name {
            return self
                .find_source(name)
                .ok_or_else(|| ConfigError::MissingSource(name.to_string()));
        }

        if let Some(default) = &self.default_source {
            return self
                .find_source(default)
                .ok_or_else(|| ConfigError::MissingDefaultSource(default.clone()));
        }

        match self.sources.as_slice() {
            [] => Err(ConfigError::NoSources),
            [only] => Ok(only),
            _ => Err(ConfigError::AmbiguousSource),
        }
    }

    pub fn lock_timeout(&self) -> Result<Duration> {
        Ok(parse_duration(
            self.lock_timeout.as_deref().unwrap_or(DEFAULT_LOCK_TIMEOUT),
        )?)
    }

    pub fn retry_delay(&self) -> Result<Duration> {
        Ok(parse_duration(
            self.retry_delay.as_deref().unwrap_or(DEFAULT_RETRY_DELAY),
        )?)
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS).max(1)
    }

    pub fn commit_concurrency(&self) -> usize {
        self.commit_concurrency
            .unwrap_or(DEFAULT_COMMIT_CONCURRENCY)
            .max(1)
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(default_worker_threads)
            .max(1)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(sources) = doc
            .get_mut("sources")
            .and_then(|item| item.as_array_of_tables_mut())
        {
            annotate_toml_array_of_tables::<Source>(sources)?;
        }

        Ok(doc)
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
}

/// Writes an annotated default configuration to `path`, refusing to overwrite.
pub fn generate_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    fn test_default_config_resolves() {
        let mut config = Config::default_config();
        config.resolve().unwrap();

        assert_eq!(config.default_source.as_deref(), Some("feed"));
        assert_eq!(config.lock_timeout().unwrap(), Duration::from_secs(30 * 60));
        assert_eq!(config.retry_attempts(), 5);
        assert_eq!(config.commit_concurrency(), 4);
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_resolve_rejects_empty_sources() {
        let mut config = Config::default_config();
        config.sources.clear();
        assert!(matches!(config.resolve(), Err(ConfigError::NoSources)));
    }

    #[test]
    fn test_resolve_rejects_duplicate_sources() {
        let mut config = Config::default_config();
        config.sources.push(Source::new("FEED", "/srv/other"));
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::DuplicateSourceName(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_missing_default() {
        let mut config = Config::default_config();
        config.default_source = Some("nope".to_string());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingDefaultSource(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_duration() {
        let mut config = Config::default_config();
        config.lock_timeout = Some("forever".to_string());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let mut config = Config::default_config();
        config.retry_attempts = None;
        config.commit_concurrency = None;
        config.lock_timeout = None;

        config.resolve().unwrap();

        assert_eq!(config.retry_attempts, Some(DEFAULT_RETRY_ATTEMPTS));
        assert_eq!(config.commit_concurrency, Some(DEFAULT_COMMIT_CONCURRENCY));
        assert_eq!(config.lock_timeout.as_deref(), Some(DEFAULT_LOCK_TIMEOUT));
    }

    #[test]
    fn test_get_source_selection() {
        let mut config = Config::default_config();
        config.sources.push(Source::new("second", "/srv/second"));

        assert_eq!(config.get_source(None).unwrap().name, "feed");
        assert_eq!(config.get_source(Some("SECOND")).unwrap().name, "second");
        assert!(matches!(
            config.get_source(Some("third")),
            Err(ConfigError::MissingSource(_))
        ));

        config.default_source = None;
        assert!(matches!(
            config.get_source(None),
            Err(ConfigError::AmbiguousSource)
        ));

        config.sources.pop();
        assert_eq!(config.get_source(None).unwrap().name, "feed");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            default_source = "local"
            lock_timeout = "5m"

            [[sources]]
            name = "local"
            path = "/srv/feed"
            base_uri = "https://example.com/feed/"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.lock_timeout().unwrap(), Duration::from_secs(300));
        let source = config.get_source(None).unwrap();
        assert_eq!(source.path, "/srv/feed");
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        with_env(&[("HOME", Some("/home/feeder"))], || {
            let config = Config::load(Some(&path)).unwrap();
            assert_eq!(config.sources.len(), 1);
        });
    }

    #[test]
    #[serial]
    fn test_default_config_path_env_override() {
        with_env(&[("SLEET_CONFIG", Some("/etc/sleet.toml"))], || {
            assert_eq!(default_config_path(), PathBuf::from("/etc/sleet.toml"));
        });
    }

    #[test]
    fn test_generate_default_config_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sleet").join("config.toml");

        generate_default_config(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[[sources]]"));

        let parsed: Config = toml::from_str(&written).unwrap();
        assert_eq!(parsed.sources[0].name, "feed");

        assert!(matches!(
            generate_default_config(&path),
            Err(ConfigError::ConfigAlreadyExists)
        ));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::default_config();
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.default_source, config.default_source);
    }
}
