//! Settings stored on the feed itself in `sleet.settings.json`.

use serde::{Deserialize, Serialize};
use sleet_fs::SleetFileSystem;
use tracing::debug;

use crate::{constants::*, error::CoreError, CoreResult};

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_CATALOG_PAGE_SIZE
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSettings {
    #[serde(default = "default_true")]
    pub catalog_enabled: bool,
    #[serde(default)]
    pub symbols_enabled: bool,
    #[serde(default = "default_page_size")]
    pub catalog_page_size: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            catalog_enabled: true,
            symbols_enabled: false,
            catalog_page_size: DEFAULT_CATALOG_PAGE_SIZE,
        }
    }
}

pub const SETTING_KEYS: [&str; 3] = ["catalogEnabled", "symbolsEnabled", "catalogPageSize"];

fn canonical_key(key: &str) -> CoreResult<&'static str> {
    SETTING_KEYS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(key.trim()))
        .copied()
        .ok_or_else(|| CoreError::UnknownSetting(key.to_string()))
}

fn parse_bool(key: &str, value: &str) -> CoreResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => {
            Err(CoreError::InvalidSetting {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
    }
}

impl FeedSettings {
    /// Reads the settings document, falling back to defaults when it does not exist.
    pub async fn load(fs: &SleetFileSystem) -> CoreResult<Self> {
        let settings = fs
            .get(SETTINGS_PATH)
            .get_json_if_exists::<Self>()
            .await?
            .unwrap_or_default();
        debug!(?settings, "loaded feed settings");
        Ok(settings)
    }

    pub async fn save(&self, fs: &SleetFileSystem) -> CoreResult<()> {
        fs.get(SETTINGS_PATH).write_json(self).await?;
        Ok(())
    }

    /// Every setting as `(key, value)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("catalogEnabled", self.catalog_enabled.to_string()),
            ("symbolsEnabled", self.symbols_enabled.to_string()),
            ("catalogPageSize", self.catalog_page_size.to_string()),
        ]
    }

    /// Sets a single key, matched case-insensitively.
    pub fn set(&mut self, key: &str, value: &str) -> CoreResult<()> {
        let key = canonical_key(key)?;
        match key {
            "catalogEnabled" => self.catalog_enabled = parse_bool(key, value)?,
            "symbolsEnabled" => self.symbols_enabled = parse_bool(key, value)?,
            _ => {
                self.catalog_page_size = value
                    .trim()
                    .parse()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| {
                        CoreError::InvalidSetting {
                            key: key.to_string(),
                            value: value.to_string(),
                        }
                    })?;
            }
        }
        Ok(())
    }

    /// Restores the default of a single key.
    pub fn unset(&mut self, key: &str) -> CoreResult<()> {
        let defaults = Self::default();
        match canonical_key(key)? {
            "catalogEnabled" => self.catalog_enabled = defaults.catalog_enabled,
            "symbolsEnabled" => self.symbols_enabled = defaults.symbols_enabled,
            _ => self.catalog_page_size = defaults.catalog_page_size,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: FeedSettings = serde_json::from_str(r#"{ "symbolsEnabled": true }"#).unwrap();
        assert!(settings.catalog_enabled);
        assert!(settings.symbols_enabled);
        assert_eq!(settings.catalog_page_size, 1024);
    }

    #[test]
    fn test_set_and_unset() {
        let mut settings = FeedSettings::default();
        settings.set("CATALOGENABLED", "false").unwrap();
        settings.set("catalogPageSize", "10").unwrap();
        assert!(!settings.catalog_enabled);
        assert_eq!(settings.catalog_page_size, 10);

        settings.unset("catalogenabled").unwrap();
        assert!(settings.catalog_enabled);
    }

    #[test]
    fn test_invalid_settings() {
        let mut settings = FeedSettings::default();
        assert!(matches!(
            settings.set("colour", "blue"),
            Err(CoreError::UnknownSetting(_))
        ));
        assert!(matches!(
            settings.set("symbolsEnabled", "maybe"),
            Err(CoreError::InvalidSetting { .. })
        ));
        assert!(matches!(
            settings.set("catalogPageSize", "0"),
            Err(CoreError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_serialized_keys_are_camel_case() {
        let json = serde_json::to_value(FeedSettings::default()).unwrap();
        assert_eq!(json["catalogEnabled"], true);
        assert_eq!(json["symbolsEnabled"], false);
        assert_eq!(json["catalogPageSize"], 1024);
    }
}
