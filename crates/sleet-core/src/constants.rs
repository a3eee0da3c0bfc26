//! Feed document paths and schema vocabulary.

pub const SERVICE_INDEX_PATH: &str = "index.json";
pub const PACKAGE_INDEX_PATH: &str = "sleet.packageindex.json";
pub const SETTINGS_PATH: &str = "sleet.settings.json";
pub const CATALOG_INDEX_PATH: &str = "catalog/index.json";
pub const SEARCH_PATH: &str = "search/query";
pub const AUTOCOMPLETE_PATH: &str = "autocomplete/query";

pub const CATALOG_ROOT: &str = "catalog";
pub const REGISTRATION_ROOT: &str = "registration";
pub const FLAT_CONTAINER_ROOT: &str = "flatcontainer";
pub const SYMBOLS_ROOT: &str = "symbolspackages";

pub const DEFAULT_CATALOG_PAGE_SIZE: usize = 1024;

pub const NUGET_SCHEMA: &str = "http://schema.nuget.org/schema#";
pub const NUGET_CATALOG_SCHEMA: &str = "http://schema.nuget.org/catalog#";
pub const NUGET_SERVICES_SCHEMA: &str = "http://schema.nuget.org/services#";
pub const SLEET_SCHEMA: &str = "https://github.com/emgarten/sleet#";
