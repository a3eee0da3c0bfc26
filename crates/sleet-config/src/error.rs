use miette::Diagnostic;
use sleet_utils::error::{DurationError, PathError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(sleet_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(sleet_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(sleet_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("No feed sources are configured")]
    #[diagnostic(
        code(sleet_config::no_sources),
        help("Add a [[sources]] entry to your config file or run 'sleet init-config'")
    )]
    NoSources,

    #[error("Missing default source: {0}")]
    #[diagnostic(
        code(sleet_config::missing_default_source),
        help("Ensure default_source references an existing [[sources]] entry")
    )]
    MissingDefaultSource(String),

    #[error("Unable to find source '{0}'")]
    #[diagnostic(
        code(sleet_config::missing_source),
        help("Check the source names in your config file or pass --source")
    )]
    MissingSource(String),

    #[error("Multiple sources are configured and no default_source is set")]
    #[diagnostic(
        code(sleet_config::ambiguous_source),
        help("Pass --source or set default_source in your config file")
    )]
    AmbiguousSource,

    #[error("Duplicate source name: {0}")]
    #[diagnostic(
        code(sleet_config::duplicate_source),
        help("Each source must have a unique name")
    )]
    DuplicateSourceName(String),

    #[error("Source '{0}' is missing a path")]
    #[diagnostic(
        code(sleet_config::empty_source_path),
        help("Set path to the directory that holds the feed")
    )]
    EmptySourcePath(String),

    #[error("Invalid base URI '{uri}' for source '{name}'")]
    #[diagnostic(
        code(sleet_config::invalid_base_uri),
        help("Use an absolute URI such as https://example.com/feed/")
    )]
    InvalidBaseUri { name: String, uri: String },

    #[error(transparent)]
    #[diagnostic(code(sleet_config::duration))]
    InvalidDuration(#[from] DurationError),

    #[error("IO error: {0}")]
    #[diagnostic(code(sleet_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(
        code(sleet_config::path),
        help("Check that the path is set and every variable it uses is defined")
    )]
    Path(#[from] PathError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(sleet_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(sleet_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),

    #[error("Failed to annotate first table in array: {0}")]
    #[diagnostic(code(sleet_config::annotate_first_table))]
    AnnotateFirstTable(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
