use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Create and update static NuGet package feeds",
    arg_required_else_help = true
)]
pub struct Args {
    /// Unimportant logs are hidden by default, raise with -v (debug) or -vv (trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Name of the configured source to use
    #[arg(short, long, global = true)]
    pub source: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new feed
    Init {
        /// Write the catalog. Defaults to true.
        #[arg(long)]
        with_catalog: Option<bool>,

        /// Accept symbols packages. Defaults to false.
        #[arg(long)]
        with_symbols: Option<bool>,
    },

    /// Add packages to the feed
    Push {
        /// Nupkg files or directories containing them
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Replace packages that already exist
        #[arg(short, long)]
        force: bool,

        /// Skip packages that already exist
        #[arg(long, conflicts_with = "force")]
        skip_existing: bool,
    },

    /// Remove a package version, or every version of a package id
    Delete {
        /// Package id
        #[arg(short, long)]
        id: String,

        /// Package version. Every version is removed when omitted.
        #[arg(long)]
        version: Option<String>,
    },

    /// Check that every service agrees with the package index
    Validate,

    /// Show package counts
    Stats,

    /// Delete old versions of packages
    #[command(group(
        ArgGroup::new("keep")
            .required(true)
            .multiple(true)
            .args(["stable_versions_to_keep", "prerelease_versions_to_keep"])
    ))]
    Prune {
        /// Number of stable versions to keep per id
        #[arg(long)]
        stable_versions_to_keep: Option<usize>,

        /// Number of prerelease versions to keep per id
        #[arg(long)]
        prerelease_versions_to_keep: Option<usize>,

        /// Only prune these package ids
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Show what would be removed without changing the feed
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild the feed from the packages it contains
    Recreate,

    /// Delete every file of the feed
    Destroy,

    /// Read or change the settings stored on the feed
    #[command(group(
        ArgGroup::new("action")
            .required(true)
            .multiple(true)
            .args(["get_all", "set", "unset"])
    ))]
    FeedSettings {
        /// Show every setting
        #[arg(long)]
        get_all: bool,

        /// Set a value, for example catalogEnabled:false
        #[arg(long, value_name = "KEY:VALUE")]
        set: Vec<String>,

        /// Restore the default of a setting
        #[arg(long, value_name = "KEY")]
        unset: Vec<String>,
    },

    /// Copy every package in the feed to a directory
    Download {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a default config file
    InitConfig {
        /// Where to write it. Defaults to the config location.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}
