use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use cli::{Args, Commands};
use display::{display_prune, display_push, display_settings, display_stats, display_validation};
use logging::setup_logging;
use sleet_config::{
    config::{default_config_path, generate_default_config, Config},
    error::ConfigError,
};
use sleet_core::FeedSettings;
use sleet_operations::{
    delete::delete_packages,
    destroy::destroy_feed,
    download::download_packages,
    feed_settings::{get_feed_settings, update_feed_settings},
    init::init_feed,
    prune::prune_feed,
    push::push_packages,
    recreate::recreate_feed,
    stats::feed_stats,
    validate::validate,
    FeedContext, PruneOptions, PushOptions, SettingChange, SleetError, SleetResult,
};
use sleet_utils::path::resolve_path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use utils::set_color;

mod cli;
mod display;
mod logging;
mod utils;

fn resolve_config_path(path: &str) -> SleetResult<PathBuf> {
    Ok(resolve_path(path).map_err(ConfigError::from)?)
}

fn parse_setting_changes(set: &[String], unset: &[String]) -> SleetResult<Vec<SettingChange>> {
    let mut changes = Vec::with_capacity(set.len() + unset.len());
    for entry in set {
        let change = SettingChange::parse_set(entry).ok_or_else(|| {
            SleetError::Custom(format!("Invalid setting '{entry}', expected key:value"))
        })?;
        changes.push(change);
    }
    changes.extend(unset.iter().map(|key| SettingChange::Unset { key: key.clone() }));
    Ok(changes)
}

fn init_settings(with_catalog: Option<bool>, with_symbols: Option<bool>) -> Option<FeedSettings> {
    if with_catalog.is_none() && with_symbols.is_none() {
        return None;
    }
    let defaults = FeedSettings::default();
    Some(FeedSettings {
        catalog_enabled: with_catalog.unwrap_or(defaults.catalog_enabled),
        symbols_enabled: with_symbols.unwrap_or(defaults.symbols_enabled),
        ..defaults
    })
}

/// Runs the command. `Ok(false)` means it ran but the feed is not in a good state.
async fn handle_cli(token: CancellationToken) -> SleetResult<bool> {
    let args = Args::parse();

    setup_logging(&args);
    if args.no_color {
        set_color(false);
    }

    let config_path = args.config.as_deref().map(resolve_config_path).transpose()?;

    if let Commands::InitConfig { path } = &args.command {
        let path = path
            .clone()
            .or(config_path)
            .unwrap_or_else(default_config_path);
        generate_default_config(&path)?;
        return Ok(true);
    }

    let config = Config::load(config_path.as_deref())?;
    let feed = FeedContext::from_config(&config, args.source.as_deref(), token)?;
    debug!(feed = feed.name(), "using feed");

    match args.command {
        Commands::Init {
            with_catalog,
            with_symbols,
        } => {
            let report = init_feed(&feed, init_settings(with_catalog, with_symbols)).await?;
            if report.created {
                display_settings(&report.settings);
            }
        }
        Commands::Push {
            paths,
            force,
            skip_existing,
        } => {
            let options = PushOptions {
                force,
                skip_existing,
            };
            let report = push_packages(&feed, &paths, options).await?;
            display_push(&report);
        }
        Commands::Delete { id, version } => {
            delete_packages(&feed, &id, version.as_deref()).await?;
        }
        Commands::Validate => {
            let report = validate(&feed).await?;
            display_validation(&report);
            return Ok(report.is_valid());
        }
        Commands::Stats => {
            let report = feed_stats(&feed).await?;
            let settings = get_feed_settings(&feed).await?;
            display_stats(&report, settings.symbols_enabled);
        }
        Commands::Prune {
            stable_versions_to_keep,
            prerelease_versions_to_keep,
            ids,
            dry_run,
        } => {
            let options = PruneOptions {
                stable_versions_to_keep,
                prerelease_versions_to_keep,
                ids,
                dry_run,
            };
            let report = prune_feed(&feed, &options).await?;
            display_prune(&report);
        }
        Commands::Recreate => {
            recreate_feed(&feed).await?;
        }
        Commands::Destroy => {
            destroy_feed(&feed).await?;
        }
        Commands::FeedSettings {
            get_all,
            set,
            unset,
        } => {
            let changes = parse_setting_changes(&set, &unset)?;
            let settings = if changes.is_empty() {
                get_feed_settings(&feed).await?
            } else {
                update_feed_settings(&feed, &changes).await?
            };
            if get_all || !changes.is_empty() {
                display_settings(&settings);
            }
        }
        Commands::Download { output } => {
            let report = download_packages(&feed, &output).await?;
            if !report.missing.is_empty() {
                warn!("{} package(s) could not be downloaded", report.missing.len());
                return Ok(false);
            }
        }
        Commands::InitConfig { .. } => unreachable!("handled before loading the config"),
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancelling, the feed lock is released once pending work stops");
            on_signal.cancel();
        }
    });

    match handle_cli(token).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}
