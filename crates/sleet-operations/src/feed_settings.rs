use sleet_core::{service_index::ServiceIndex, services::Catalog, FeedSettings};
use tracing::{debug, info, warn};

use crate::{FeedContext, SettingChange, SleetResult};

/// Reads the settings stored on the feed.
pub async fn get_feed_settings(feed: &FeedContext) -> SleetResult<FeedSettings> {
    feed.locked("sleet feed-settings", || settings_locked(feed))
        .await
}

async fn settings_locked(feed: &FeedContext) -> SleetResult<FeedSettings> {
    Ok(feed.initialized_context().await?.settings)
}

/// Applies `changes` in order, saves the settings and rewrites the service index.
pub async fn update_feed_settings(
    feed: &FeedContext,
    changes: &[SettingChange],
) -> SleetResult<FeedSettings> {
    debug!(?changes, "updating feed settings");
    feed.locked("sleet feed-settings", || update_locked(feed, changes))
        .await
}

async fn update_locked(feed: &FeedContext, changes: &[SettingChange]) -> SleetResult<FeedSettings> {
    let ctx = feed.initialized_context().await?;
    let before = ctx.settings.clone();

    let mut settings = before.clone();
    for change in changes {
        match change {
            SettingChange::Set { key, value } => {
                settings.set(key, value)?;
                info!("Setting {key} to {value}");
            }
            SettingChange::Unset { key } => {
                settings.unset(key)?;
                info!("Removing {key}");
            }
        }
    }

    if settings == before {
        info!("Feed settings are unchanged");
        return Ok(settings);
    }

    let ctx = ctx.with_settings(settings);
    ctx.settings.save(&ctx.fs).await?;
    ServiceIndex::build(&ctx).write(&ctx).await?;
    Catalog.init(&ctx).await?;
    feed.fs().commit().await?;

    if ctx.settings.catalog_enabled != before.catalog_enabled
        || ctx.settings.symbols_enabled != before.symbols_enabled
    {
        warn!("Run 'sleet recreate' to apply the new settings to existing packages");
    }
    Ok(ctx.settings)
}
