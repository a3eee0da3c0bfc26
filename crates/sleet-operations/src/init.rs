use sleet_core::{
    service_index::ServiceIndex,
    services::{AutoComplete, Catalog, PackageIndex, Search},
    FeedSettings, SleetContext,
};
use tracing::{debug, info};

use crate::{FeedContext, InitReport, SleetResult};

/// Creates the feed documents. An already initialized feed is left untouched.
///
/// `settings` overrides what is stored on the feed, if anything.
pub async fn init_feed(feed: &FeedContext, settings: Option<FeedSettings>) -> SleetResult<InitReport> {
    debug!(feed = feed.name(), "initializing feed");
    feed.locked("sleet init", || init_locked(feed, settings))
        .await
}

async fn init_locked(feed: &FeedContext, settings: Option<FeedSettings>) -> SleetResult<InitReport> {
    let ctx = feed.load_context().await?;
    if ServiceIndex::exists(&ctx).await? {
        info!("Feed '{}' is already initialized", feed.name());
        return Ok(InitReport {
            created: false,
            settings: ctx.settings,
        });
    }

    let ctx = match settings {
        Some(settings) => ctx.with_settings(settings),
        None => ctx,
    };
    write_feed(&ctx).await?;
    feed.fs().commit().await?;

    info!("Initialized feed '{}'", feed.name());
    Ok(InitReport {
        created: true,
        settings: ctx.settings,
    })
}

/// Writes the settings, the service index and an empty document for every enabled service.
/// Nothing is committed.
pub(crate) async fn write_feed(ctx: &SleetContext) -> SleetResult<()> {
    ctx.settings.save(&ctx.fs).await?;
    ServiceIndex::build(ctx).write(ctx).await?;
    PackageIndex.init(ctx).await?;
    Catalog.init(ctx).await?;
    AutoComplete.init(ctx).await?;
    Search.init(ctx).await?;
    Ok(())
}
