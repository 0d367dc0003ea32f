use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use tracing::{debug, info, instrument};

use crate::platform::{PackageInventory, Platform};

use super::{
    aggregator::aggregate,
    duration::format_duration,
    entities::{DisplayEntry, QueryWindow, UsageRecord},
    names::NameResolver,
};

pub const DEFAULT_TOP: usize = 10;

/// What the usage screen shows after a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenState {
    /// Usage access wasn't granted. The caller should offer to open the settings screen.
    PermissionRequired,
    Usage(Vec<DisplayEntry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    pub top: usize,
    pub include_system_apps: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            top: DEFAULT_TOP,
            include_system_apps: false,
        }
    }
}

/// Runs one screen refresh against the platform for the 24 hours ending at `now`.
#[instrument(skip(platform, resolver))]
pub async fn refresh(
    platform: &Platform,
    resolver: &NameResolver,
    options: &RefreshOptions,
    now: DateTime<Utc>,
) -> Result<ScreenState> {
    if !platform.access.is_usage_access_granted().await? {
        debug!("Usage access is not granted");
        return Ok(ScreenState::PermissionRequired);
    }

    let window = QueryWindow::last_day(now);
    let records = platform
        .source
        .query_usage(window)
        .await?
        .unwrap_or_default();
    debug!("Platform returned {} records", records.len());

    let usages = aggregate(
        records,
        options.include_system_apps,
        platform.inventory.as_ref(),
    )
    .await;
    log_usages(&usages);

    let top = usages.into_iter().take(options.top).collect::<Vec<_>>();
    let entries = display_entries(top, resolver, platform.inventory.as_ref()).await;
    Ok(ScreenState::Usage(entries))
}

/// Resolves names and formats durations, keeping the order of `records`.
pub async fn display_entries(
    records: Vec<UsageRecord>,
    resolver: &NameResolver,
    inventory: &dyn PackageInventory,
) -> Vec<DisplayEntry> {
    stream::iter(records)
        .then(|record| async move {
            DisplayEntry {
                name: resolver.resolve_name(&record.package, inventory).await,
                formatted_duration: format_duration(record.foreground_seconds()),
            }
        })
        .collect()
        .await
}

fn log_usages(usages: &[UsageRecord]) {
    if usages.is_empty() {
        info!("No usage stats found.");
        return;
    }
    for usage in usages {
        info!("App: {}, time: {}s", usage.package, usage.foreground_seconds());
    }
}
