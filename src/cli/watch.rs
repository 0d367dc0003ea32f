use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    platform::Platform,
    usage::{
        names::NameResolver,
        refresh::{refresh, RefreshOptions, ScreenState},
        screen::{RefreshTicket, Screen},
    },
    utils::clock::Clock,
};

use super::{report::print_screen, ReportArgs, Session};

/// Cancels `cancelation` once the process receives Ctrl-C.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}

pub async fn process_watch_command(
    session: &Session,
    report: ReportArgs,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    watch(
        session.platform.clone(),
        Arc::new(session.resolver(report.policy)),
        session.refresh_options(&report),
        session.clock.clone(),
        interval,
        shutdown,
        |state| {
            // Clear the terminal and move the cursor home before redrawing.
            print!("\x1B[2J\x1B[H");
            print_screen(state);
        },
    )
    .await
}

/// Refreshes every `interval` until `shutdown` is cancelled. A refresh runs as a separate task and
/// reports back through a channel. At most one refresh runs at a time, ticks that arrive while one
/// is still running are skipped.
pub async fn watch(
    platform: Platform,
    resolver: Arc<NameResolver>,
    options: RefreshOptions,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: CancellationToken,
    mut render: impl FnMut(&ScreenState),
) -> Result<()> {
    let (sender, mut receiver) = mpsc::channel::<(RefreshTicket, Result<ScreenState>)>(4);
    let mut screen = Screen::new();
    let mut running: Option<RefreshTicket> = None;
    let mut refresh_point = clock.instant();

    loop {
        select! {
            _ = shutdown.cancelled() => {
                info!("Stopping watch");
                return Ok(());
            }
            _ = clock.sleep_until(refresh_point) => {
                refresh_point += interval;
                if let Some(ticket) = running {
                    debug!("Skipping tick, refresh {ticket:?} is still running");
                } else {
                    let ticket = screen.begin_refresh();
                    running = Some(ticket);
                    debug!("Starting refresh {ticket:?}");

                    let platform = platform.clone();
                    let resolver = resolver.clone();
                    let clock = clock.clone();
                    let sender = sender.clone();
                    tokio::spawn(async move {
                        let result = refresh(&platform, &resolver, &options, clock.time()).await;
                        if sender.send((ticket, result)).await.is_err() {
                            debug!("Watch stopped before refresh {ticket:?} finished");
                        }
                    });
                }
            }
            Some((ticket, result)) = receiver.recv() => {
                if running == Some(ticket) {
                    running = None;
                }
                match result {
                    Ok(state) => {
                        if !screen.apply(ticket, state) {
                            debug!("Discarding superseded refresh {ticket:?}");
                        } else if let Some(state) = screen.state() {
                            render(state);
                        }
                    }
                    Err(e) => error!("Refresh {ticket:?} failed {e:?}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio_util::sync::CancellationToken;

    use crate::{
        platform::{
            snapshot::{SnapshotDocument, SnapshotPlatform},
            Platform, UsageSource,
        },
        usage::{
            entities::{QueryWindow, UsageRecord},
            names::NameResolver,
            refresh::{RefreshOptions, ScreenState},
        },
        utils::{clock::FixedClock, logging::TEST_LOGGING},
    };

    use super::watch;

    /// Queries sleep for `delays[call]` (zero past the end) and report the call number as usage
    /// seconds. Tracks how many queries ran at the same time.
    struct DelayedSource {
        delays: Vec<u64>,
        calls: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl DelayedSource {
        fn new(delays: Vec<u64>) -> Self {
            Self {
                delays,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UsageSource for DelayedSource {
        async fn query_usage(&self, _window: QueryWindow) -> Result<Option<Vec<UsageRecord>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);

            let delay = self.delays.get(call).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_secs(delay)).await;

            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(vec![UsageRecord::new(
                "com.example.app",
                (call as u64 + 1) * 1000,
            )]))
        }
    }

    fn granted_snapshot() -> Arc<SnapshotPlatform> {
        Arc::new(SnapshotPlatform::new(SnapshotDocument {
            usage_access_granted: true,
            ..Default::default()
        }))
    }

    fn durations(rendered: &[ScreenState]) -> Vec<String> {
        rendered
            .iter()
            .filter_map(|state| match state {
                ScreenState::Usage(entries) => entries.first().map(|e| e.formatted_duration.clone()),
                ScreenState::PermissionRequired => None,
            })
            .collect()
    }

    async fn run_watch(platform: Platform, stop_after: Duration) -> Result<Vec<ScreenState>> {
        let shutdown = CancellationToken::new();
        let mut rendered = vec![];
        let stop = {
            let shutdown = shutdown.clone();
            async move {
                tokio::time::sleep(stop_after).await;
                shutdown.cancel();
            }
        };
        let (_, result) = tokio::join!(
            stop,
            watch(
                platform,
                Arc::new(NameResolver::default()),
                RefreshOptions {
                    top: 10,
                    include_system_apps: true,
                },
                Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap())),
                Duration::from_secs(10),
                shutdown.clone(),
                |state| rendered.push(state.clone()),
            )
        );
        result?;
        Ok(rendered)
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_every_tick() -> Result<()> {
        *TEST_LOGGING;
        let snapshot = granted_snapshot();
        let source = Arc::new(DelayedSource::new(vec![]));
        let platform = Platform::new(snapshot.clone(), source, snapshot);

        let rendered = run_watch(platform, Duration::from_secs(25)).await?;

        assert_eq!(durations(&rendered), ["1s", "2s", "3s"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn tick_is_skipped_while_refresh_runs() -> Result<()> {
        *TEST_LOGGING;
        let snapshot = granted_snapshot();
        let source = Arc::new(DelayedSource::new(vec![15]));
        let platform = Platform::new(snapshot.clone(), source.clone(), snapshot);

        let rendered = run_watch(platform, Duration::from_secs(25)).await?;

        // The tick at 10s is skipped, the first refresh lands at 15s and the next starts at 20s.
        assert_eq!(durations(&rendered), ["1s", "2s"]);
        assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_slower_than_interval_still_renders() -> Result<()> {
        *TEST_LOGGING;
        let snapshot = granted_snapshot();
        let source = Arc::new(DelayedSource::new(vec![12; 10]));
        let platform = Platform::new(snapshot.clone(), source.clone(), snapshot);

        let rendered = run_watch(platform, Duration::from_secs(55)).await?;

        // Refreshes start at 0s, 20s and 40s and each one finishes 12s later.
        assert_eq!(durations(&rendered), ["1s", "2s", "3s"]);
        assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn permission_screen_is_rendered() -> Result<()> {
        *TEST_LOGGING;
        let platform = Platform::from_backend(SnapshotPlatform::new(SnapshotDocument::default()));

        let rendered = run_watch(platform, Duration::from_secs(5)).await?;

        assert_eq!(rendered, vec![ScreenState::PermissionRequired]);
        Ok(())
    }
}
