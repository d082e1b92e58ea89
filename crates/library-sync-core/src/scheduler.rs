use async_trait::async_trait;
use library_sync_config::SchedulerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use crate::status::{RefreshCategory, RefreshStatus};

const WATCHER_TICK: Duration = Duration::from_secs(1);
const SWEEP_PERIOD: Duration = Duration::from_secs(30);
const MIN_STARTUP_DELAY: u64 = 5;

/// Runs the work behind each refresh category.
#[async_trait]
pub trait RefreshHandler: Send + Sync + 'static {
    async fn refresh(&self, category: RefreshCategory) -> anyhow::Result<()>;

    /// Purges soft-deleted torrent items.
    async fn sweep(&self) -> anyhow::Result<()>;
}

/// Timer-driven refresh loop.
///
/// A 1 s watcher starts the highest-priority pending refresh when none is
/// running. Tickers request library and tracking refreshes periodically.
pub struct RefreshScheduler {
    handler: Arc<dyn RefreshHandler>,
    status: Arc<RefreshStatus>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub fn new(handler: Arc<dyn RefreshHandler>, status: Arc<RefreshStatus>, config: SchedulerConfig) -> Self {
        Self { handler, status, config }
    }

    pub fn status(&self) -> &Arc<RefreshStatus> {
        &self.status
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let now = Instant::now();
        let mut watcher = interval(WATCHER_TICK);
        watcher.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut library_ticker = periodic(now, self.config.update_frequency_hours * 60 * 60);
        let mut tracking_ticker = periodic(now, self.config.tracking_sync_frequency_minutes * 60);
        let mut sweep_ticker = interval_at(now + SWEEP_PERIOD, SWEEP_PERIOD);

        // A zero delay turns the startup refresh off; others are clamped up
        let startup_delay = match self.config.update_delay_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs.max(MIN_STARTUP_DELAY))),
        };
        let startup = sleep(startup_delay.unwrap_or_default());
        tokio::pin!(startup);
        let mut started = !self.config.run_on_startup || startup_delay.is_none();
        let mut in_flight: Option<JoinHandle<()>> = None;

        info!(
            operation = "scheduler_start",
            startup_delay_secs = startup_delay.map(|d| d.as_secs()),
            update_frequency_hours = self.config.update_frequency_hours,
            tracking_sync_frequency_minutes = self.config.tracking_sync_frequency_minutes,
            "Refresh scheduler started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = &mut startup, if !started => {
                    started = true;
                    for category in [RefreshCategory::Kodi, RefreshCategory::Trakt, RefreshCategory::KodiShows] {
                        self.status.request(category);
                    }
                }
                _ = watcher.tick() => {
                    if let Some(task) = self.dispatch() {
                        in_flight = Some(task);
                    }
                }
                _ = tick(&mut library_ticker) => {
                    debug!("Library update due");
                    self.status.request(RefreshCategory::KodiShows);
                }
                _ = tick(&mut tracking_ticker) => {
                    debug!("Tracking refresh due");
                    self.status.request(RefreshCategory::Trakt);
                }
                _ = sweep_ticker.tick() => {
                    if let Err(e) = self.handler.sweep().await {
                        warn!(operation = "sweep", error = %e, "Failed to sweep deleted items");
                    }
                }
            }
        }

        if let Some(task) = in_flight.filter(|task| !task.is_finished()) {
            info!(operation = "scheduler_stop", "Waiting for the running refresh to finish");
            if let Err(e) = task.await {
                error!(operation = "scheduler_stop", error = %e, "Refresh task ended abnormally");
            }
        }
        info!(operation = "scheduler_stop", "Refresh scheduler stopped");
    }

    /// Starts the next pending refresh, if any, on its own task.
    fn dispatch(&self) -> Option<JoinHandle<()>> {
        let guard = self.status.start_next()?;
        let handler = Arc::clone(&self.handler);

        Some(tokio::spawn(async move {
            let category = guard.category();
            let start = std::time::Instant::now();
            info!(operation = "refresh_start", category = %category, "Starting refresh");

            match handler.refresh(category).await {
                Ok(()) => info!(
                    operation = "refresh_complete",
                    category = %category,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Refresh finished"
                ),
                Err(e) => error!(operation = "refresh", category = %category, error = %e, "Refresh failed"),
            }
            drop(guard);
        }))
    }
}

/// A ticker whose first tick is one period away, or none for a zero period.
fn periodic(now: Instant, period_secs: u64) -> Option<Interval> {
    (period_secs > 0).then(|| {
        let period = Duration::from_secs(period_secs);
        let mut ticker = interval_at(now + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    })
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
