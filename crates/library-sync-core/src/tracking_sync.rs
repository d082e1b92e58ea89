//! Periodic tracking-service refresh, gated by the service's last-activities
//! timestamps so unchanged categories are not re-fetched.

use chrono::{DateTime, Utc};
use library_sync_config::TraktConfig;
use library_sync_models::{LastActivities, ListKind};
use library_sync_sources::{MediaCenterHost, SourceError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use crate::cache::{PersistedCache, ACTIVITIES_TTL};
use crate::error::{LibraryError, Result};
use crate::index::LibraryState;
use crate::orchestrator::ListSync;
use crate::reconcile::WatchedReconciler;
use crate::snapshot::{ListId, SnapshotStore};

const ACTIVITIES_KEY: &str = "tracking.last_activities";

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackingSyncReport {
    /// Nothing changed remotely since the last run
    pub skipped: bool,
    pub first_run: bool,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

pub struct TrackingSync {
    lists: Arc<ListSync>,
    reconciler: Arc<WatchedReconciler>,
    snapshots: Arc<SnapshotStore>,
    host: Arc<dyn MediaCenterHost>,
    state: Arc<LibraryState>,
    cache: Arc<PersistedCache>,
    trakt: TraktConfig,
}

impl TrackingSync {
    pub fn new(
        lists: Arc<ListSync>,
        reconciler: Arc<WatchedReconciler>,
        snapshots: Arc<SnapshotStore>,
        host: Arc<dyn MediaCenterHost>,
        state: Arc<LibraryState>,
        cache: Arc<PersistedCache>,
        trakt: TraktConfig,
    ) -> Self {
        Self {
            lists,
            reconciler,
            snapshots,
            host,
            state,
            cache,
            trakt,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.snapshots.tracking().is_authenticated().await
    }

    /// Runs every tracking category whose activity timestamp advanced.
    ///
    /// `force` runs all enabled categories regardless of the timestamps.
    #[instrument(skip(self))]
    pub async fn run(&self, force: bool) -> Result<TrackingSyncReport> {
        let start = Instant::now();
        let tracking = self.snapshots.tracking();

        let activities = match tracking.last_activities().await {
            Ok(activities) => activities,
            Err(e) => {
                if matches!(e, SourceError::Locked) {
                    self.notify_locked().await;
                }
                return Err(e.into());
            }
        };
        let previous: Option<LastActivities> = self.cache.get(ACTIVITIES_KEY);

        let first_run = !self.state.is_tracking_initialized();
        let refresh_all = force || first_run;
        let host_changed = self.state.is_host_updated() || self.state.is_host_added();

        let mut report = TrackingSyncReport {
            first_run,
            ..TrackingSyncReport::default()
        };

        let unchanged = previous.as_ref().is_some_and(|p| activities.all <= p.all);
        if !refresh_all && !host_changed && unchanged {
            debug!("No tracking activity since the last run");
            report.skipped = true;
            return Ok(report);
        }

        info!(
            operation = "tracking_sync_start",
            first_run = first_run,
            host_changed = host_changed,
            "Refreshing tracking data"
        );

        if first_run {
            self.state.reset_remote_watched().await;
        }

        let advanced = |field: fn(&LastActivities) -> DateTime<Utc>| {
            refresh_all || previous.as_ref().map_or(true, |p| field(&activities) > field(p))
        };

        if self.trakt.sync_watched {
            if advanced(|a| a.movies.watched_at) || host_changed {
                let result = self.reconciler.sync_movies(true).await;
                record(&mut report, "watched.movies", result);
            }
            if advanced(|a| a.episodes.watched_at) || host_changed {
                let result = self.reconciler.sync_shows(true).await;
                record(&mut report, "watched.shows", result);
            }
        }

        if self.trakt.sync_collections {
            if advanced(|a| a.movies.collected_at) {
                let result = self.lists.sync_list(&ListId::Collection, ListKind::Movies, false, true).await;
                record(&mut report, "collection.movies", result);
            }
            if advanced(|a| a.episodes.collected_at) {
                let result = self.lists.sync_list(&ListId::Collection, ListKind::Shows, false, true).await;
                record(&mut report, "collection.shows", result);
            }
        }

        if self.trakt.sync_watchlist {
            if advanced(|a| a.movies.watchlisted_at) {
                let result = self.lists.sync_list(&ListId::Watchlist, ListKind::Movies, false, true).await;
                record(&mut report, "watchlist.movies", result);
            }
            if advanced(|a| a.shows.watchlisted_at)
                || advanced(|a| a.seasons.watchlisted_at)
                || advanced(|a| a.episodes.watchlisted_at)
            {
                let result = self.lists.sync_list(&ListId::Watchlist, ListKind::Shows, false, true).await;
                record(&mut report, "watchlist.shows", result);
            }
        }

        if self.trakt.sync_playback_progress {
            if advanced(|a| a.movies.paused_at) || host_changed {
                let result = self.reconciler.sync_paused(ListKind::Movies).await;
                record(&mut report, "paused.movies", result);
            }
            if advanced(|a| a.episodes.paused_at) || host_changed {
                let result = self.reconciler.sync_paused(ListKind::Shows).await;
                record(&mut report, "paused.shows", result);
            }
        }

        if self.trakt.sync_user_lists && advanced(|a| a.lists_updated_at) {
            self.sync_user_lists(&mut report).await;
        }

        if report.failed.is_empty() {
            if let Err(e) = self.cache.set(ACTIVITIES_KEY, &activities, ACTIVITIES_TTL) {
                warn!(operation = "tracking_sync", error = %e, "Failed to store last activities");
            }
            if first_run {
                self.state.set_tracking_initialized(true);
            }
        }
        self.state.set_host_updated(false);
        self.state.set_host_added(false);

        info!(
            operation = "tracking_sync_complete",
            completed = report.completed.len(),
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tracking refresh finished"
        );
        Ok(report)
    }

    async fn sync_user_lists(&self, report: &mut TrackingSyncReport) {
        let lists = match self.snapshots.tracking().user_lists().await {
            Ok(lists) => lists,
            Err(e) => {
                record::<()>(report, "lists", Err(e.into()));
                return;
            }
        };

        for list in lists {
            let id = ListId::Custom(list.tracking_id.to_string());
            for kind in [ListKind::Movies, ListKind::Shows] {
                let result = self.lists.sync_list(&id, kind, false, true).await;
                record(report, &format!("{}.{}", id, kind), result);
            }
        }
    }

    async fn notify_locked(&self) {
        warn!("Tracking account is locked");
        if let Err(e) = self
            .host
            .notify("strmsync", "Your tracking account is locked. Contact the service support to unlock it.")
            .await
        {
            warn!(error = %e, "Failed to notify about the locked account");
        }
    }
}

fn record<T>(report: &mut TrackingSyncReport, step: &str, result: Result<T>) {
    match result {
        Ok(_) => report.completed.push(step.to_string()),
        Err(e) => {
            if matches!(e, LibraryError::RemoteService(SourceError::Locked)) {
                warn!(step = step, "Tracking account is locked");
            } else {
                warn!(operation = "tracking_sync", step = step, error = %e, "Tracking step failed");
            }
            report.failed.push(step.to_string());
        }
    }
}
