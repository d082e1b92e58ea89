//! Collects removed-episode notifications and summarizes them once the user
//! stops removing things.

use library_sync_models::{ItemState, MediaType};
use library_sync_sources::MediaCenterHost;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use crate::placeholder::PlaceholderWriter;

pub const REMOVAL_QUIET_PERIOD: Duration = Duration::from_secs(3);
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEpisode {
    pub id: i64,
    pub show_id: i64,
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
}

#[derive(Clone)]
pub struct RemovalHandle {
    tx: mpsc::Sender<RemovedEpisode>,
}

impl RemovalHandle {
    pub async fn notify(&self, episode: RemovedEpisode) {
        if let Err(e) = self.tx.send(episode).await {
            warn!(operation = "removed_episode", error = %e, "Removal debouncer is not running");
        }
    }
}

pub struct RemovalDebouncer {
    rx: mpsc::Receiver<RemovedEpisode>,
    quiet_period: Duration,
}

impl RemovalDebouncer {
    /// Creates the handle producers send to and the consumer to spawn later.
    pub fn channel() -> (RemovalHandle, RemovalDebouncer) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            RemovalHandle { tx },
            RemovalDebouncer {
                rx,
                quiet_period: REMOVAL_QUIET_PERIOD,
            },
        )
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn spawn(
        self,
        writer: Arc<PlaceholderWriter>,
        host: Arc<dyn MediaCenterHost>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(writer, host, shutdown))
    }

    async fn run(
        mut self,
        writer: Arc<PlaceholderWriter>,
        host: Arc<dyn MediaCenterHost>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut pending: Vec<RemovedEpisode> = Vec::new();

        loop {
            if pending.is_empty() {
                tokio::select! {
                    received = self.rx.recv() => match received {
                        Some(episode) => pending.push(episode),
                        None => break,
                    },
                    _ = shutdown.changed() => {
                        self.flush_on_shutdown(&writer, host.as_ref(), &mut pending).await;
                        break;
                    }
                }
            } else {
                // Every new notification restarts the quiet timer
                tokio::select! {
                    received = self.rx.recv() => match received {
                        Some(episode) => pending.push(episode),
                        None => {
                            flush_removed(&writer, host.as_ref(), std::mem::take(&mut pending)).await;
                            break;
                        }
                    },
                    _ = tokio::time::sleep(self.quiet_period) => {
                        flush_removed(&writer, host.as_ref(), std::mem::take(&mut pending)).await;
                    }
                    _ = shutdown.changed() => {
                        self.flush_on_shutdown(&writer, host.as_ref(), &mut pending).await;
                        break;
                    }
                }
            }
        }
        debug!("Removal debouncer stopped");
    }

    /// Records everything held or still queued without waiting for quiet.
    async fn flush_on_shutdown(
        &mut self,
        writer: &PlaceholderWriter,
        host: &dyn MediaCenterHost,
        pending: &mut Vec<RemovedEpisode>,
    ) {
        while let Ok(episode) = self.rx.try_recv() {
            pending.push(episode);
        }
        flush_removed(writer, host, std::mem::take(pending)).await;
    }
}

/// Summarizes one burst of removals.
///
/// Shows with every library episode removed are removed whole; the rest are
/// described in a confirm dialog that offers a library clean.
pub(crate) async fn flush_removed(writer: &PlaceholderWriter, host: &dyn MediaCenterHost, episodes: Vec<RemovedEpisode>) {
    if episodes.is_empty() {
        return;
    }

    let mut by_show: BTreeMap<i64, Vec<RemovedEpisode>> = BTreeMap::new();
    for episode in episodes {
        by_show.entry(episode.show_id).or_default().push(episode);
    }

    let mut labels = Vec::new();
    for (show_id, removed) in &by_show {
        let library_total = writer
            .state()
            .show_by_catalog_id(*show_id)
            .await
            .map(|s| s.episodes.len())
            .unwrap_or(0);

        let show_name = &removed[0].show_name;
        if library_total > 0 && removed.len() == library_total {
            if let Err(e) = writer.remove_show(*show_id, false).await {
                error!(operation = "removed_episodes", show_id = show_id, error = %e, "Unable to remove show after removing all episodes");
            }
        } else if removed.len() == 1 {
            labels.push(format!("{} S{:02}E{:02}", show_name, removed[0].season, removed[0].episode));
        } else {
            labels.push(format!("{} episodes of {}", removed.len(), show_name));
        }

        let ids: Vec<i64> = removed.iter().map(|e| e.id).collect();
        if let Err(e) = writer
            .db()
            .save_items(&ids, ItemState::Deleted, MediaType::Episode, *show_id)
        {
            error!(operation = "removed_episodes", show_id = show_id, error = %e, "Failed to mark episodes removed");
        }
    }

    if labels.is_empty() {
        return;
    }

    let label = labels.join(", ");
    let confirmed = match host
        .confirm_dialog("Library", &format!("Removed {}. Clean the library now?", label))
        .await
    {
        Ok(confirmed) => confirmed,
        Err(e) => {
            warn!(operation = "removed_episodes", error = %e, "Confirm dialog failed");
            false
        }
    };
    if confirmed {
        if let Err(e) = host.clean_library(None, "tvshows").await {
            warn!(operation = "removed_episodes", error = %e, "Library clean failed");
        }
    }
}
