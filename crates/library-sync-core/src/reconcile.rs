//! Two-way watched-state and playback-progress sync between the tracking
//! service and the media center.
//!
//! Marks applied from the remote side are remembered per placeholder file so a
//! local "unwatch" is not overwritten on the next cycle, and marks pushed to
//! the remote side are remembered so they are not pushed again.

use chrono::{DateTime, Utc};
use library_sync_config::{LibraryConfig, TraktConfig};
use library_sync_models::{
    ListKind, MediaType, Movie, Resume, Show, TrackedIds, UniqueIds, WatchedMovie, WatchedShow, WatchedUpdate,
};
use library_sync_sources::{CatalogClient, MediaCenterHost};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use crate::cache::{PersistedCache, PAUSED_TTL, PLAYCOUNT_TTL};
use crate::diff::{diff_watched_movies, diff_watched_shows};
use crate::error::Result;
use crate::index::{file_key, tracked_keys, LibraryState};
use crate::snapshot::SnapshotStore;

/// Last-applied and last-synced playcount maps, keyed by placeholder file key.
#[derive(Debug, Default)]
struct Playcounts {
    last_applied: HashMap<u64, bool>,
    synced: HashMap<u64, bool>,
}

impl Playcounts {
    fn load(cache: &PersistedCache, kind: ListKind) -> Self {
        Self {
            last_applied: cache
                .get(&format!("playcount.last_applied.{}", kind))
                .unwrap_or_default(),
            synced: cache.get(&format!("playcount.synced.{}", kind)).unwrap_or_default(),
        }
    }

    fn save(&self, cache: &PersistedCache, kind: ListKind) {
        let saved = cache
            .set(&format!("playcount.last_applied.{}", kind), &self.last_applied, PLAYCOUNT_TTL)
            .and_then(|_| cache.set(&format!("playcount.synced.{}", kind), &self.synced, PLAYCOUNT_TTL));
        if let Err(e) = saved {
            warn!(operation = "save_playcounts", kind = %kind, error = %e, "Failed to store playcounts");
        }
    }
}

fn local_tracked_ids(uids: &UniqueIds) -> TrackedIds {
    TrackedIds {
        tracking_id: uids.tracking_id,
        catalog_id: uids.catalog_id,
        external_db_id: uids.external_db_id,
        external_legacy_id: uids.external_legacy_id.clone(),
        slug: String::new(),
    }
}

/// Seconds into an item of `runtime_minutes` at `progress` percent.
pub fn progress_position(runtime_minutes: u32, progress: f64) -> (f64, f64) {
    let total = f64::from(runtime_minutes) * 60.0;
    (total / 100.0 * progress, total)
}

pub struct WatchedReconciler {
    host: Arc<dyn MediaCenterHost>,
    state: Arc<LibraryState>,
    snapshots: Arc<SnapshotStore>,
    catalog: Arc<dyn CatalogClient>,
    cache: Arc<PersistedCache>,
    language: String,
    sync_watched_back: bool,
}

impl WatchedReconciler {
    pub fn new(
        host: Arc<dyn MediaCenterHost>,
        state: Arc<LibraryState>,
        snapshots: Arc<SnapshotStore>,
        catalog: Arc<dyn CatalogClient>,
        cache: Arc<PersistedCache>,
        library: &LibraryConfig,
        trakt: &TraktConfig,
    ) -> Self {
        Self {
            host,
            state,
            snapshots,
            catalog,
            cache,
            language: library.language.clone(),
            sync_watched_back: trakt.sync_watched_back,
        }
    }

    async fn local_movie(&self, ids: &TrackedIds) -> Option<Movie> {
        if let Some(movie) = self.state.movie_by_catalog_id(ids.catalog_id).await {
            return Some(movie);
        }
        if ids.external_legacy_id.is_empty() {
            return None;
        }
        self.state.movie_by_legacy_id(&ids.external_legacy_id).await
    }

    async fn local_show(&self, ids: &TrackedIds) -> Option<Show> {
        if let Some(show) = self.state.show_by_catalog_id(ids.catalog_id).await {
            return Some(show);
        }
        if ids.external_legacy_id.is_empty() {
            return None;
        }
        self.state.show_by_legacy_id(&ids.external_legacy_id).await
    }

    #[instrument(skip(self))]
    pub async fn sync_movies(&self, force: bool) -> Result<()> {
        let (previous, current) = self.snapshots.watched_movies(force).await?;
        if current.is_empty() {
            debug!("No remote watched movies");
            return Ok(());
        }

        let local_ids: HashSet<i64> = self
            .state
            .movies()
            .await
            .iter()
            .map(|m| m.uids.catalog_id)
            .filter(|id| *id != 0)
            .collect();

        // Only the delta is applied both ways, so local unwatched marks survive
        for movie in diff_watched_movies(&previous, &current, true, &local_ids) {
            self.apply_movie(&movie, true).await;
        }
        for movie in diff_watched_movies(&current, &previous, false, &local_ids) {
            self.apply_movie(&movie, false).await;
        }

        let mut playcounts = Playcounts::load(&self.cache, ListKind::Movies);
        let mut remote_keys = Vec::new();

        for remote in &current {
            remote_keys.extend(tracked_keys(&remote.ids, MediaType::Movie, None, None));

            let Some(local) = self.local_movie(&remote.ids).await else {
                continue;
            };
            let key = file_key(&local.file);
            if playcounts.last_applied.contains_key(&key) && !local.is_watched() {
                continue;
            }
            if !local.is_watched() {
                playcounts.last_applied.insert(key, true);
                self.apply_movie(remote, true).await;
            }
        }
        self.state.set_remote_watched(ListKind::Movies, remote_keys).await;

        if self.sync_watched_back {
            let mut watch = Vec::new();
            let mut unwatch = Vec::new();

            for movie in self.state.movies().await {
                if movie.uids.catalog_id == 0 {
                    continue;
                }
                let key = file_key(&movie.file);
                let keys = tracked_keys(&local_tracked_ids(&movie.uids), MediaType::Movie, None, None);
                let remote_watched = self.state.is_any_remote_watched(&keys).await;
                let local_watched = movie.is_watched();
                if remote_watched == local_watched || playcounts.synced.get(&key) == Some(&local_watched) {
                    continue;
                }

                let update = WatchedUpdate {
                    file_key: key,
                    media_type: MediaType::Movie,
                    catalog_id: movie.uids.catalog_id,
                    season: 0,
                    episode: 0,
                    watched: local_watched,
                    watched_at: local_watched.then(Utc::now),
                };
                if local_watched {
                    watch.push(update);
                } else {
                    unwatch.push(update);
                }
            }

            self.push(unwatch, &mut playcounts).await;
            self.push(watch, &mut playcounts).await;
        }

        playcounts.save(&self.cache, ListKind::Movies);
        self.snapshots.commit_watched_movies(&current)?;
        Ok(())
    }

    async fn apply_movie(&self, remote: &WatchedMovie, watched: bool) {
        let Some(local) = self.local_movie(&remote.ids).await else {
            return;
        };
        let local_id = local.uids.local_id;

        let (playcount, last_played) = if watched {
            if remote.plays == 0 {
                return;
            }
            (local.uids.play_count + 1, remote.last_watched_at)
        } else if local.is_watched() {
            (0, None)
        } else {
            return;
        };

        self.state
            .update_movie(local_id, |m| m.uids.play_count = playcount)
            .await;
        if let Err(e) = self.host.set_movie_watched(local_id, playcount, last_played).await {
            warn!(operation = "set_movie_watched", local_id = local_id, error = %e, "Failed to update movie");
        }
    }

    #[instrument(skip(self))]
    pub async fn sync_shows(&self, force: bool) -> Result<()> {
        let (previous, current) = self.snapshots.watched_shows(force).await?;
        if current.is_empty() {
            debug!("No remote watched shows");
            return Ok(());
        }

        for show in diff_watched_shows(&previous, &current) {
            self.apply_show(&show, true).await;
        }
        for show in diff_watched_shows(&current, &previous) {
            self.apply_show(&show, false).await;
        }

        let mut playcounts = Playcounts::load(&self.cache, ListKind::Shows);
        let mut remote_keys = Vec::new();
        let mut missed: HashSet<u64> = HashSet::new();

        for remote in &current {
            let mut remote = remote.clone();
            let metadata = if remote.ids.catalog_id != 0 {
                match self.catalog.get_show(remote.ids.catalog_id, &self.language).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(operation = "sync_shows", show_id = remote.ids.catalog_id, error = %e, "Failed to fetch show");
                        None
                    }
                }
            } else {
                None
            };

            let mut completed_seasons = 0;
            for season in &remote.seasons {
                if let Some(metadata) = &metadata {
                    let count = metadata.season_episode_count(season.number) as usize;
                    if season.number > 0 && count != 0 && count == season.episodes.len() {
                        completed_seasons += 1;
                        remote_keys.extend(tracked_keys(&remote.ids, MediaType::Season, Some(season.number), None));
                    }
                }
                for episode in &season.episodes {
                    remote_keys.extend(tracked_keys(
                        &remote.ids,
                        MediaType::Episode,
                        Some(season.number),
                        Some(episode.number),
                    ));
                }
            }

            let all_seasons = metadata
                .as_ref()
                .map(|m| m.real_season_count())
                .is_some_and(|real| real != 0 && real == completed_seasons);
            if all_seasons || remote.watched {
                remote.watched = true;
                remote_keys.extend(tracked_keys(&remote.ids, MediaType::Show, None, None));
            }

            let Some(local) = self.local_show(&remote.ids).await else {
                missed.extend(tracked_keys(&remote.ids, MediaType::Show, None, None));
                continue;
            };

            let mut to_run = false;
            for season in &mut remote.seasons {
                for episode in &mut season.episodes {
                    let Some(local_episode) = local.episode(season.number, episode.number) else {
                        missed.extend(tracked_keys(
                            &remote.ids,
                            MediaType::Episode,
                            Some(season.number),
                            Some(episode.number),
                        ));
                        continue;
                    };
                    let key = file_key(&local_episode.file);
                    if playcounts.last_applied.contains_key(&key) && !local_episode.is_watched() {
                        // The user unwatched it locally
                        episode.plays = 0;
                        continue;
                    }
                    if !local_episode.is_watched() {
                        playcounts.last_applied.insert(key, true);
                        to_run = true;
                    }
                }
            }

            let added_after_watch = remote.last_watched_at.is_some_and(|at| local.date_added > at);
            if to_run || added_after_watch {
                self.apply_show(&remote, true).await;
            }
        }
        self.state.set_remote_watched(ListKind::Shows, remote_keys).await;

        if self.sync_watched_back {
            let (watch, unwatch) = self.collect_episode_updates(&playcounts, &missed).await;
            self.push(unwatch, &mut playcounts).await;
            self.push(watch, &mut playcounts).await;
        }

        playcounts.save(&self.cache, ListKind::Shows);
        self.snapshots.commit_watched_shows(&current)?;
        Ok(())
    }

    async fn collect_episode_updates(
        &self,
        playcounts: &Playcounts,
        missed: &HashSet<u64>,
    ) -> (Vec<WatchedUpdate>, Vec<WatchedUpdate>) {
        let mut watch = Vec::new();
        let mut unwatch = Vec::new();

        for show in self.state.shows().await {
            if show.uids.catalog_id == 0 {
                continue;
            }
            let ids = local_tracked_ids(&show.uids);
            let show_keys = tracked_keys(&ids, MediaType::Show, None, None);
            if self.state.is_any_remote_watched(&show_keys).await || show_keys.iter().any(|k| missed.contains(k)) {
                continue;
            }

            for episode in &show.episodes {
                let key = file_key(&episode.file);
                let episode_keys = tracked_keys(&ids, MediaType::Episode, Some(episode.season), Some(episode.episode));
                let season_keys = tracked_keys(&ids, MediaType::Season, Some(episode.season), None);
                let remote_watched = self.state.is_any_remote_watched(&episode_keys).await
                    || self.state.is_any_remote_watched(&season_keys).await;
                let local_watched = episode.is_watched();

                if remote_watched == local_watched || playcounts.synced.get(&key) == Some(&local_watched) {
                    continue;
                }
                if episode_keys.iter().any(|k| missed.contains(k)) {
                    continue;
                }

                let update = WatchedUpdate {
                    file_key: key,
                    media_type: MediaType::Episode,
                    catalog_id: show.uids.catalog_id,
                    season: episode.season,
                    episode: episode.episode,
                    watched: local_watched,
                    watched_at: local_watched.then(Utc::now),
                };
                if local_watched {
                    watch.push(update);
                } else {
                    unwatch.push(update);
                }
            }
        }
        (watch, unwatch)
    }

    async fn apply_show(&self, remote: &WatchedShow, watched: bool) {
        let Some(local) = self.local_show(&remote.ids).await else {
            return;
        };

        if watched && remote.watched && !local.is_watched() {
            let local_id = local.uids.local_id;
            self.state.update_show(local_id, |s| s.uids.play_count = 1).await;
            if let Err(e) = self.host.set_show_watched(local_id, 1, remote.last_watched_at).await {
                warn!(operation = "set_show_watched", local_id = local_id, error = %e, "Failed to update show");
            }
        }

        for season in &remote.seasons {
            for episode in season.episodes.iter().filter(|e| e.plays > 0) {
                let Some(local_episode) = local.episode(season.number, episode.number) else {
                    continue;
                };
                let local_id = local_episode.uids.local_id;
                let (playcount, last_played) = if watched && !local_episode.is_watched() {
                    (1, episode.last_watched_at)
                } else if !watched && local_episode.is_watched() {
                    (0, None)
                } else {
                    continue;
                };

                self.state
                    .update_episode(local_id, |e| e.uids.play_count = playcount)
                    .await;
                if let Err(e) = self.host.set_episode_watched(local_id, playcount, last_played).await {
                    warn!(operation = "set_episode_watched", local_id = local_id, error = %e, "Failed to update episode");
                }
            }
        }
    }

    /// Pushes one batch; on success the keys are recorded as synced.
    async fn push(&self, updates: Vec<WatchedUpdate>, playcounts: &mut Playcounts) {
        if updates.is_empty() {
            return;
        }
        match self.snapshots.tracking().set_watched_batch(&updates).await {
            Ok(()) => {
                info!(count = updates.len(), watched = updates[0].watched, "Pushed watched marks");
                for update in &updates {
                    if !update.watched {
                        playcounts.last_applied.remove(&update.file_key);
                    }
                    playcounts.synced.insert(update.file_key, update.watched);
                }
            }
            Err(e) => {
                warn!(operation = "set_watched_batch", count = updates.len(), error = %e, "Failed to push watched marks");
            }
        }
    }

    /// Applies remote paused progress to the media center, returning how many items were updated.
    #[instrument(skip(self))]
    pub async fn sync_paused(&self, kind: ListKind) -> Result<usize> {
        let cache_key = format!("paused.last_updates.{}", kind);
        let mut last_updates: HashMap<i64, DateTime<Utc>> = self.cache.get(&cache_key).unwrap_or_default();
        let is_stale = |last_updates: &HashMap<i64, DateTime<Utc>>, id: i64, paused_at: DateTime<Utc>| {
            last_updates.get(&id).is_some_and(|last| *last >= paused_at)
        };
        let mut applied = 0;

        match kind {
            ListKind::Movies => {
                for paused in self.snapshots.tracking().paused_movies().await? {
                    if paused.ids.catalog_id == 0 || paused.progress <= 0.0 || paused.runtime_minutes == 0 {
                        continue;
                    }
                    let Some(local) = self.state.movie_by_catalog_id(paused.ids.catalog_id).await else {
                        continue;
                    };
                    if is_stale(&last_updates, paused.ids.tracking_id, paused.paused_at) {
                        continue;
                    }
                    last_updates.insert(paused.ids.tracking_id, paused.paused_at);

                    let (position, total) = progress_position(paused.runtime_minutes, paused.progress);
                    let local_id = local.uids.local_id;
                    self.state
                        .update_movie(local_id, |m| m.resume = Resume { position, total })
                        .await;
                    match self.host.set_movie_progress(local_id, position, total, paused.paused_at).await {
                        Ok(()) => applied += 1,
                        Err(e) => warn!(operation = "set_movie_progress", local_id = local_id, error = %e, "Failed to set progress"),
                    }
                }
            }
            ListKind::Shows => {
                for paused in self.snapshots.tracking().paused_episodes().await? {
                    if paused.show_ids.catalog_id == 0 || paused.progress <= 0.0 || paused.runtime_minutes == 0 {
                        continue;
                    }
                    let Some(show) = self.state.show_by_catalog_id(paused.show_ids.catalog_id).await else {
                        continue;
                    };
                    let Some(episode) = show.episode(paused.season, paused.number) else {
                        continue;
                    };
                    if is_stale(&last_updates, paused.episode_tracking_id, paused.paused_at) {
                        continue;
                    }
                    last_updates.insert(paused.episode_tracking_id, paused.paused_at);

                    let (position, total) = progress_position(paused.runtime_minutes, paused.progress);
                    let local_id = episode.uids.local_id;
                    self.state
                        .update_episode(local_id, |e| e.resume = Resume { position, total })
                        .await;
                    match self.host.set_episode_progress(local_id, position, total, paused.paused_at).await {
                        Ok(()) => applied += 1,
                        Err(e) => warn!(operation = "set_episode_progress", local_id = local_id, error = %e, "Failed to set progress"),
                    }
                }
            }
        }

        if let Err(e) = self.cache.set(&cache_key, &last_updates, PAUSED_TTL) {
            warn!(operation = "sync_paused", error = %e, "Failed to store paused update times");
        }
        Ok(applied)
    }
}
