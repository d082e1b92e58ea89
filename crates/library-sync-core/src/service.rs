//! Application root: builds every component once and exposes the library
//! operations the daemon and the CLI run.

use anyhow::Context;
use async_trait::async_trait;
use library_sync_config::{Config, LibraryUpdate, PathManager};
use library_sync_models::{BtItem, ItemState, ListKind, MediaType, MovieMetadata, ShowMetadata};
use library_sync_sources::{CatalogClient, MediaCenterHost, TrackingClient};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use crate::cache::PersistedCache;
use crate::database::ItemDatabase;
use crate::duplicates::{DuplicateDetector, DuplicateStats};
use crate::error::{LibraryError, Result};
use crate::index::LibraryState;
use crate::ingest::LibraryIngest;
use crate::orchestrator::{ListSync, ListSyncResult};
use crate::placeholder::PlaceholderWriter;
use crate::reconcile::WatchedReconciler;
use crate::removal::RemovalDebouncer;
use crate::scheduler::{RefreshHandler, RefreshScheduler};
use crate::snapshot::{ListId, SnapshotStore};
use crate::status::{RefreshCategory, RefreshStatus};
use crate::tracking_sync::{TrackingSync, TrackingSyncReport};

const NOTIFY_TITLE: &str = "strmsync";

/// The external systems the library talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogClient>,
    pub tracking: Arc<dyn TrackingClient>,
    pub host: Arc<dyn MediaCenterHost>,
}

pub struct LibraryService {
    config: Config,
    host: Arc<dyn MediaCenterHost>,
    state: Arc<LibraryState>,
    db: Arc<ItemDatabase>,
    writer: Arc<PlaceholderWriter>,
    duplicates: Arc<DuplicateDetector>,
    lists: Arc<ListSync>,
    tracking_sync: Arc<TrackingSync>,
    ingest: LibraryIngest,
    status: Arc<RefreshStatus>,
    debouncer: Mutex<Option<RemovalDebouncer>>,
}

impl LibraryService {
    /// Opens the item database and cache under the data directory.
    pub fn open(config: Config, paths: &PathManager, collaborators: Collaborators) -> anyhow::Result<Self> {
        paths.ensure_directories()?;
        let db = ItemDatabase::open(&paths.database_file())
            .with_context(|| format!("Failed to open database {:?}", paths.database_file()))?;
        let cache = PersistedCache::open(paths.cache_file());
        Ok(Self::with_storage(config, collaborators, Arc::new(db), Arc::new(cache)))
    }

    pub fn with_storage(
        config: Config,
        collaborators: Collaborators,
        db: Arc<ItemDatabase>,
        cache: Arc<PersistedCache>,
    ) -> Self {
        let Collaborators { catalog, tracking, host } = collaborators;
        let library = config.library.clone();

        let state = Arc::new(LibraryState::new());
        let duplicates = Arc::new(DuplicateDetector::new(state.clone(), library.addon_uid_key.clone()));
        let (removals, debouncer) = RemovalDebouncer::channel();
        let writer = Arc::new(
            PlaceholderWriter::new(library.clone(), catalog.clone(), db.clone(), state.clone(), duplicates.clone())
                .with_removals(removals),
        );
        let snapshots = Arc::new(SnapshotStore::new(cache.clone(), tracking));
        let lists = Arc::new(ListSync::new(
            writer.clone(),
            snapshots.clone(),
            catalog.clone(),
            host.clone(),
            cache.clone(),
            config.trakt.clone(),
        ));
        let reconciler = Arc::new(WatchedReconciler::new(
            host.clone(),
            state.clone(),
            snapshots.clone(),
            catalog,
            cache.clone(),
            &library,
            &config.trakt,
        ));
        let tracking_sync = Arc::new(TrackingSync::new(
            lists.clone(),
            reconciler,
            snapshots,
            host.clone(),
            state.clone(),
            cache,
            config.trakt.clone(),
        ));
        let ingest = LibraryIngest::new(host.clone(), state.clone(), library.addon_uid_key);

        Self {
            config,
            host,
            state,
            db,
            writer,
            duplicates,
            lists,
            tracking_sync,
            ingest,
            status: Arc::new(RefreshStatus::new()),
            debouncer: Mutex::new(Some(debouncer)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &Arc<LibraryState> {
        &self.state
    }

    pub fn database(&self) -> &Arc<ItemDatabase> {
        &self.db
    }

    pub fn status(&self) -> &Arc<RefreshStatus> {
        &self.status
    }

    pub fn ingest(&self) -> &LibraryIngest {
        &self.ingest
    }

    /// Spawns the removed-episode debouncer and the refresh scheduler.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(2);
        let debouncer = self
            .debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match debouncer {
            Some(debouncer) => tasks.push(debouncer.spawn(self.writer.clone(), self.host.clone(), shutdown.clone())),
            None => warn!("Library service was already started"),
        }

        let handler: Arc<dyn RefreshHandler> = self.clone();
        let scheduler = RefreshScheduler::new(handler, self.status.clone(), self.config.scheduler.clone());
        tasks.push(scheduler.spawn(shutdown));
        tasks
    }

    // Lists and tracking

    pub async fn sync_list(&self, list: &ListId, kind: ListKind, force: bool) -> Result<ListSyncResult> {
        self.lists.sync_list(list, kind, false, force).await
    }

    pub async fn sync_tracking(&self, force: bool) -> Result<TrackingSyncReport> {
        self.tracking_sync.run(force).await
    }

    // Single items

    #[instrument(skip(self))]
    pub async fn add_movie(&self, catalog_id: i64, force: bool) -> Result<MovieMetadata> {
        if !force && self.duplicates.is_duplicate_movie(catalog_id).await {
            let title = self
                .state
                .movie_by_catalog_id(catalog_id)
                .await
                .map(|m| m.title)
                .unwrap_or_else(|| format!("movie {}", catalog_id));
            self.notify(&format!("{} is already in the library", title)).await;
            return Err(LibraryError::AlreadyExists(title));
        }

        let movie = self.writer.write_movie(catalog_id, force).await?;
        self.db.save_items(&[catalog_id], ItemState::Active, MediaType::Movie, 0)?;
        info!(catalog_id = catalog_id, title = %movie.title, "Movie added to library");
        self.scan(self.writer.movies_dir().ok().as_deref()).await;
        Ok(movie)
    }

    #[instrument(skip(self))]
    pub async fn add_show(&self, catalog_id: i64, force: bool) -> Result<ShowMetadata> {
        if !force && self.duplicates.is_duplicate_show(catalog_id).await {
            let title = self
                .state
                .show_by_catalog_id(catalog_id)
                .await
                .map(|s| s.title)
                .unwrap_or_else(|| format!("show {}", catalog_id));
            self.notify(&format!("{} is already in the library", title)).await;
            return Err(LibraryError::AlreadyExists(title));
        }

        let show = self.writer.write_show(catalog_id, true, force).await?;
        self.db.save_items(&[catalog_id], ItemState::Active, MediaType::Show, 0)?;
        info!(catalog_id = catalog_id, name = %show.name, "Show added to library");
        self.scan(self.writer.shows_dir().ok().as_deref()).await;
        Ok(show)
    }

    #[instrument(skip(self))]
    pub async fn remove_movie(&self, catalog_id: i64, purge: bool) -> Result<Vec<PathBuf>> {
        let local = self.state.movie_by_catalog_id(catalog_id).await;
        let paths = self.writer.remove_movie(catalog_id, purge).await?;
        self.clean_paths(&paths, ListKind::Movies).await;
        if let Some(local) = local {
            if let Err(e) = self.host.remove_movie(local.uids.local_id).await {
                warn!(operation = "remove_movie", local_id = local.uids.local_id, error = %e, "Host removal failed");
            }
        }
        Ok(paths)
    }

    #[instrument(skip(self))]
    pub async fn remove_show(&self, catalog_id: i64, purge: bool) -> Result<Vec<PathBuf>> {
        let local = self.state.show_by_catalog_id(catalog_id).await;
        let paths = self.writer.remove_show(catalog_id, purge).await?;
        self.clean_paths(&paths, ListKind::Shows).await;
        if let Some(local) = local {
            if let Err(e) = self.host.remove_show(local.uids.local_id).await {
                warn!(operation = "remove_show", local_id = local.uids.local_id, error = %e, "Host removal failed");
            }
        }
        Ok(paths)
    }

    pub async fn remove_episode(&self, episode_id: i64, show_id: i64, season: u32, episode: u32) -> Result<()> {
        self.writer.remove_episode(episode_id, show_id, season, episode).await
    }

    // Maintenance

    pub async fn duplicate_stats(&self) -> DuplicateStats {
        self.duplicates.duplicate_stats().await
    }

    /// Deletes duplicate placeholders and their stale host entries.
    #[instrument(skip(self))]
    pub async fn remove_duplicates(&self) -> DuplicateStats {
        let start = Instant::now();
        let mut stats = DuplicateStats::default();

        for movie in self.duplicates.find_duplicate_movies().await {
            let Some(dir) = movie.file.parent() else {
                continue;
            };
            if self.remove_duplicate_path(dir, ListKind::Movies).await {
                self.remove_from_host(MediaType::Movie, movie.uids.local_id).await;
                stats.movies += 1;
            }
        }

        for show in self.duplicates.find_duplicate_shows().await {
            let mut removed = false;
            for dir in show.placeholder_dirs() {
                removed |= self.remove_duplicate_path(&dir, ListKind::Shows).await;
            }
            if removed {
                self.remove_from_host(MediaType::Show, show.uids.local_id).await;
                stats.shows += 1;
            }
        }

        for episode in self.duplicates.find_duplicate_episodes().await {
            if self.remove_duplicate_path(&episode.file, ListKind::Shows).await {
                self.remove_from_host(MediaType::Episode, episode.uids.local_id).await;
                stats.episodes += 1;
            }
        }

        info!(
            operation = "remove_duplicates_complete",
            movies = stats.movies,
            shows = stats.shows,
            episodes = stats.episodes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Duplicate cleanup finished"
        );
        if stats.total() > 0 {
            self.status.request(RefreshCategory::Overall);
            self.notify(&format!("Removed {} duplicates from the library", stats.total()))
                .await;
        }
        stats
    }

    async fn remove_duplicate_path(&self, path: &Path, kind: ListKind) -> bool {
        let is_dir = path.is_dir();
        let removed = if is_dir {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        if let Err(e) = removed {
            warn!(operation = "remove_duplicates", path = ?path, error = %e, "Failed to remove duplicate");
            return false;
        }
        debug!(path = ?path, "Removed duplicate");
        let clean_dir = if is_dir { path } else { path.parent().unwrap_or(path) };
        if let Err(e) = self.host.clean_library(Some(clean_dir), kind.host_content()).await {
            warn!(operation = "remove_duplicates", path = ?path, error = %e, "Library clean failed");
        }
        true
    }

    async fn remove_from_host(&self, media_type: MediaType, local_id: i64) {
        let result = match media_type {
            MediaType::Movie => self.host.remove_movie(local_id).await,
            MediaType::Show => self.host.remove_show(local_id).await,
            _ => self.host.remove_episode(local_id).await,
        };
        if let Err(e) = result {
            warn!(operation = "remove_from_host", local_id = local_id, error = %e, "Host removal failed");
        }
    }

    /// Rewrites the placeholders of every active show to pick up new episodes.
    #[instrument(skip(self))]
    pub async fn update_library_shows(&self) -> Result<usize> {
        let start = Instant::now();
        let shows = self.db.items_by_state(MediaType::Show, ItemState::Active)?;
        let mut updated = 0;

        for item in &shows {
            match self.writer.write_show(item.id, false, false).await {
                Ok(_) => updated += 1,
                Err(e) if e.is_video_removed() => debug!(show_id = item.id, "Show was removed, skipping"),
                Err(e) => warn!(operation = "update_library_shows", show_id = item.id, error = %e, "Failed to update show"),
            }
        }

        info!(
            operation = "update_library_shows_complete",
            shows = shows.len(),
            updated = updated,
            duration_ms = start.elapsed().as_millis() as u64,
            "Library shows updated"
        );
        self.status.request(RefreshCategory::Kodi);
        Ok(updated)
    }

    /// Purges soft-deleted torrent items, removing library duplicates they left behind.
    pub async fn sweep_deleted_items(&self) -> Result<usize> {
        let items = self.db.deleted_bt_items()?;
        for item in &items {
            if self.is_duplicate_item(item).await {
                self.remove_item(item).await;
            }
            self.db.delete_bt_item(&item.info_hash)?;
        }
        if !items.is_empty() {
            debug!(count = items.len(), "Swept deleted torrent items");
        }
        Ok(items.len())
    }

    async fn is_duplicate_item(&self, item: &BtItem) -> bool {
        match item.media_type {
            MediaType::Movie => self.duplicates.is_duplicate_movie(item.catalog_id).await,
            MediaType::Episode => {
                self.duplicates
                    .is_duplicate_episode(item.show_id, item.season, item.episode)
                    .await
            }
            _ => false,
        }
    }

    async fn remove_item(&self, item: &BtItem) {
        let result = match item.media_type {
            MediaType::Movie => self.remove_movie(item.catalog_id, false).await.map(|_| ()),
            _ => {
                self.remove_episode(item.catalog_id, item.show_id, item.season, item.episode)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(operation = "sweep_deleted_items", info_hash = %item.info_hash, error = %e, "Failed to remove item");
        }
    }

    // Refreshes

    /// Runs one refresh category now.
    #[instrument(skip(self))]
    pub async fn refresh(&self, category: RefreshCategory) -> anyhow::Result<()> {
        if !self.config.library.sync_during_playback && self.host.is_playing().await.unwrap_or(false) {
            debug!(category = %category, "Skipping refresh during playback");
            return Ok(());
        }

        match category {
            RefreshCategory::Kodi => {
                self.ingest.refresh_all().await?;
            }
            RefreshCategory::Movies => {
                self.ingest.refresh_movies().await?;
            }
            RefreshCategory::Shows | RefreshCategory::Episodes => {
                self.ingest.refresh_shows().await?;
            }
            RefreshCategory::Trakt => {
                if self.tracking_enabled().await {
                    self.tracking_sync.run(false).await.context("Tracking refresh failed")?;
                }
            }
            RefreshCategory::KodiShows => {
                self.update_library_shows().await?;
            }
            RefreshCategory::Overall => {
                self.ingest.refresh_all().await?;
                if self.tracking_enabled().await {
                    self.tracking_sync.run(true).await.context("Tracking refresh failed")?;
                }
            }
        }
        Ok(())
    }

    async fn tracking_enabled(&self) -> bool {
        let trakt = &self.config.trakt;
        if !trakt.enabled || !trakt.sync_enabled {
            return false;
        }
        if !self.tracking_sync.is_authenticated().await {
            debug!("Tracking service is not authorized");
            return false;
        }
        true
    }

    // Host helpers

    async fn scan(&self, dir: Option<&Path>) {
        if self.config.library.library_update == LibraryUpdate::Never {
            return;
        }
        if let Err(e) = self.host.scan_library(dir).await {
            warn!(operation = "library_scan", error = %e, "Library scan failed");
        }
    }

    async fn clean_paths(&self, paths: &[PathBuf], kind: ListKind) {
        for path in paths {
            if let Err(e) = self.host.clean_library(Some(path), kind.host_content()).await {
                warn!(operation = "library_clean", path = ?path, error = %e, "Library clean failed");
            }
        }
    }

    async fn notify(&self, message: &str) {
        if let Err(e) = self.host.notify(NOTIFY_TITLE, message).await {
            warn!(operation = "notify", error = %e, "Notification failed");
        }
    }
}

#[async_trait]
impl RefreshHandler for LibraryService {
    async fn refresh(&self, category: RefreshCategory) -> anyhow::Result<()> {
        LibraryService::refresh(self, category).await
    }

    async fn sweep(&self) -> anyhow::Result<()> {
        self.sweep_deleted_items().await?;
        Ok(())
    }
}
