use chrono::{DateTime, Utc};
use library_sync_config::{LibraryUpdate, TraktConfig};
use library_sync_models::{ExternalSource, ItemState, ListItem, ListKind, MediaType};
use library_sync_sources::{CatalogClient, MediaCenterHost};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use crate::cache::{PersistedCache, SHOW_LAST_UPDATES_TTL};
use crate::diff::diff_list;
use crate::error::Result;
use crate::placeholder::PlaceholderWriter;
use crate::snapshot::{ListId, SnapshotStore};

const SHOW_LAST_UPDATES_KEY: &str = "library.shows.last_updates";

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListSyncResult {
    /// Catalog IDs that got placeholders this run
    pub added: Vec<i64>,
    pub removed: usize,
    pub skipped: usize,
    #[serde(skip)]
    pub duration: Duration,
}

/// Applies tracking-service list changes to the local library.
pub struct ListSync {
    writer: Arc<PlaceholderWriter>,
    snapshots: Arc<SnapshotStore>,
    catalog: Arc<dyn CatalogClient>,
    host: Arc<dyn MediaCenterHost>,
    cache: Arc<PersistedCache>,
    trakt: TraktConfig,
}

impl ListSync {
    pub fn new(
        writer: Arc<PlaceholderWriter>,
        snapshots: Arc<SnapshotStore>,
        catalog: Arc<dyn CatalogClient>,
        host: Arc<dyn MediaCenterHost>,
        cache: Arc<PersistedCache>,
        trakt: TraktConfig,
    ) -> Self {
        Self {
            writer,
            snapshots,
            catalog,
            host,
            cache,
            trakt,
        }
    }

    /// Syncs one list into the library.
    ///
    /// `is_background` suppresses the rescan prompt and skips soft-deleted
    /// items; `is_forced_refresh` bypasses the fresh-snapshot cache and
    /// rewrites shows already in the library.
    #[instrument(skip(self))]
    pub async fn sync_list(
        &self,
        list: &ListId,
        kind: ListKind,
        is_background: bool,
        is_forced_refresh: bool,
    ) -> Result<ListSyncResult> {
        let start = Instant::now();
        match kind {
            ListKind::Movies => self.writer.movies_dir()?,
            ListKind::Shows => self.writer.shows_dir()?,
        };

        let (previous, current) = self
            .snapshots
            .list_snapshots(list, kind, is_forced_refresh)
            .await?;

        let state = self.writer.state();
        let (added, removed) = if state.is_tracking_initialized() {
            let local: HashSet<i64> = state
                .all(kind.media_type())
                .await
                .into_iter()
                .map(|u| u.catalog_id)
                .collect();
            let in_library = |item: &ListItem| local.contains(&item.ids.catalog_id);
            (
                diff_list(&previous, &current, true, in_library),
                diff_list(&current, &previous, true, in_library),
            )
        } else {
            // First run writes the whole list
            (current.clone(), Vec::new())
        };

        info!(
            operation = "sync_list_start",
            list = %list,
            kind = %kind,
            added = added.len(),
            removed = removed.len(),
            "Syncing list"
        );

        let mut result = ListSyncResult::default();
        let media_type = kind.media_type();
        let mut show_updates: HashMap<i64, DateTime<Utc>> = match kind {
            ListKind::Shows => self.cache.get(SHOW_LAST_UPDATES_KEY).unwrap_or_default(),
            ListKind::Movies => HashMap::new(),
        };

        for item in &added {
            let Some(catalog_id) = self.resolve_catalog_id(item, media_type).await else {
                warn!("Missing catalog ID for {}", item.title);
                result.skipped += 1;
                continue;
            };

            if is_background && self.was_removed(catalog_id, media_type) {
                result.skipped += 1;
                continue;
            }

            let written = match kind {
                ListKind::Movies => {
                    if self.writer.duplicates().is_duplicate_movie(catalog_id).await {
                        result.skipped += 1;
                        continue;
                    }
                    self.writer.write_movie(catalog_id, false).await.map(|_| ())
                }
                ListKind::Shows => {
                    let is_duplicate = self.writer.duplicates().is_duplicate_show(catalog_id).await;
                    let unchanged = match (show_updates.get(&item.ids.tracking_id), item.updated_at) {
                        (Some(last), Some(updated)) => *last >= updated,
                        _ => false,
                    };
                    if let Some(updated) = item.updated_at {
                        show_updates.insert(item.ids.tracking_id, updated);
                    }
                    if is_duplicate && (unchanged || !is_forced_refresh) {
                        result.skipped += 1;
                        continue;
                    }
                    self.writer.write_show(catalog_id, false, false).await.map(|_| ())
                }
            };

            match written {
                Ok(()) => result.added.push(catalog_id),
                Err(e) if e.is_video_removed() => {
                    debug!(catalog_id = catalog_id, "Skipping item removed by the user");
                    result.skipped += 1;
                }
                Err(e) => {
                    warn!(operation = "sync_list", catalog_id = catalog_id, error = %e, "Failed to write placeholders");
                    result.skipped += 1;
                }
            }
        }

        if kind == ListKind::Shows {
            let listed: HashSet<i64> = added.iter().map(|i| i.ids.tracking_id).collect();
            show_updates.retain(|tracking_id, _| listed.contains(tracking_id));
            if let Err(e) = self.cache.set(SHOW_LAST_UPDATES_KEY, &show_updates, SHOW_LAST_UPDATES_TTL) {
                warn!(operation = "sync_list", error = %e, "Failed to store show update times");
            }
        }

        self.writer
            .db()
            .save_items(&result.added, ItemState::Active, media_type, 0)?;

        let sync_back = match kind {
            ListKind::Movies => self.trakt.sync_removed_movies_back,
            ListKind::Shows => self.trakt.sync_removed_shows_back,
        };
        if sync_back && !removed.is_empty() {
            result.removed = self.remove_back(&removed, kind).await;
            info!("{} list ({}) removed {} items", kind, list, result.removed);
        }

        if !is_background && !result.added.is_empty() {
            info!("{} list ({}) added {} items", kind, list, result.added.len());
            self.request_rescan(list).await;
        }

        self.snapshots.commit_list(list, kind, &current)?;

        result.duration = start.elapsed();
        info!(
            operation = "sync_list_complete",
            duration_ms = result.duration.as_millis(),
            added = result.added.len(),
            "List sync completed"
        );
        Ok(result)
    }

    /// Fills in a missing catalog ID from the legacy ID, then the external database ID for shows.
    async fn resolve_catalog_id(&self, item: &ListItem, media_type: MediaType) -> Option<i64> {
        if item.ids.catalog_id != 0 {
            return Some(item.ids.catalog_id);
        }

        let mut candidates = Vec::new();
        if !item.ids.external_legacy_id.is_empty() {
            candidates.push((item.ids.external_legacy_id.clone(), ExternalSource::Legacy));
        }
        if media_type == MediaType::Show && item.ids.external_db_id != 0 {
            candidates.push((item.ids.external_db_id.to_string(), ExternalSource::ExternalDb));
        }

        for (external_id, source) in candidates {
            match self.catalog.resolve_external_id(&external_id, source, media_type).await {
                Ok(Some(id)) if id != 0 => return Some(id),
                Ok(_) => {}
                Err(e) => {
                    warn!(operation = "resolve_external_id", external_id = %external_id, error = %e, "Lookup failed");
                }
            }
        }
        None
    }

    fn was_removed(&self, catalog_id: i64, media_type: MediaType) -> bool {
        match self.writer.db().was_removed(catalog_id, media_type) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(operation = "sync_list", catalog_id = catalog_id, error = %e, "Failed to read library record");
                false
            }
        }
    }

    /// Removes items dropped from the list from the library and the media center.
    async fn remove_back(&self, removed: &[ListItem], kind: ListKind) -> usize {
        let state = self.writer.state();
        let mut count = 0;

        for item in removed {
            let catalog_id = item.ids.catalog_id;
            let (local_id, paths) = match kind {
                ListKind::Movies => {
                    let Some(local) = state.movie_by_catalog_id(catalog_id).await else {
                        continue;
                    };
                    (local.uids.local_id, self.writer.remove_movie(catalog_id, true).await)
                }
                ListKind::Shows => {
                    let Some(local) = state.show_by_catalog_id(catalog_id).await else {
                        continue;
                    };
                    (local.uids.local_id, self.writer.remove_show(catalog_id, true).await)
                }
            };

            let paths = match paths {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(operation = "sync_removed_back", catalog_id = catalog_id, error = %e, "Could not remove from library");
                    continue;
                }
            };

            for path in &paths {
                if let Err(e) = self.host.clean_library(Some(path), kind.host_content()).await {
                    warn!(operation = "sync_removed_back", path = ?path, error = %e, "Library clean failed");
                }
            }
            let removal = match kind {
                ListKind::Movies => self.host.remove_movie(local_id).await,
                ListKind::Shows => self.host.remove_show(local_id).await,
            };
            if let Err(e) = removal {
                warn!(operation = "sync_removed_back", local_id = local_id, error = %e, "Host removal failed");
            }
            count += 1;
        }
        count
    }

    async fn request_rescan(&self, list: &ListId) {
        let scan = match self.writer.config().library_update {
            LibraryUpdate::Always => true,
            LibraryUpdate::Never => false,
            LibraryUpdate::Ask => {
                let message = format!("New items were added from your {}. Update the library now?", list_label(list));
                match self.host.confirm_dialog("Library", &message).await {
                    Ok(confirmed) => confirmed,
                    Err(e) => {
                        warn!(operation = "library_update", error = %e, "Confirm dialog failed");
                        false
                    }
                }
            }
        };
        if scan {
            if let Err(e) = self.host.scan_library(None).await {
                warn!(operation = "library_update", error = %e, "Library scan failed");
            }
        }
    }
}

fn list_label(list: &ListId) -> &'static str {
    match list {
        ListId::Watchlist => "watchlist",
        ListId::Collection => "collection",
        ListId::Custom(_) => "list",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ItemDatabase;
    use crate::duplicates::DuplicateDetector;
    use crate::index::LibraryState;
    use crate::testing::{create_list_item, create_movie, test_config, FakeCatalog, FakeHost, FakeTracking};
    use library_sync_config::LibraryConfig;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: LibraryConfig,
        sync: ListSync,
        tracking: Arc<FakeTracking>,
        host: Arc<FakeHost>,
        state: Arc<LibraryState>,
        db: Arc<ItemDatabase>,
        snapshots: Arc<SnapshotStore>,
    }

    fn create_catalog() -> FakeCatalog {
        FakeCatalog::new()
            .with_movie(100, "First", "2001-01-01")
            .with_movie(200, "Second", "2002-01-01")
            .with_movie(300, "Third", "2003-01-01")
            .with_movie(555, "Resolved", "2005-01-01")
            .with_external("tt555", 555)
    }

    fn create_sync(update: LibraryUpdate, trakt: TraktConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.library_update = update;

        let catalog: Arc<dyn CatalogClient> = Arc::new(create_catalog());
        let tracking = Arc::new(FakeTracking::new());
        let host = Arc::new(FakeHost::new().confirming(false));
        let state = Arc::new(LibraryState::new());
        let db = Arc::new(ItemDatabase::open_in_memory().unwrap());
        let cache = Arc::new(PersistedCache::in_memory());
        let duplicates = Arc::new(DuplicateDetector::new(state.clone(), config.addon_uid_key.clone()));
        let writer = Arc::new(PlaceholderWriter::new(
            config.clone(),
            catalog.clone(),
            db.clone(),
            state.clone(),
            duplicates,
        ));
        let snapshots = Arc::new(SnapshotStore::new(cache.clone(), tracking.clone()));
        let sync = ListSync::new(writer, snapshots.clone(), catalog, host.clone(), cache, trakt);

        Fixture {
            _dir: dir,
            config,
            sync,
            tracking,
            host,
            state,
            db,
            snapshots,
        }
    }

    fn movie_dirs(config: &LibraryConfig) -> usize {
        std::fs::read_dir(config.movies_path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_bootstrap_imports_whole_list() {
        let fixture = create_sync(LibraryUpdate::Always, TraktConfig::default());
        fixture.tracking.set_watchlist(
            ListKind::Movies,
            vec![create_list_item(10, 100), create_list_item(20, 200), create_list_item(30, 300)],
        );

        let result = fixture
            .sync
            .sync_list(&ListId::Watchlist, ListKind::Movies, false, false)
            .await
            .unwrap();

        assert_eq!(result.added, vec![100, 200, 300]);
        assert_eq!(result.removed, 0);
        assert_eq!(movie_dirs(&fixture.config), 3);
        assert_eq!(fixture.db.items_by_state(MediaType::Movie, ItemState::Active).unwrap().len(), 3);
        assert_eq!(fixture.host.calls(), vec!["scan_library".to_string()]);
    }

    #[tokio::test]
    async fn test_incremental_delta_removes_back() {
        let trakt = TraktConfig {
            sync_removed_movies_back: true,
            ..TraktConfig::default()
        };
        let fixture = create_sync(LibraryUpdate::Never, trakt);
        fixture.state.set_tracking_initialized(true);

        let second_dir = fixture.config.movies_path().join("Second (2002)");
        std::fs::create_dir_all(&second_dir).unwrap();
        let second_file = second_dir.join("Second (2002).strm");
        std::fs::write(&second_file, "x").unwrap();
        fixture
            .state
            .replace_movies(vec![create_movie(7, 200, second_file.to_str().unwrap())])
            .await;

        fixture
            .snapshots
            .commit_list(&ListId::Watchlist, ListKind::Movies, &[create_list_item(10, 100), create_list_item(20, 200)])
            .unwrap();
        fixture
            .tracking
            .set_watchlist(ListKind::Movies, vec![create_list_item(10, 100), create_list_item(30, 300)]);

        let result = fixture
            .sync
            .sync_list(&ListId::Watchlist, ListKind::Movies, false, false)
            .await
            .unwrap();

        assert_eq!(result.added, vec![300]);
        assert_eq!(result.removed, 1);
        assert!(fixture.config.movies_path().join("Third (2003)/Third (2003).strm").exists());
        assert!(!fixture.config.movies_path().join("First (2001)").exists());
        assert!(!second_dir.exists());
        assert!(fixture.db.item(200, MediaType::Movie).unwrap().is_none());
        assert_eq!(
            fixture.host.calls(),
            vec!["clean_library".to_string(), "remove_movie:7".to_string()]
        );

        // The current snapshot is the next cycle's previous
        let again = fixture
            .sync
            .sync_list(&ListId::Watchlist, ListKind::Movies, false, false)
            .await
            .unwrap();
        assert!(again.added.is_empty());
        assert_eq!(again.removed, 0);
    }

    #[tokio::test]
    async fn test_missing_catalog_id_is_resolved_or_skipped() {
        let fixture = create_sync(LibraryUpdate::Never, TraktConfig::default());
        let mut resolvable = create_list_item(50, 0);
        resolvable.ids.external_legacy_id = "tt555".to_string();
        let unknown = create_list_item(60, 0);
        fixture.tracking.set_watchlist(ListKind::Movies, vec![resolvable, unknown]);

        let result = fixture
            .sync
            .sync_list(&ListId::Watchlist, ListKind::Movies, false, false)
            .await
            .unwrap();

        assert_eq!(result.added, vec![555]);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn test_background_skips_removed_and_rescan() {
        let fixture = create_sync(LibraryUpdate::Always, TraktConfig::default());
        fixture
            .db
            .save_items(&[100], ItemState::Deleted, MediaType::Movie, 0)
            .unwrap();
        fixture
            .tracking
            .set_watchlist(ListKind::Movies, vec![create_list_item(10, 100), create_list_item(20, 200)]);

        let result = fixture
            .sync
            .sync_list(&ListId::Watchlist, ListKind::Movies, true, false)
            .await
            .unwrap();

        assert_eq!(result.added, vec![200]);
        assert!(fixture.host.calls().is_empty());
        assert!(fixture.db.was_removed(100, MediaType::Movie).unwrap());
    }

    #[tokio::test]
    async fn test_ask_declined_does_not_scan() {
        let fixture = create_sync(LibraryUpdate::Ask, TraktConfig::default());
        fixture
            .tracking
            .set_watchlist(ListKind::Movies, vec![create_list_item(10, 100)]);

        fixture
            .sync
            .sync_list(&ListId::Watchlist, ListKind::Movies, false, false)
            .await
            .unwrap();

        assert_eq!(fixture.host.dialogs().len(), 1);
        assert!(fixture.host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tracking_error_aborts_without_commit() {
        let fixture = create_sync(LibraryUpdate::Never, TraktConfig::default());
        fixture.tracking.set_failing(true);

        let err = fixture
            .sync
            .sync_list(&ListId::Collection, ListKind::Movies, false, true)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::LibraryError::RemoteService(_)));

        fixture.tracking.set_failing(false);
        let (previous, _) = fixture
            .snapshots
            .list_snapshots(&ListId::Collection, ListKind::Movies, true)
            .await
            .unwrap();
        assert!(previous.is_empty());
    }
}
