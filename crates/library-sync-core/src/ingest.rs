use library_sync_models::{Show, UniqueIds};
use library_sync_sources::MediaCenterHost;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use crate::error::Result;
use crate::index::LibraryState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub movies: usize,
    pub shows: usize,
    pub episodes: usize,
    /// Local IDs not seen by the previous ingest
    pub added: usize,
    pub removed: usize,
}

impl IngestReport {
    fn merge(self, other: IngestReport) -> IngestReport {
        IngestReport {
            movies: self.movies + other.movies,
            shows: self.shows + other.shows,
            episodes: self.episodes + other.episodes,
            added: self.added + other.added,
            removed: self.removed + other.removed,
        }
    }
}

/// Loads the media center's library into the [`LibraryState`].
pub struct LibraryIngest {
    host: Arc<dyn MediaCenterHost>,
    state: Arc<LibraryState>,
    addon_uid_key: String,
}

impl LibraryIngest {
    pub fn new(host: Arc<dyn MediaCenterHost>, state: Arc<LibraryState>, addon_uid_key: String) -> Self {
        Self {
            host,
            state,
            addon_uid_key,
        }
    }

    #[instrument(skip(self))]
    pub async fn refresh_movies(&self) -> Result<IngestReport> {
        let start = Instant::now();
        let mut movies = self.host.library_movies().await?;
        for movie in &mut movies {
            self.fill_catalog_id(movie.media_center.as_ref().and_then(|m| m.addon_uid(&self.addon_uid_key)), &mut movie.uids);
        }

        let before: HashSet<i64> = self.state.movies().await.iter().map(|m| m.uids.local_id).collect();
        let after: HashSet<i64> = movies.iter().map(|m| m.uids.local_id).collect();
        let report = IngestReport {
            movies: movies.len(),
            added: after.difference(&before).count(),
            removed: before.difference(&after).count(),
            ..IngestReport::default()
        };

        self.state.replace_movies(movies).await;
        self.flag_changes(&report);
        info!(
            operation = "refresh_movies_complete",
            movies = report.movies,
            added = report.added,
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded movies from the media center"
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn refresh_shows(&self) -> Result<IngestReport> {
        let start = Instant::now();
        let mut shows = self.host.library_shows().await?;
        for show in &mut shows {
            self.fill_show(show);
        }

        let local_ids = |shows: &[Show]| -> HashSet<i64> {
            shows
                .iter()
                .flat_map(|s| std::iter::once(s.uids.local_id).chain(s.episodes.iter().map(|e| e.uids.local_id)))
                .collect()
        };
        let before = local_ids(&self.state.shows().await);
        let after = local_ids(&shows);
        let report = IngestReport {
            shows: shows.len(),
            episodes: shows.iter().map(|s| s.episodes.len()).sum(),
            added: after.difference(&before).count(),
            removed: before.difference(&after).count(),
            ..IngestReport::default()
        };

        self.state.replace_shows(shows).await;
        self.flag_changes(&report);
        info!(
            operation = "refresh_shows_complete",
            shows = report.shows,
            episodes = report.episodes,
            added = report.added,
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded shows from the media center"
        );
        Ok(report)
    }

    pub async fn refresh_all(&self) -> Result<IngestReport> {
        let movies = self.refresh_movies().await?;
        let shows = self.refresh_shows().await?;
        Ok(movies.merge(shows))
    }

    /// Items scanned from our placeholders carry the catalog ID under the addon's key.
    fn fill_catalog_id(&self, addon_uid: Option<&str>, uids: &mut UniqueIds) {
        if uids.catalog_id != 0 {
            return;
        }
        if let Some(id) = addon_uid.and_then(|v| v.parse().ok()) {
            uids.catalog_id = id;
        }
    }

    fn fill_show(&self, show: &mut Show) {
        let addon_uid = show
            .media_center
            .as_ref()
            .and_then(|m| m.addon_uid(&self.addon_uid_key))
            .map(str::to_string);
        self.fill_catalog_id(addon_uid.as_deref(), &mut show.uids);

        let catalog_id = show.uids.catalog_id;
        for season in &mut show.seasons {
            season.uids.catalog_id = catalog_id;
        }
    }

    fn flag_changes(&self, report: &IngestReport) {
        if report.added > 0 || report.removed > 0 {
            self.state.set_host_updated(true);
        }
        if report.added > 0 {
            self.state.set_host_added(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_episode, create_movie, create_show, FakeHost, ADDON_UID_KEY};

    fn ingest(host: Arc<FakeHost>, state: Arc<LibraryState>) -> LibraryIngest {
        LibraryIngest::new(host, state, ADDON_UID_KEY.to_string())
    }

    #[tokio::test]
    async fn test_refresh_movies_fills_catalog_id_from_addon_uid() {
        let mut scanned = create_movie(7, 603, "/lib/Movies/Matrix (1999)/Matrix (1999).strm");
        scanned.uids.catalog_id = 0;
        let host = Arc::new(FakeHost::new().with_library(vec![scanned], Vec::new()));
        let state = Arc::new(LibraryState::new());

        let report = ingest(host, state.clone()).refresh_movies().await.unwrap();
        assert_eq!(report.movies, 1);
        assert_eq!(report.added, 1);
        assert_eq!(state.movie_by_catalog_id(603).await.unwrap().uids.local_id, 7);
        assert!(state.is_host_added());
        assert!(state.is_host_updated());
    }

    #[tokio::test]
    async fn test_unchanged_library_is_not_flagged() {
        let host = Arc::new(FakeHost::new().with_library(
            vec![create_movie(7, 603, "/lib/Movies/A/A.strm")],
            vec![create_show(20, 1396, vec![create_episode(21, 1, 1, "/lib/Shows/S/S01E01.strm")])],
        ));
        let state = Arc::new(LibraryState::new());
        let ingest = ingest(host.clone(), state.clone());

        let report = ingest.refresh_all().await.unwrap();
        assert_eq!((report.movies, report.shows, report.episodes, report.added), (1, 1, 1, 3));

        state.set_host_added(false);
        state.set_host_updated(false);
        let report = ingest.refresh_all().await.unwrap();
        assert_eq!(report.added, 0);
        assert!(!state.is_host_added());
        assert!(!state.is_host_updated());

        // An episode went away
        host.set_library(
            vec![create_movie(7, 603, "/lib/Movies/A/A.strm")],
            vec![create_show(20, 1396, Vec::new())],
        );
        let report = ingest.refresh_shows().await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(state.is_host_updated());
        assert!(!state.is_host_added());
    }

    #[tokio::test]
    async fn test_show_catalog_id_from_addon_uid() {
        let mut scanned = create_show(20, 1396, vec![create_episode(21, 1, 1, "/lib/Shows/S/S01E01.strm")]);
        scanned.uids.catalog_id = 0;
        let host = Arc::new(FakeHost::new().with_library(Vec::new(), vec![scanned]));
        let state = Arc::new(LibraryState::new());
        ingest(host, state.clone()).refresh_shows().await.unwrap();

        let show = state.show_by_catalog_id(1396).await.unwrap();
        assert_eq!(show.uids.local_id, 20);
        assert!(state.episode_by_local_id(21).await.is_some());
    }
}
