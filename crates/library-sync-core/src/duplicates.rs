use library_sync_models::{Episode, MediaCenterUids, Movie, Show};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use crate::index::LibraryState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateStats {
    pub movies: usize,
    pub shows: usize,
    pub episodes: usize,
}

impl DuplicateStats {
    pub fn total(&self) -> usize {
        self.movies + self.shows + self.episodes
    }
}

/// Finds library entries that point at the same catalog item.
///
/// Only entries backed by one of our placeholders and carrying our addon's
/// UID are considered, so the user's own files are never reported.
pub struct DuplicateDetector {
    state: Arc<LibraryState>,
    addon_uid_key: String,
}

impl DuplicateDetector {
    pub fn new(state: Arc<LibraryState>, addon_uid_key: String) -> Self {
        Self { state, addon_uid_key }
    }

    fn has_addon_uid(&self, uids: &Option<MediaCenterUids>) -> bool {
        uids.as_ref()
            .and_then(|u| u.addon_uid(&self.addon_uid_key))
            .is_some()
    }

    /// Every movie after the first one sharing a catalog ID.
    pub async fn find_duplicate_movies(&self) -> Vec<Movie> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();

        for movie in self.state.movies().await {
            if movie.uids.catalog_id == 0 || !self.has_addon_uid(&movie.media_center) || !movie.has_placeholder() {
                continue;
            }
            if !seen.insert(movie.uids.catalog_id) {
                debug!(catalog_id = movie.uids.catalog_id, title = %movie.title, "Duplicate movie");
                duplicates.push(movie);
            }
        }
        duplicates
    }

    pub async fn find_duplicate_shows(&self) -> Vec<Show> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();

        for show in self.state.shows().await {
            if show.uids.catalog_id == 0
                || !self.has_addon_uid(&show.media_center)
                || !show.episodes.iter().any(Episode::has_placeholder)
            {
                continue;
            }
            if !seen.insert(show.uids.catalog_id) {
                debug!(catalog_id = show.uids.catalog_id, title = %show.title, "Duplicate show");
                duplicates.push(show);
            }
        }
        duplicates
    }

    /// Duplicate episodes keyed by `(show catalog ID, season, episode)`.
    pub async fn find_duplicate_episodes(&self) -> Vec<Episode> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();

        for show in self.state.shows().await {
            if show.uids.catalog_id == 0 || !self.has_addon_uid(&show.media_center) {
                continue;
            }
            for episode in show.episodes {
                if !episode.has_placeholder() {
                    continue;
                }
                if !seen.insert((show.uids.catalog_id, episode.season, episode.episode)) {
                    debug!(
                        show_id = show.uids.catalog_id,
                        season = episode.season,
                        episode = episode.episode,
                        "Duplicate episode"
                    );
                    duplicates.push(episode);
                }
            }
        }
        duplicates
    }

    pub async fn duplicate_stats(&self) -> DuplicateStats {
        DuplicateStats {
            movies: self.find_duplicate_movies().await.len(),
            shows: self.find_duplicate_shows().await.len(),
            episodes: self.find_duplicate_episodes().await.len(),
        }
    }

    pub async fn is_duplicate_movie(&self, catalog_id: i64) -> bool {
        self.state
            .movie_by_catalog_id(catalog_id)
            .await
            .is_some_and(|m| m.has_placeholder())
    }

    pub async fn is_duplicate_show(&self, catalog_id: i64) -> bool {
        self.state
            .show_by_catalog_id(catalog_id)
            .await
            .is_some_and(|s| s.episodes.iter().any(Episode::has_placeholder))
    }

    pub async fn is_duplicate_episode(&self, show_id: i64, season: u32, episode: u32) -> bool {
        self.state
            .show_by_catalog_id(show_id)
            .await
            .and_then(|s| s.episode(season, episode).map(Episode::has_placeholder))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_episode, create_movie, create_show};

    async fn create_detector(movies: Vec<Movie>, shows: Vec<Show>) -> DuplicateDetector {
        let state = Arc::new(LibraryState::new());
        state.replace_movies(movies).await;
        state.replace_shows(shows).await;
        DuplicateDetector::new(state, "strmsync".to_string())
    }

    #[tokio::test]
    async fn test_second_movie_with_same_catalog_id_is_duplicate() {
        let detector = create_detector(
            vec![create_movie(1, 42, "/lib/Movies/A/A.strm"), create_movie(2, 42, "/lib/Movies/A 2/A.strm")],
            vec![],
        )
        .await;

        let duplicates = detector.find_duplicate_movies().await;
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].uids.local_id, 2);
    }

    #[tokio::test]
    async fn test_user_files_are_never_duplicates() {
        let mut own = create_movie(2, 42, "/lib/Movies/A 2/A.strm");
        own.media_center = None;
        let detector = create_detector(
            vec![create_movie(1, 42, "/lib/Movies/A/A.strm"), create_movie(3, 42, "/media/A.mkv"), own],
            vec![],
        )
        .await;

        assert!(detector.find_duplicate_movies().await.is_empty());
        assert!(detector.is_duplicate_movie(42).await);
        assert!(!detector.is_duplicate_movie(43).await);
    }

    #[tokio::test]
    async fn test_show_and_episode_duplicates() {
        let first = create_show(
            10,
            1396,
            vec![create_episode(101, 1, 1, "/lib/Shows/BB (2008)/BB (2008) S01E01.strm")],
        );
        let second = create_show(
            11,
            1396,
            vec![
                create_episode(111, 1, 1, "/lib/Shows/BB 2/BB (2008) S01E01.strm"),
                create_episode(112, 1, 2, "/lib/Shows/BB 2/BB (2008) S01E02.strm"),
            ],
        );
        let detector = create_detector(vec![], vec![first, second]).await;

        let shows = detector.find_duplicate_shows().await;
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].uids.local_id, 11);

        let episodes = detector.find_duplicate_episodes().await;
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].uids.local_id, 111);

        assert_eq!(
            detector.duplicate_stats().await,
            DuplicateStats { movies: 0, shows: 1, episodes: 1 }
        );
        assert!(detector.is_duplicate_episode(1396, 1, 1).await);
        assert!(!detector.is_duplicate_episode(1396, 2, 1).await);
        assert!(detector.is_duplicate_show(1396).await);
    }
}
