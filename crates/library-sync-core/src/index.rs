//! In-memory index of everything the media center knows about the library.

use library_sync_models::{Episode, ListKind, MediaType, Movie, Resume, Season, Show, TrackedIds, UniqueIds};
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use twox_hash::XxHash64;

/// Library state shared by every component, built once at the application root.
#[derive(Default)]
pub struct LibraryState {
    uids: RwLock<Vec<UniqueIds>>,
    movies: RwLock<Vec<Movie>>,
    shows: RwLock<Vec<Show>>,
    remote_watched: RwLock<HashMap<ListKind, HashSet<u64>>>,
    tracking_initialized: AtomicBool,
    host_updated: AtomicBool,
    host_added: AtomicBool,
}

impl LibraryState {
    pub fn new() -> Self {
        Self::default()
    }

    // Raw identifier lookups

    pub async fn find(&self, media_type: MediaType, catalog_id: i64) -> Option<UniqueIds> {
        if catalog_id == 0 {
            return None;
        }
        self.uids
            .read()
            .await
            .iter()
            .find(|u| u.media_type == media_type && u.catalog_id == catalog_id)
            .cloned()
    }

    pub async fn find_by_local_id(&self, media_type: MediaType, local_id: i64) -> Option<UniqueIds> {
        if local_id == 0 {
            return None;
        }
        self.uids
            .read()
            .await
            .iter()
            .find(|u| u.media_type == media_type && u.local_id == local_id)
            .cloned()
    }

    /// Looks up by legacy or external-database ID, whichever matches first.
    pub async fn find_by_external_id(&self, id: &str) -> Option<UniqueIds> {
        self.uids
            .read()
            .await
            .iter()
            .find(|u| u.matches_external(id))
            .cloned()
    }

    /// Replaces the entry with the same media type and local ID (or catalog ID
    /// when no local ID is assigned), or appends a new one.
    pub async fn upsert(&self, ids: UniqueIds) {
        let mut uids = self.uids.write().await;
        let existing = uids.iter_mut().find(|u| {
            u.media_type == ids.media_type
                && if ids.local_id != 0 {
                    u.local_id == ids.local_id
                } else {
                    ids.catalog_id != 0 && u.local_id == 0 && u.catalog_id == ids.catalog_id
                }
        });
        match existing {
            Some(entry) => *entry = ids,
            None => uids.push(ids),
        }
    }

    pub async fn all(&self, media_type: MediaType) -> Vec<UniqueIds> {
        self.uids
            .read()
            .await
            .iter()
            .filter(|u| u.media_type == media_type)
            .cloned()
            .collect()
    }

    // Collections

    pub async fn replace_movies(&self, movies: Vec<Movie>) {
        let mut uids = self.uids.write().await;
        uids.retain(|u| u.media_type != MediaType::Movie);
        uids.extend(movies.iter().map(|m| m.uids.clone()));
        *self.movies.write().await = movies;
    }

    pub async fn replace_shows(&self, shows: Vec<Show>) {
        let mut uids = self.uids.write().await;
        uids.retain(|u| u.media_type == MediaType::Movie);
        for show in &shows {
            uids.push(show.uids.clone());
            uids.extend(show.seasons.iter().map(|s| s.uids.clone()));
            uids.extend(show.episodes.iter().map(|e| e.uids.clone()));
        }
        *self.shows.write().await = shows;
    }

    pub async fn movies(&self) -> Vec<Movie> {
        self.movies.read().await.clone()
    }

    pub async fn shows(&self) -> Vec<Show> {
        self.shows.read().await.clone()
    }

    pub async fn has_movies(&self) -> bool {
        !self.movies.read().await.is_empty()
    }

    pub async fn has_shows(&self) -> bool {
        !self.shows.read().await.is_empty()
    }

    pub async fn movie_by_catalog_id(&self, catalog_id: i64) -> Option<Movie> {
        if catalog_id == 0 {
            return None;
        }
        self.find_movie(|m| m.uids.catalog_id == catalog_id).await
    }

    pub async fn movie_by_legacy_id(&self, legacy_id: &str) -> Option<Movie> {
        if legacy_id.is_empty() {
            return None;
        }
        self.find_movie(|m| m.uids.external_legacy_id == legacy_id).await
    }

    pub async fn movie_by_local_id(&self, local_id: i64) -> Option<Movie> {
        self.find_movie(|m| m.uids.local_id == local_id).await
    }

    async fn find_movie(&self, predicate: impl Fn(&Movie) -> bool) -> Option<Movie> {
        self.movies.read().await.iter().find(|m| predicate(*m)).cloned()
    }

    pub async fn show_by_catalog_id(&self, catalog_id: i64) -> Option<Show> {
        if catalog_id == 0 {
            return None;
        }
        self.find_show(|s| s.uids.catalog_id == catalog_id).await
    }

    pub async fn show_by_legacy_id(&self, legacy_id: &str) -> Option<Show> {
        if legacy_id.is_empty() {
            return None;
        }
        self.find_show(|s| s.uids.matches_external(legacy_id)).await
    }

    pub async fn show_by_local_id(&self, local_id: i64) -> Option<Show> {
        self.find_show(|s| s.uids.local_id == local_id).await
    }

    async fn find_show(&self, predicate: impl Fn(&Show) -> bool) -> Option<Show> {
        self.shows.read().await.iter().find(|s| predicate(*s)).cloned()
    }

    pub async fn season_by_local_id(&self, local_id: i64) -> Option<Season> {
        self.shows
            .read()
            .await
            .iter()
            .flat_map(|s| s.seasons.iter())
            .find(|s| s.uids.local_id == local_id)
            .cloned()
    }

    pub async fn episode_by_local_id(&self, local_id: i64) -> Option<Episode> {
        self.shows
            .read()
            .await
            .iter()
            .flat_map(|s| s.episodes.iter())
            .find(|e| e.uids.local_id == local_id)
            .cloned()
    }

    pub async fn movie_resume(&self, local_id: i64) -> Option<Resume> {
        self.movie_by_local_id(local_id)
            .await
            .map(|m| m.resume)
            .filter(|r| !r.is_empty())
    }

    pub async fn episode_resume(&self, local_id: i64) -> Option<Resume> {
        self.episode_by_local_id(local_id)
            .await
            .map(|e| e.resume)
            .filter(|r| !r.is_empty())
    }

    // In-place mutation after a host-side change

    pub async fn update_movie(&self, local_id: i64, f: impl FnOnce(&mut Movie)) -> bool {
        let mut movies = self.movies.write().await;
        let Some(movie) = movies.iter_mut().find(|m| m.uids.local_id == local_id) else {
            return false;
        };
        f(movie);
        let ids = movie.uids.clone();
        drop(movies);
        self.upsert(ids).await;
        true
    }

    pub async fn update_show(&self, local_id: i64, f: impl FnOnce(&mut Show)) -> bool {
        let mut shows = self.shows.write().await;
        let Some(show) = shows.iter_mut().find(|s| s.uids.local_id == local_id) else {
            return false;
        };
        f(show);
        let ids = show.uids.clone();
        drop(shows);
        self.upsert(ids).await;
        true
    }

    pub async fn update_episode(&self, local_id: i64, f: impl FnOnce(&mut Episode)) -> bool {
        let mut shows = self.shows.write().await;
        let Some(episode) = shows
            .iter_mut()
            .flat_map(|s| s.episodes.iter_mut())
            .find(|e| e.uids.local_id == local_id)
        else {
            return false;
        };
        f(episode);
        let ids = episode.uids.clone();
        drop(shows);
        self.upsert(ids).await;
        true
    }

    // Remote watched index

    /// Replaces the remote-watched keys of one kind with the latest cycle's.
    pub async fn set_remote_watched(&self, kind: ListKind, keys: impl IntoIterator<Item = u64>) {
        self.remote_watched
            .write()
            .await
            .insert(kind, keys.into_iter().collect());
    }

    pub async fn is_remote_watched(&self, key: u64) -> bool {
        self.remote_watched
            .read()
            .await
            .values()
            .any(|keys| keys.contains(&key))
    }

    /// True when any of the keys is remote-watched.
    pub async fn is_any_remote_watched(&self, keys: &[u64]) -> bool {
        let remote = self.remote_watched.read().await;
        keys.iter().any(|key| remote.values().any(|set| set.contains(key)))
    }

    pub async fn reset_remote_watched(&self) {
        self.remote_watched.write().await.clear();
    }

    // Flags

    pub fn is_tracking_initialized(&self) -> bool {
        self.tracking_initialized.load(Ordering::SeqCst)
    }

    pub fn set_tracking_initialized(&self, value: bool) {
        self.tracking_initialized.store(value, Ordering::SeqCst);
    }

    /// Whether the host library was re-ingested since the last tracking run.
    pub fn is_host_updated(&self) -> bool {
        self.host_updated.load(Ordering::SeqCst)
    }

    pub fn set_host_updated(&self, value: bool) {
        self.host_updated.store(value, Ordering::SeqCst);
    }

    /// Whether the last ingest found new local items.
    pub fn is_host_added(&self) -> bool {
        self.host_added.load(Ordering::SeqCst)
    }

    pub fn set_host_added(&self, value: bool) {
        self.host_added.store(value, Ordering::SeqCst);
    }
}

fn xxhash(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

/// Stable key of a placeholder path, used by the playcount caches.
pub fn file_key(path: &Path) -> u64 {
    xxhash(path.to_string_lossy().as_bytes())
}

/// Key of a remote-watched entry: `{media}_{scraper}_{id}[_{season}[_{episode}]]`.
pub fn watched_key(media_type: MediaType, scraper: &str, id: &str, season: Option<u32>, episode: Option<u32>) -> u64 {
    let mut key = format!("{}_{}_{}", media_type.as_i64(), scraper, id);
    if let Some(season) = season {
        key.push_str(&format!("_{}", season));
        if let Some(episode) = episode {
            key.push_str(&format!("_{}", episode));
        }
    }
    xxhash(key.as_bytes())
}

/// Every remote-watched key a tracked item can be found under.
pub fn tracked_keys(ids: &TrackedIds, media_type: MediaType, season: Option<u32>, episode: Option<u32>) -> Vec<u64> {
    let mut keys = Vec::with_capacity(3);
    if ids.tracking_id != 0 {
        keys.push(watched_key(media_type, "trakt", &ids.tracking_id.to_string(), season, episode));
    }
    if ids.catalog_id != 0 {
        keys.push(watched_key(media_type, "tmdb", &ids.catalog_id.to_string(), season, episode));
    }
    if !ids.external_legacy_id.is_empty() {
        keys.push(watched_key(media_type, "imdb", &ids.external_legacy_id, season, episode));
    }
    keys
}

/// The key a local item is checked against, by its catalog ID.
pub fn catalog_key(media_type: MediaType, catalog_id: i64, season: Option<u32>, episode: Option<u32>) -> u64 {
    watched_key(media_type, "tmdb", &catalog_id.to_string(), season, episode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use library_sync_models::MediaCenterUids;
    use std::path::PathBuf;

    fn create_movie(local_id: i64, catalog_id: i64, legacy: &str) -> Movie {
        let mut uids = UniqueIds::new(MediaType::Movie);
        uids.local_id = local_id;
        uids.catalog_id = catalog_id;
        uids.external_legacy_id = legacy.to_string();
        Movie {
            title: format!("Movie {}", catalog_id),
            year: 2020,
            file: PathBuf::from(format!("/lib/Movies/Movie {0}/Movie {0}.strm", catalog_id)),
            date_added: Utc::now(),
            uids,
            media_center: Some(MediaCenterUids::new(local_id)),
            resume: Resume::default(),
        }
    }

    fn create_show(local_id: i64, catalog_id: i64) -> Show {
        let mut uids = UniqueIds::new(MediaType::Show);
        uids.local_id = local_id;
        uids.catalog_id = catalog_id;
        let mut episode_uids = UniqueIds::new(MediaType::Episode);
        episode_uids.local_id = local_id * 100 + 1;
        Show {
            title: "Show".to_string(),
            year: 2019,
            date_added: Utc::now(),
            seasons: vec![Season {
                title: "Season 1".to_string(),
                season: 1,
                episode_count: 1,
                uids: {
                    let mut s = UniqueIds::new(MediaType::Season);
                    s.local_id = local_id * 10;
                    s
                },
                media_center: None,
            }],
            episodes: vec![Episode {
                title: "Pilot".to_string(),
                season: 1,
                episode: 1,
                file: PathBuf::from("/lib/Shows/Show (2019)/Show (2019) S01E01.strm"),
                date_added: Utc::now(),
                uids: episode_uids,
                media_center: None,
                resume: Resume { position: 60.0, total: 1800.0 },
            }],
            uids,
            media_center: None,
        }
    }

    #[tokio::test]
    async fn test_lookups_after_replace() {
        let state = LibraryState::new();
        state
            .replace_movies(vec![create_movie(1, 603, "tt0133093"), create_movie(2, 604, "")])
            .await;
        state.replace_shows(vec![create_show(5, 1396)]).await;

        assert_eq!(state.find(MediaType::Movie, 603).await.unwrap().local_id, 1);
        assert!(state.find(MediaType::Show, 603).await.is_none());
        assert_eq!(state.find_by_local_id(MediaType::Show, 5).await.unwrap().catalog_id, 1396);
        assert_eq!(state.find_by_external_id("tt0133093").await.unwrap().catalog_id, 603);
        assert_eq!(state.movie_by_legacy_id("tt0133093").await.unwrap().uids.local_id, 1);
        assert_eq!(state.all(MediaType::Episode).await.len(), 1);
        assert!(state.season_by_local_id(50).await.is_some());
        assert_eq!(state.episode_resume(501).await.unwrap().position, 60.0);
        assert!(state.movie_resume(1).await.is_none());
        assert!(state.has_movies().await && state.has_shows().await);
    }

    #[tokio::test]
    async fn test_replace_movies_keeps_show_uids() {
        let state = LibraryState::new();
        state.replace_shows(vec![create_show(5, 1396)]).await;
        state.replace_movies(vec![create_movie(1, 603, "")]).await;
        state.replace_movies(vec![]).await;

        assert!(state.find(MediaType::Movie, 603).await.is_none());
        assert!(state.find(MediaType::Show, 1396).await.is_some());
    }

    #[tokio::test]
    async fn test_update_movie_syncs_uids() {
        let state = LibraryState::new();
        state.replace_movies(vec![create_movie(1, 603, "")]).await;

        assert!(state.update_movie(1, |m| m.uids.play_count = 2).await);
        assert!(!state.update_movie(99, |m| m.uids.play_count = 2).await);
        assert_eq!(state.find(MediaType::Movie, 603).await.unwrap().play_count, 2);
        assert!(state.movie_by_catalog_id(603).await.unwrap().is_watched());
    }

    #[tokio::test]
    async fn test_upsert_without_local_id_matches_catalog() {
        let state = LibraryState::new();
        let mut ids = UniqueIds::new(MediaType::Movie);
        ids.catalog_id = 42;
        state.upsert(ids.clone()).await;
        ids.tracking_id = 7;
        state.upsert(ids).await;

        let all = state.all(MediaType::Movie).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tracking_id, 7);
    }

    #[tokio::test]
    async fn test_remote_watched_keys() {
        let state = LibraryState::new();
        let ids = TrackedIds {
            tracking_id: 1,
            catalog_id: 603,
            external_legacy_id: "tt0133093".to_string(),
            ..Default::default()
        };
        let keys = tracked_keys(&ids, MediaType::Movie, None, None);
        assert_eq!(keys.len(), 3);
        state.set_remote_watched(ListKind::Movies, keys).await;
        state
            .set_remote_watched(ListKind::Shows, vec![catalog_key(MediaType::Show, 1396, None, None)])
            .await;

        assert!(state.is_remote_watched(catalog_key(MediaType::Movie, 603, None, None)).await);
        assert!(!state.is_remote_watched(catalog_key(MediaType::Show, 603, None, None)).await);
        assert!(
            state
                .is_any_remote_watched(&[1, catalog_key(MediaType::Show, 1396, None, None)])
                .await
        );

        state.set_remote_watched(ListKind::Movies, Vec::new()).await;
        assert!(!state.is_remote_watched(catalog_key(MediaType::Movie, 603, None, None)).await);
        assert!(state.is_remote_watched(catalog_key(MediaType::Show, 1396, None, None)).await);

        state.reset_remote_watched().await;
        assert!(!state.is_remote_watched(catalog_key(MediaType::Show, 1396, None, None)).await);
    }

    #[test]
    fn test_keys_are_stable_and_distinct() {
        let episode = catalog_key(MediaType::Episode, 1396, Some(1), Some(2));
        assert_eq!(episode, catalog_key(MediaType::Episode, 1396, Some(1), Some(2)));
        assert_ne!(episode, catalog_key(MediaType::Episode, 1396, Some(1), Some(3)));
        assert_ne!(file_key(Path::new("/a.strm")), file_key(Path::new("/b.strm")));
    }
}
