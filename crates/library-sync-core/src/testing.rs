//! In-memory collaborators and fixtures shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use library_sync_config::LibraryConfig;
use library_sync_models::{
    Episode, EpisodeMetadata, ExternalIds, ExternalSource, LastActivities, ListItem, ListKind, MediaCenterUids,
    MediaType, Movie, MovieMetadata, PausedEpisode, PausedMovie, Resume, SeasonMetadata, SeasonSummary, Show,
    ShowMetadata, TrackedIds, UniqueIds, UserList, WatchedMovie, WatchedShow, WatchedUpdate,
};
use library_sync_sources::{CatalogClient, MediaCenterHost, SourceError, TrackingClient};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const ADDON_UID_KEY: &str = "strmsync";

pub fn test_config(dir: &Path) -> LibraryConfig {
    LibraryConfig {
        library_path: dir.to_path_buf(),
        ..LibraryConfig::default()
    }
}

pub fn create_movie(local_id: i64, catalog_id: i64, file: &str) -> Movie {
    let mut uids = UniqueIds::new(MediaType::Movie);
    uids.local_id = local_id;
    uids.catalog_id = catalog_id;
    Movie {
        title: format!("Movie {}", catalog_id),
        year: 2020,
        file: PathBuf::from(file),
        date_added: Utc::now(),
        uids,
        media_center: Some(MediaCenterUids::new(local_id).with_id(ADDON_UID_KEY, catalog_id.to_string())),
        resume: Resume::default(),
    }
}

pub fn create_episode(local_id: i64, season: u32, episode: u32, file: &str) -> Episode {
    let mut uids = UniqueIds::new(MediaType::Episode);
    uids.local_id = local_id;
    Episode {
        title: format!("Episode {}", episode),
        season,
        episode,
        file: PathBuf::from(file),
        date_added: Utc::now(),
        uids,
        media_center: Some(MediaCenterUids::new(local_id)),
        resume: Resume::default(),
    }
}

pub fn create_show(local_id: i64, catalog_id: i64, episodes: Vec<Episode>) -> Show {
    let mut uids = UniqueIds::new(MediaType::Show);
    uids.local_id = local_id;
    uids.catalog_id = catalog_id;
    Show {
        title: format!("Show {}", catalog_id),
        year: 2020,
        date_added: Utc::now(),
        seasons: Vec::new(),
        episodes,
        uids,
        media_center: Some(MediaCenterUids::new(local_id).with_id(ADDON_UID_KEY, catalog_id.to_string())),
    }
}

pub fn create_list_item(tracking_id: i64, catalog_id: i64) -> ListItem {
    ListItem {
        title: format!("Item {}", tracking_id),
        year: Some(2020),
        ids: TrackedIds {
            tracking_id,
            catalog_id,
            ..TrackedIds::default()
        },
        updated_at: None,
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    movies: HashMap<i64, MovieMetadata>,
    shows: HashMap<i64, ShowMetadata>,
    seasons: HashMap<(i64, u32), SeasonMetadata>,
    external: HashMap<String, i64>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_metadata(id: i64, name: &str, first_air_date: &str, seasons: Vec<(u32, u32)>) -> ShowMetadata {
        ShowMetadata {
            id,
            name: name.to_string(),
            original_name: name.to_string(),
            first_air_date: first_air_date.to_string(),
            seasons: seasons
                .into_iter()
                .map(|(season, episode_count)| SeasonSummary {
                    season,
                    episode_count,
                    air_date: String::new(),
                })
                .collect(),
            external_ids: ExternalIds {
                legacy_id: format!("tt{}", id),
                external_db_id: id * 10,
            },
        }
    }

    pub fn with_movie(mut self, id: i64, title: &str, release_date: &str) -> Self {
        self.movies.insert(
            id,
            MovieMetadata {
                id,
                title: title.to_string(),
                original_title: title.to_string(),
                release_date: release_date.to_string(),
                runtime_minutes: 100,
                external_ids: ExternalIds {
                    legacy_id: format!("tt{}", id),
                    external_db_id: 0,
                },
            },
        );
        self
    }

    pub fn with_show(mut self, id: i64, name: &str, first_air_date: &str, seasons: Vec<(u32, u32)>) -> Self {
        self.shows.insert(id, Self::show_metadata(id, name, first_air_date, seasons));
        self
    }

    pub fn with_season(mut self, show_id: i64, season: u32, episodes: Vec<(u32, &str)>) -> Self {
        let episodes = episodes
            .into_iter()
            .map(|(number, air_date)| EpisodeMetadata {
                id: show_id * 1000 + i64::from(season) * 100 + i64::from(number),
                name: format!("Episode {}", number),
                season_number: season,
                episode_number: number,
                air_date: air_date.to_string(),
                runtime_minutes: 45,
            })
            .collect();
        self.seasons.insert(
            (show_id, season),
            SeasonMetadata {
                season,
                air_date: String::new(),
                episodes,
            },
        );
        self
    }

    pub fn with_external(mut self, external_id: &str, catalog_id: i64) -> Self {
        self.external.insert(external_id.to_string(), catalog_id);
        self
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn get_movie(&self, catalog_id: i64, _language: &str) -> Result<Option<MovieMetadata>, SourceError> {
        Ok(self.movies.get(&catalog_id).cloned())
    }

    async fn get_show(&self, catalog_id: i64, _language: &str) -> Result<Option<ShowMetadata>, SourceError> {
        Ok(self.shows.get(&catalog_id).cloned())
    }

    async fn get_season(&self, show_id: i64, season: u32, _language: &str) -> Result<Option<SeasonMetadata>, SourceError> {
        Ok(self.seasons.get(&(show_id, season)).cloned())
    }

    async fn get_episode(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
        _language: &str,
    ) -> Result<Option<EpisodeMetadata>, SourceError> {
        Ok(self
            .seasons
            .get(&(show_id, season))
            .and_then(|s| s.episodes.iter().find(|e| e.episode_number == episode).cloned()))
    }

    async fn resolve_external_id(
        &self,
        external_id: &str,
        _source: ExternalSource,
        _media_type: MediaType,
    ) -> Result<Option<i64>, SourceError> {
        Ok(self.external.get(external_id).copied())
    }
}

/// Tracking service backed by plain vectors. Every pushed batch is recorded.
#[derive(Default)]
pub struct FakeTracking {
    pub watchlist_movies: Mutex<Vec<ListItem>>,
    pub watchlist_shows: Mutex<Vec<ListItem>>,
    pub collection_movies: Mutex<Vec<ListItem>>,
    pub collection_shows: Mutex<Vec<ListItem>>,
    pub custom: Mutex<HashMap<String, Vec<ListItem>>>,
    pub watched_movies: Mutex<Vec<WatchedMovie>>,
    pub watched_shows: Mutex<Vec<WatchedShow>>,
    pub paused_movies: Mutex<Vec<PausedMovie>>,
    pub paused_episodes: Mutex<Vec<PausedEpisode>>,
    pub user_lists: Mutex<Vec<UserList>>,
    pub activities: Mutex<LastActivities>,
    pub pushed: Mutex<Vec<Vec<WatchedUpdate>>>,
    pub fetches: Mutex<Vec<String>>,
    failing: AtomicBool,
    locked: AtomicBool,
}

impl FakeTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn set_watchlist(&self, kind: ListKind, items: Vec<ListItem>) {
        match kind {
            ListKind::Movies => *self.watchlist_movies.lock().unwrap() = items,
            ListKind::Shows => *self.watchlist_shows.lock().unwrap() = items,
        }
    }

    pub fn pushed(&self) -> Vec<Vec<WatchedUpdate>> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    fn check(&self, what: &str) -> Result<(), SourceError> {
        self.fetches.lock().unwrap().push(what.to_string());
        if self.locked.load(Ordering::SeqCst) {
            return Err(SourceError::Locked);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("tracking".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingClient for FakeTracking {
    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn watchlist(&self, kind: ListKind) -> Result<Vec<ListItem>, SourceError> {
        self.check(&format!("watchlist/{}", kind))?;
        Ok(match kind {
            ListKind::Movies => self.watchlist_movies.lock().unwrap().clone(),
            ListKind::Shows => self.watchlist_shows.lock().unwrap().clone(),
        })
    }

    async fn collection(&self, kind: ListKind) -> Result<Vec<ListItem>, SourceError> {
        self.check(&format!("collection/{}", kind))?;
        Ok(match kind {
            ListKind::Movies => self.collection_movies.lock().unwrap().clone(),
            ListKind::Shows => self.collection_shows.lock().unwrap().clone(),
        })
    }

    async fn list_items(&self, list_id: &str, kind: ListKind) -> Result<Vec<ListItem>, SourceError> {
        self.check(&format!("lists/{}/{}", list_id, kind))?;
        let key = format!("{}/{}", list_id, kind);
        Ok(self.custom.lock().unwrap().get(&key).cloned().unwrap_or_default())
    }

    async fn watched_movies(&self) -> Result<Vec<WatchedMovie>, SourceError> {
        self.check("watched/movies")?;
        Ok(self.watched_movies.lock().unwrap().clone())
    }

    async fn watched_shows(&self) -> Result<Vec<WatchedShow>, SourceError> {
        self.check("watched/shows")?;
        Ok(self.watched_shows.lock().unwrap().clone())
    }

    async fn paused_movies(&self) -> Result<Vec<PausedMovie>, SourceError> {
        self.check("paused/movies")?;
        Ok(self.paused_movies.lock().unwrap().clone())
    }

    async fn paused_episodes(&self) -> Result<Vec<PausedEpisode>, SourceError> {
        self.check("paused/episodes")?;
        Ok(self.paused_episodes.lock().unwrap().clone())
    }

    async fn user_lists(&self) -> Result<Vec<UserList>, SourceError> {
        self.check("lists")?;
        Ok(self.user_lists.lock().unwrap().clone())
    }

    async fn set_watched_batch(&self, items: &[WatchedUpdate]) -> Result<(), SourceError> {
        self.check("history")?;
        self.pushed.lock().unwrap().push(items.to_vec());
        Ok(())
    }

    async fn last_activities(&self) -> Result<LastActivities, SourceError> {
        self.check("last_activities")?;
        Ok(self.activities.lock().unwrap().clone())
    }
}

/// Media center that records every call as `"<method>"` or `"<method>:<id>"`.
#[derive(Default)]
pub struct FakeHost {
    calls: Mutex<Vec<String>>,
    dialogs: Mutex<Vec<String>>,
    notifications: Mutex<Vec<String>>,
    watched: Mutex<Vec<(MediaType, i64, u32, Option<DateTime<Utc>>)>>,
    progress: Mutex<Vec<(MediaType, i64, f64, f64)>>,
    movies: Mutex<Vec<Movie>>,
    shows: Mutex<Vec<Show>>,
    confirm: bool,
    playing: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirming(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_library(self, movies: Vec<Movie>, shows: Vec<Show>) -> Self {
        self.set_library(movies, shows);
        self
    }

    pub fn set_library(&self, movies: Vec<Movie>, shows: Vec<Show>) {
        *self.movies.lock().unwrap() = movies;
        *self.shows.lock().unwrap() = shows;
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dialogs(&self) -> Vec<String> {
        self.dialogs.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn watched(&self) -> Vec<(MediaType, i64, u32, Option<DateTime<Utc>>)> {
        self.watched.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(MediaType, i64, f64, f64)> {
        self.progress.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn record_watched(&self, media_type: MediaType, local_id: i64, playcount: u32, at: Option<DateTime<Utc>>) {
        self.watched.lock().unwrap().push((media_type, local_id, playcount, at));
    }
}

#[async_trait]
impl MediaCenterHost for FakeHost {
    async fn scan_library(&self, _dir: Option<&Path>) -> Result<(), SourceError> {
        self.record("scan_library".to_string());
        Ok(())
    }

    async fn clean_library(&self, _dir: Option<&Path>, _content: &str) -> Result<(), SourceError> {
        self.record("clean_library".to_string());
        Ok(())
    }

    async fn remove_movie(&self, local_id: i64) -> Result<(), SourceError> {
        self.record(format!("remove_movie:{}", local_id));
        Ok(())
    }

    async fn remove_show(&self, local_id: i64) -> Result<(), SourceError> {
        self.record(format!("remove_show:{}", local_id));
        Ok(())
    }

    async fn remove_episode(&self, local_id: i64) -> Result<(), SourceError> {
        self.record(format!("remove_episode:{}", local_id));
        Ok(())
    }

    async fn set_movie_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        self.record_watched(MediaType::Movie, local_id, playcount, last_played);
        Ok(())
    }

    async fn set_episode_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        self.record_watched(MediaType::Episode, local_id, playcount, last_played);
        Ok(())
    }

    async fn set_season_watched(&self, local_id: i64, playcount: u32) -> Result<(), SourceError> {
        self.record_watched(MediaType::Season, local_id, playcount, None);
        Ok(())
    }

    async fn set_show_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        self.record_watched(MediaType::Show, local_id, playcount, last_played);
        Ok(())
    }

    async fn set_movie_progress(&self, local_id: i64, position: f64, total: f64, _at: DateTime<Utc>) -> Result<(), SourceError> {
        self.progress.lock().unwrap().push((MediaType::Movie, local_id, position, total));
        Ok(())
    }

    async fn set_episode_progress(&self, local_id: i64, position: f64, total: f64, _at: DateTime<Utc>) -> Result<(), SourceError> {
        self.progress.lock().unwrap().push((MediaType::Episode, local_id, position, total));
        Ok(())
    }

    async fn confirm_dialog(&self, _title: &str, message: &str) -> Result<bool, SourceError> {
        self.dialogs.lock().unwrap().push(message.to_string());
        Ok(self.confirm)
    }

    async fn notify(&self, _title: &str, message: &str) -> Result<(), SourceError> {
        self.notifications.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn is_playing(&self) -> Result<bool, SourceError> {
        Ok(self.playing.load(Ordering::SeqCst))
    }

    async fn library_movies(&self) -> Result<Vec<Movie>, SourceError> {
        self.record("library_movies".to_string());
        Ok(self.movies.lock().unwrap().clone())
    }

    async fn library_shows(&self) -> Result<Vec<Show>, SourceError> {
        self.record("library_shows".to_string());
        Ok(self.shows.lock().unwrap().clone())
    }
}
