use async_trait::async_trait;
use chrono::{DateTime, Utc};
use library_sync_models::{
    EpisodeMetadata, ExternalSource, LastActivities, ListItem, ListKind, MediaType, Movie, MovieMetadata,
    PausedEpisode, PausedMovie, SeasonMetadata, Show, ShowMetadata, UserList, WatchedMovie, WatchedShow,
    WatchedUpdate,
};
use std::path::Path;
use crate::error::SourceError;

/// Movie and show metadata catalog.
///
/// Lookups return `Ok(None)` when the catalog has no entry for the ID.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get_movie(&self, catalog_id: i64, language: &str) -> Result<Option<MovieMetadata>, SourceError>;

    async fn get_show(&self, catalog_id: i64, language: &str) -> Result<Option<ShowMetadata>, SourceError>;

    async fn get_season(
        &self,
        show_id: i64,
        season: u32,
        language: &str,
    ) -> Result<Option<SeasonMetadata>, SourceError>;

    async fn get_episode(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
        language: &str,
    ) -> Result<Option<EpisodeMetadata>, SourceError>;

    /// Maps an identifier from another database to a catalog ID.
    async fn resolve_external_id(
        &self,
        external_id: &str,
        source: ExternalSource,
        media_type: MediaType,
    ) -> Result<Option<i64>, SourceError>;
}

/// Watch-activity tracking service holding the user's lists and history.
#[async_trait]
pub trait TrackingClient: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    async fn watchlist(&self, kind: ListKind) -> Result<Vec<ListItem>, SourceError>;

    async fn collection(&self, kind: ListKind) -> Result<Vec<ListItem>, SourceError>;

    async fn list_items(&self, list_id: &str, kind: ListKind) -> Result<Vec<ListItem>, SourceError>;

    async fn watched_movies(&self) -> Result<Vec<WatchedMovie>, SourceError>;

    async fn watched_shows(&self) -> Result<Vec<WatchedShow>, SourceError>;

    async fn paused_movies(&self) -> Result<Vec<PausedMovie>, SourceError>;

    async fn paused_episodes(&self) -> Result<Vec<PausedEpisode>, SourceError>;

    async fn user_lists(&self) -> Result<Vec<UserList>, SourceError>;

    /// Pushes watched or unwatched marks. Every item of one call should share the same `watched` flag.
    async fn set_watched_batch(&self, items: &[WatchedUpdate]) -> Result<(), SourceError>;

    async fn last_activities(&self) -> Result<LastActivities, SourceError>;
}

/// The media-center front end owning the user-visible library.
///
/// IDs are the media center's own (`local_id`).
#[async_trait]
pub trait MediaCenterHost: Send + Sync {
    /// Scan a directory, or the whole library when `dir` is `None`.
    async fn scan_library(&self, dir: Option<&Path>) -> Result<(), SourceError>;

    async fn clean_library(&self, dir: Option<&Path>, content: &str) -> Result<(), SourceError>;

    async fn remove_movie(&self, local_id: i64) -> Result<(), SourceError>;

    async fn remove_show(&self, local_id: i64) -> Result<(), SourceError>;

    async fn remove_episode(&self, local_id: i64) -> Result<(), SourceError>;

    async fn set_movie_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError>;

    async fn set_episode_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError>;

    async fn set_season_watched(&self, local_id: i64, playcount: u32) -> Result<(), SourceError>;

    async fn set_show_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError>;

    async fn set_movie_progress(
        &self,
        local_id: i64,
        position: f64,
        total: f64,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError>;

    async fn set_episode_progress(
        &self,
        local_id: i64,
        position: f64,
        total: f64,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError>;

    async fn confirm_dialog(&self, title: &str, message: &str) -> Result<bool, SourceError>;

    async fn notify(&self, title: &str, message: &str) -> Result<(), SourceError>;

    async fn is_playing(&self) -> Result<bool, SourceError>;

    async fn library_movies(&self) -> Result<Vec<Movie>, SourceError>;

    async fn library_shows(&self) -> Result<Vec<Show>, SourceError>;
}
