//! Trakt wire types and their conversion into library models.

use chrono::{DateTime, Utc};
use library_sync_models::{
    ActivityStamps, LastActivities, ListItem, ListKind, MediaType, PausedEpisode, PausedMovie, TrackedIds, UserList,
    WatchedEpisode, WatchedMovie, WatchedSeason, WatchedShow, WatchedUpdate,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const API_URL: &str = "https://api.trakt.tv";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktIds {
    pub trakt: Option<i64>,
    pub slug: Option<String>,
    pub imdb: Option<String>,
    pub tmdb: Option<i64>,
    pub tvdb: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktMedia {
    pub title: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: TraktIds,
    pub updated_at: Option<DateTime<Utc>>,
    pub runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TraktListEntry {
    pub movie: Option<TraktMedia>,
    pub show: Option<TraktMedia>,
}

#[derive(Debug, Deserialize)]
pub struct TraktWatchedEpisode {
    pub number: u32,
    #[serde(default)]
    pub plays: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TraktWatchedSeason {
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<TraktWatchedEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct TraktWatchedEntry {
    #[serde(default)]
    pub plays: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
    pub movie: Option<TraktMedia>,
    pub show: Option<TraktMedia>,
    #[serde(default)]
    pub seasons: Vec<TraktWatchedSeason>,
}

#[derive(Debug, Deserialize)]
pub struct TraktEpisode {
    pub season: u32,
    pub number: u32,
    #[serde(default)]
    pub ids: TraktIds,
    pub runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TraktPlayback {
    #[serde(default)]
    pub progress: f64,
    pub paused_at: DateTime<Utc>,
    pub movie: Option<TraktMedia>,
    pub show: Option<TraktMedia>,
    pub episode: Option<TraktEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct TraktUserList {
    pub name: String,
    #[serde(default)]
    pub ids: TraktIds,
}

#[derive(Debug, Default, Deserialize)]
pub struct TraktActivityStamps {
    pub watched_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub watchlisted_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub hidden_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TraktListsActivity {
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TraktLastActivities {
    pub all: Option<DateTime<Utc>>,
    #[serde(default)]
    pub movies: TraktActivityStamps,
    #[serde(default)]
    pub episodes: TraktActivityStamps,
    #[serde(default)]
    pub shows: TraktActivityStamps,
    #[serde(default)]
    pub seasons: TraktActivityStamps,
    #[serde(default)]
    pub lists: TraktListsActivity,
}

/// Trakt sometimes returns IMDB IDs with slashes in them.
fn clean_legacy_id(imdb: Option<&str>) -> String {
    imdb.unwrap_or_default().replace('/', "")
}

pub fn tracked_ids(ids: &TraktIds) -> TrackedIds {
    TrackedIds {
        tracking_id: ids.trakt.unwrap_or_default(),
        catalog_id: ids.tmdb.unwrap_or_default(),
        external_db_id: ids.tvdb.unwrap_or_default(),
        external_legacy_id: clean_legacy_id(ids.imdb.as_deref()),
        slug: ids.slug.clone().unwrap_or_default(),
    }
}

fn list_item(media: &TraktMedia) -> ListItem {
    ListItem {
        title: media.title.clone().unwrap_or_default(),
        year: media.year,
        ids: tracked_ids(&media.ids),
        updated_at: media.updated_at,
    }
}

pub fn list_items(entries: Vec<TraktListEntry>, kind: ListKind) -> Vec<ListItem> {
    entries
        .iter()
        .filter_map(|entry| match kind {
            ListKind::Movies => entry.movie.as_ref(),
            ListKind::Shows => entry.show.as_ref(),
        })
        .map(list_item)
        .collect()
}

pub fn watched_movies(entries: Vec<TraktWatchedEntry>) -> Vec<WatchedMovie> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let movie = entry.movie?;
            Some(WatchedMovie {
                title: movie.title.unwrap_or_default(),
                year: movie.year,
                ids: tracked_ids(&movie.ids),
                plays: entry.plays,
                last_watched_at: entry.last_watched_at,
            })
        })
        .collect()
}

pub fn watched_shows(entries: Vec<TraktWatchedEntry>) -> Vec<WatchedShow> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let show = entry.show?;
            let seasons = entry
                .seasons
                .into_iter()
                .map(|season| WatchedSeason {
                    number: season.number,
                    episodes: season
                        .episodes
                        .into_iter()
                        .map(|e| WatchedEpisode {
                            number: e.number,
                            plays: e.plays,
                            last_watched_at: e.last_watched_at,
                        })
                        .collect(),
                })
                .collect();
            Some(WatchedShow {
                title: show.title.unwrap_or_default(),
                year: show.year,
                ids: tracked_ids(&show.ids),
                plays: entry.plays,
                last_watched_at: entry.last_watched_at,
                watched: false,
                seasons,
            })
        })
        .collect()
}

pub fn paused_movies(entries: Vec<TraktPlayback>) -> Vec<PausedMovie> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let movie = entry.movie?;
            Some(PausedMovie {
                ids: tracked_ids(&movie.ids),
                progress: entry.progress,
                runtime_minutes: movie.runtime.unwrap_or_default(),
                paused_at: entry.paused_at,
            })
        })
        .collect()
}

pub fn paused_episodes(entries: Vec<TraktPlayback>) -> Vec<PausedEpisode> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let show = entry.show?;
            let episode = entry.episode?;
            Some(PausedEpisode {
                show_ids: tracked_ids(&show.ids),
                episode_tracking_id: episode.ids.trakt.unwrap_or_default(),
                season: episode.season,
                number: episode.number,
                progress: entry.progress,
                runtime_minutes: episode.runtime.or(show.runtime).unwrap_or_default(),
                paused_at: entry.paused_at,
            })
        })
        .collect()
}

pub fn user_lists(lists: Vec<TraktUserList>) -> Vec<UserList> {
    lists
        .into_iter()
        .map(|list| UserList {
            name: list.name,
            tracking_id: list.ids.trakt.unwrap_or_default(),
            slug: list.ids.slug.unwrap_or_default(),
        })
        .collect()
}

fn stamps(raw: TraktActivityStamps) -> ActivityStamps {
    ActivityStamps {
        watched_at: raw.watched_at.unwrap_or_default(),
        collected_at: raw.collected_at.unwrap_or_default(),
        watchlisted_at: raw.watchlisted_at.unwrap_or_default(),
        paused_at: raw.paused_at.unwrap_or_default(),
        hidden_at: raw.hidden_at.unwrap_or_default(),
    }
}

pub fn last_activities(raw: TraktLastActivities) -> LastActivities {
    LastActivities {
        all: raw.all.unwrap_or_default(),
        movies: stamps(raw.movies),
        episodes: stamps(raw.episodes),
        shows: stamps(raw.shows),
        seasons: stamps(raw.seasons),
        lists_updated_at: raw.lists.updated_at.unwrap_or_default(),
    }
}

/// Builds the `/sync/history` body for a batch of updates.
///
/// Episodes are grouped under their show and season, keyed by catalog IDs.
pub fn history_body(items: &[WatchedUpdate]) -> Value {
    let mut movies = Vec::new();
    let mut shows: BTreeMap<i64, BTreeMap<u32, Vec<Value>>> = BTreeMap::new();

    for item in items {
        let mut entry = match item.media_type {
            MediaType::Movie => json!({ "ids": { "tmdb": item.catalog_id } }),
            MediaType::Episode => json!({ "number": item.episode }),
            _ => continue,
        };
        if item.watched {
            if let Some(at) = item.watched_at {
                entry["watched_at"] = json!(at.to_rfc3339());
            }
        }

        match item.media_type {
            MediaType::Movie => movies.push(entry),
            _ => shows
                .entry(item.catalog_id)
                .or_default()
                .entry(item.season)
                .or_default()
                .push(entry),
        }
    }

    let shows: Vec<Value> = shows
        .into_iter()
        .map(|(show_id, seasons)| {
            let seasons: Vec<Value> = seasons
                .into_iter()
                .map(|(number, episodes)| json!({ "number": number, "episodes": episodes }))
                .collect();
            json!({ "ids": { "tmdb": show_id }, "seasons": seasons })
        })
        .collect();

    json!({ "movies": movies, "shows": shows })
}
