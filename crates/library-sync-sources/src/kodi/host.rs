use crate::error::SourceError;
use crate::kodi::rpc::RpcClient;
use crate::traits::MediaCenterHost;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use library_sync_config::KodiConfig;
use library_sync_models::{Episode, MediaCenterUids, MediaType, Movie, Resume, Season, Show, UniqueIds};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MOVIE_PROPERTIES: &[&str] = &["title", "year", "file", "dateadded", "playcount", "uniqueid", "resume"];
const SHOW_PROPERTIES: &[&str] = &["title", "year", "dateadded", "playcount", "uniqueid"];
const SEASON_PROPERTIES: &[&str] = &["season", "episode", "playcount", "tvshowid", "title"];
const EPISODE_PROPERTIES: &[&str] = &[
    "title", "season", "episode", "file", "dateadded", "playcount", "uniqueid", "resume", "tvshowid",
];

#[derive(Debug, Default, Deserialize)]
struct KodiResume {
    #[serde(default)]
    position: f64,
    #[serde(default)]
    total: f64,
}

#[derive(Debug, Deserialize)]
struct KodiMovie {
    movieid: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: i32,
    #[serde(default)]
    file: String,
    #[serde(default)]
    dateadded: String,
    #[serde(default)]
    playcount: u32,
    #[serde(default)]
    uniqueid: BTreeMap<String, String>,
    #[serde(default)]
    resume: KodiResume,
}

#[derive(Debug, Deserialize)]
struct KodiShow {
    tvshowid: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: i32,
    #[serde(default)]
    dateadded: String,
    #[serde(default)]
    playcount: u32,
    #[serde(default)]
    uniqueid: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct KodiSeason {
    seasonid: i64,
    #[serde(default)]
    title: String,
    season: u32,
    #[serde(default)]
    episode: u32,
    #[serde(default)]
    playcount: u32,
}

#[derive(Debug, Deserialize)]
struct KodiEpisode {
    episodeid: i64,
    tvshowid: i64,
    #[serde(default)]
    title: String,
    season: u32,
    episode: u32,
    #[serde(default)]
    file: String,
    #[serde(default)]
    dateadded: String,
    #[serde(default)]
    playcount: u32,
    #[serde(default)]
    uniqueid: BTreeMap<String, String>,
    #[serde(default)]
    resume: KodiResume,
}

#[derive(Debug, Default, Deserialize)]
struct MoviesResult {
    #[serde(default)]
    movies: Vec<KodiMovie>,
}

#[derive(Debug, Default, Deserialize)]
struct ShowsResult {
    #[serde(default)]
    tvshows: Vec<KodiShow>,
}

#[derive(Debug, Default, Deserialize)]
struct SeasonsResult {
    #[serde(default)]
    seasons: Vec<KodiSeason>,
}

#[derive(Debug, Default, Deserialize)]
struct EpisodesResult {
    #[serde(default)]
    episodes: Vec<KodiEpisode>,
}

#[derive(Debug, Deserialize)]
struct ActivePlayer {
    #[serde(rename = "playerid")]
    _playerid: i64,
}

fn parse_date(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn format_date(value: DateTime<Utc>) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn unique_ids(media_type: MediaType, local_id: i64, playcount: u32, ids: &BTreeMap<String, String>) -> UniqueIds {
    let mut uids = UniqueIds::new(media_type);
    uids.local_id = local_id;
    uids.play_count = playcount;
    uids.catalog_id = ids.get("tmdb").and_then(|v| v.parse().ok()).unwrap_or_default();
    uids.external_db_id = ids.get("tvdb").and_then(|v| v.parse().ok()).unwrap_or_default();
    uids.external_legacy_id = ids.get("imdb").cloned().unwrap_or_default();
    uids
}

fn media_center_uids(local_id: i64, ids: BTreeMap<String, String>) -> Option<MediaCenterUids> {
    Some(MediaCenterUids { local_id, ids })
}

fn movie_from_rpc(movie: KodiMovie) -> Movie {
    let uids = unique_ids(MediaType::Movie, movie.movieid, movie.playcount, &movie.uniqueid);
    Movie {
        title: movie.title,
        year: movie.year,
        file: PathBuf::from(movie.file),
        date_added: parse_date(&movie.dateadded),
        uids,
        media_center: media_center_uids(movie.movieid, movie.uniqueid),
        resume: Resume {
            position: movie.resume.position,
            total: movie.resume.total,
        },
    }
}

fn episode_from_rpc(episode: KodiEpisode) -> Episode {
    let uids = unique_ids(MediaType::Episode, episode.episodeid, episode.playcount, &episode.uniqueid);
    Episode {
        title: episode.title,
        season: episode.season,
        episode: episode.episode,
        file: PathBuf::from(episode.file),
        date_added: parse_date(&episode.dateadded),
        uids,
        media_center: media_center_uids(episode.episodeid, episode.uniqueid),
        resume: Resume {
            position: episode.resume.position,
            total: episode.resume.total,
        },
    }
}

fn season_from_rpc(season: KodiSeason) -> Season {
    let mut uids = UniqueIds::new(MediaType::Season);
    uids.local_id = season.seasonid;
    uids.play_count = season.playcount;
    Season {
        title: season.title,
        season: season.season,
        episode_count: season.episode,
        uids,
        media_center: Some(MediaCenterUids::new(season.seasonid)),
    }
}

fn show_from_rpc(show: KodiShow, mut seasons: Vec<Season>, mut episodes: Vec<Episode>) -> Show {
    seasons.sort_by_key(|s| s.season);
    episodes.sort_by_key(|e| (e.season, e.episode));

    let uids = unique_ids(MediaType::Show, show.tvshowid, show.playcount, &show.uniqueid);
    for season in seasons.iter_mut() {
        season.uids.catalog_id = uids.catalog_id;
    }

    Show {
        title: show.title,
        year: show.year,
        date_added: parse_date(&show.dateadded),
        seasons,
        episodes,
        uids,
        media_center: media_center_uids(show.tvshowid, show.uniqueid),
    }
}

/// Kodi front end reached over its JSON-RPC interface.
pub struct KodiHost {
    rpc: RpcClient,
    addon: RpcClient,
}

impl KodiHost {
    pub fn new(config: &KodiConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds.max(1));
        Self {
            rpc: RpcClient::new(config.rpc_url.clone(), config.username.clone(), config.password.clone(), timeout),
            // Dialogs block until the user answers
            addon: RpcClient::new(config.addon_rpc_url.clone(), None, None, Duration::from_secs(300)),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<(), SourceError> {
        let _: Value = self.rpc.call(method, params).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaCenterHost for KodiHost {
    async fn scan_library(&self, dir: Option<&Path>) -> Result<(), SourceError> {
        let params = match dir {
            Some(dir) => json!({ "directory": dir.to_string_lossy(), "showdialogs": false }),
            None => json!({}),
        };
        info!(operation = "kodi_scan", directory = ?dir, "Requesting library scan");
        self.call("VideoLibrary.Scan", params).await
    }

    async fn clean_library(&self, dir: Option<&Path>, content: &str) -> Result<(), SourceError> {
        let params = match dir {
            Some(dir) => json!({ "directory": dir.to_string_lossy(), "content": content, "showdialogs": false }),
            None => json!({ "showdialogs": false }),
        };
        info!(operation = "kodi_clean", directory = ?dir, content = content, "Requesting library clean");
        self.call("VideoLibrary.Clean", params).await
    }

    async fn remove_movie(&self, local_id: i64) -> Result<(), SourceError> {
        self.call("VideoLibrary.RemoveMovie", json!({ "movieid": local_id })).await
    }

    async fn remove_show(&self, local_id: i64) -> Result<(), SourceError> {
        self.call("VideoLibrary.RemoveTVShow", json!({ "tvshowid": local_id })).await
    }

    async fn remove_episode(&self, local_id: i64) -> Result<(), SourceError> {
        self.call("VideoLibrary.RemoveEpisode", json!({ "episodeid": local_id })).await
    }

    async fn set_movie_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        let mut params = json!({ "movieid": local_id, "playcount": playcount, "resume": { "position": 0, "total": 0 } });
        params["lastplayed"] = json!(format_date(last_played.unwrap_or_else(Utc::now)));
        self.call("VideoLibrary.SetMovieDetails", params).await
    }

    async fn set_episode_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        let mut params =
            json!({ "episodeid": local_id, "playcount": playcount, "resume": { "position": 0, "total": 0 } });
        params["lastplayed"] = json!(format_date(last_played.unwrap_or_else(Utc::now)));
        self.call("VideoLibrary.SetEpisodeDetails", params).await
    }

    async fn set_season_watched(&self, local_id: i64, playcount: u32) -> Result<(), SourceError> {
        self.call("VideoLibrary.SetSeasonDetails", json!({ "seasonid": local_id, "playcount": playcount }))
            .await
    }

    async fn set_show_watched(
        &self,
        local_id: i64,
        playcount: u32,
        last_played: Option<DateTime<Utc>>,
    ) -> Result<(), SourceError> {
        let mut params = json!({ "tvshowid": local_id, "playcount": playcount });
        if let Some(at) = last_played {
            params["lastplayed"] = json!(format_date(at));
        }
        self.call("VideoLibrary.SetTVShowDetails", params).await
    }

    async fn set_movie_progress(
        &self,
        local_id: i64,
        position: f64,
        total: f64,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        let params = json!({
            "movieid": local_id,
            "resume": { "position": position, "total": total },
            "lastplayed": format_date(at),
        });
        self.call("VideoLibrary.SetMovieDetails", params).await
    }

    async fn set_episode_progress(
        &self,
        local_id: i64,
        position: f64,
        total: f64,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        let params = json!({
            "episodeid": local_id,
            "resume": { "position": position, "total": total },
            "lastplayed": format_date(at),
        });
        self.call("VideoLibrary.SetEpisodeDetails", params).await
    }

    async fn confirm_dialog(&self, title: &str, message: &str) -> Result<bool, SourceError> {
        self.addon
            .call("Dialog", json!({ "title": title, "message": message }))
            .await
    }

    async fn notify(&self, title: &str, message: &str) -> Result<(), SourceError> {
        self.call(
            "GUI.ShowNotification",
            json!({ "title": title, "message": message, "displaytime": 5000 }),
        )
        .await
    }

    async fn is_playing(&self) -> Result<bool, SourceError> {
        let players: Vec<ActivePlayer> = self.rpc.call("Player.GetActivePlayers", json!({})).await?;
        Ok(!players.is_empty())
    }

    async fn library_movies(&self) -> Result<Vec<Movie>, SourceError> {
        let result: MoviesResult = self
            .rpc
            .call("VideoLibrary.GetMovies", json!({ "properties": MOVIE_PROPERTIES }))
            .await?;
        debug!(operation = "kodi_library_movies", count = result.movies.len());
        Ok(result.movies.into_iter().map(movie_from_rpc).collect())
    }

    async fn library_shows(&self) -> Result<Vec<Show>, SourceError> {
        let shows: ShowsResult = self
            .rpc
            .call("VideoLibrary.GetTVShows", json!({ "properties": SHOW_PROPERTIES }))
            .await?;
        let episodes: EpisodesResult = self
            .rpc
            .call("VideoLibrary.GetEpisodes", json!({ "properties": EPISODE_PROPERTIES }))
            .await?;

        let mut episodes_by_show: HashMap<i64, Vec<Episode>> = HashMap::new();
        for episode in episodes.episodes {
            episodes_by_show
                .entry(episode.tvshowid)
                .or_default()
                .push(episode_from_rpc(episode));
        }

        let mut result = Vec::with_capacity(shows.tvshows.len());
        for show in shows.tvshows {
            let seasons: SeasonsResult = self
                .rpc
                .call(
                    "VideoLibrary.GetSeasons",
                    json!({ "tvshowid": show.tvshowid, "properties": SEASON_PROPERTIES }),
                )
                .await?;
            let seasons = seasons.seasons.into_iter().map(season_from_rpc).collect();
            let episodes = episodes_by_show.remove(&show.tvshowid).unwrap_or_default();
            result.push(show_from_rpc(show, seasons, episodes));
        }

        debug!(operation = "kodi_library_shows", count = result.len());
        Ok(result)
    }
}
