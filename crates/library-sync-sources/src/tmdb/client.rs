use crate::error::{check_response, SourceError};
use crate::traits::CatalogClient;
use async_trait::async_trait;
use library_sync_config::TmdbConfig;
use library_sync_models::{
    EpisodeMetadata, ExternalIds, ExternalSource, MediaType, MovieMetadata, SeasonMetadata, SeasonSummary,
    ShowMetadata,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<i64>,
}

impl From<TmdbExternalIds> for ExternalIds {
    fn from(ids: TmdbExternalIds) -> Self {
        ExternalIds {
            legacy_id: ids.imdb_id.unwrap_or_default(),
            external_db_id: ids.tvdb_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_title: String,
    release_date: Option<String>,
    runtime: Option<u32>,
    imdb_id: Option<String>,
    #[serde(default)]
    external_ids: TmdbExternalIds,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonSummary {
    season_number: u32,
    #[serde(default)]
    episode_count: u32,
    air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbShow {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    original_name: String,
    first_air_date: Option<String>,
    #[serde(default)]
    seasons: Vec<TmdbSeasonSummary>,
    #[serde(default)]
    external_ids: TmdbExternalIds,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    id: i64,
    #[serde(default)]
    name: String,
    season_number: u32,
    episode_number: u32,
    air_date: Option<String>,
    runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeason {
    season_number: u32,
    air_date: Option<String>,
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindResult {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TmdbFind {
    #[serde(default)]
    movie_results: Vec<TmdbFindResult>,
    #[serde(default)]
    tv_results: Vec<TmdbFindResult>,
}

impl From<TmdbMovie> for MovieMetadata {
    fn from(movie: TmdbMovie) -> Self {
        let mut external_ids = ExternalIds::from(movie.external_ids);
        if external_ids.legacy_id.is_empty() {
            external_ids.legacy_id = movie.imdb_id.unwrap_or_default();
        }
        MovieMetadata {
            id: movie.id,
            title: movie.title,
            original_title: movie.original_title,
            release_date: movie.release_date.unwrap_or_default(),
            runtime_minutes: movie.runtime.unwrap_or_default(),
            external_ids,
        }
    }
}

impl From<TmdbShow> for ShowMetadata {
    fn from(show: TmdbShow) -> Self {
        ShowMetadata {
            id: show.id,
            name: show.name,
            original_name: show.original_name,
            first_air_date: show.first_air_date.unwrap_or_default(),
            seasons: show
                .seasons
                .into_iter()
                .map(|s| SeasonSummary {
                    season: s.season_number,
                    episode_count: s.episode_count,
                    air_date: s.air_date.unwrap_or_default(),
                })
                .collect(),
            external_ids: show.external_ids.into(),
        }
    }
}

impl From<TmdbEpisode> for EpisodeMetadata {
    fn from(episode: TmdbEpisode) -> Self {
        EpisodeMetadata {
            id: episode.id,
            name: episode.name,
            season_number: episode.season_number,
            episode_number: episode.episode_number,
            air_date: episode.air_date.unwrap_or_default(),
            runtime_minutes: episode.runtime.unwrap_or_default(),
        }
    }
}

impl From<TmdbSeason> for SeasonMetadata {
    fn from(season: TmdbSeason) -> Self {
        SeasonMetadata {
            season: season.season_number,
            air_date: season.air_date.unwrap_or_default(),
            episodes: season.episodes.into_iter().map(Into::into).collect(),
        }
    }
}

pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .user_agent(concat!("strmsync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &TmdbConfig) -> Self {
        Self::new(config.api_key.clone(), config.base_url.clone())
    }

    /// GET a catalog resource; a 404 becomes `Ok(None)`.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        action: &str,
    ) -> Result<Option<T>, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(operation = "tmdb_get", url = %url);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_response(response, action).await?;
        let text = response.text().await?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[async_trait]
impl CatalogClient for TmdbClient {
    async fn get_movie(&self, catalog_id: i64, language: &str) -> Result<Option<MovieMetadata>, SourceError> {
        let movie: Option<TmdbMovie> = self
            .get(
                &format!("/movie/{}", catalog_id),
                &[("language", language), ("append_to_response", "external_ids")],
                "fetch movie",
            )
            .await?;
        Ok(movie.map(Into::into))
    }

    async fn get_show(&self, catalog_id: i64, language: &str) -> Result<Option<ShowMetadata>, SourceError> {
        let show: Option<TmdbShow> = self
            .get(
                &format!("/tv/{}", catalog_id),
                &[("language", language), ("append_to_response", "external_ids")],
                "fetch show",
            )
            .await?;
        Ok(show.map(Into::into))
    }

    async fn get_season(
        &self,
        show_id: i64,
        season: u32,
        language: &str,
    ) -> Result<Option<SeasonMetadata>, SourceError> {
        let season: Option<TmdbSeason> = self
            .get(
                &format!("/tv/{}/season/{}", show_id, season),
                &[("language", language)],
                "fetch season",
            )
            .await?;
        Ok(season.map(Into::into))
    }

    async fn get_episode(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
        language: &str,
    ) -> Result<Option<EpisodeMetadata>, SourceError> {
        let episode: Option<TmdbEpisode> = self
            .get(
                &format!("/tv/{}/season/{}/episode/{}", show_id, season, episode),
                &[("language", language)],
                "fetch episode",
            )
            .await?;
        Ok(episode.map(Into::into))
    }

    async fn resolve_external_id(
        &self,
        external_id: &str,
        source: ExternalSource,
        media_type: MediaType,
    ) -> Result<Option<i64>, SourceError> {
        if external_id.is_empty() {
            return Ok(None);
        }

        let found: Option<TmdbFind> = self
            .get(
                &format!("/find/{}", external_id),
                &[("external_source", source.as_query())],
                "resolve external id",
            )
            .await?;

        Ok(found.and_then(|found| {
            let results = match media_type {
                MediaType::Movie => found.movie_results,
                _ => found.tv_results,
            };
            results.first().map(|r| r.id)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_conversion_falls_back_to_top_level_imdb() {
        let raw: TmdbMovie = serde_json::from_str(
            r#"{"id": 603, "title": "Matrix", "original_title": "The Matrix", "release_date": "1999-03-30",
                "runtime": 136, "imdb_id": "tt0133093"}"#,
        )
        .unwrap();

        let movie = MovieMetadata::from(raw);
        assert_eq!(movie.year(), "1999");
        assert_eq!(movie.external_ids.legacy_id, "tt0133093");
        assert_eq!(movie.runtime_minutes, 136);
    }

    #[test]
    fn test_show_conversion_reads_seasons() {
        let raw: TmdbShow = serde_json::from_str(
            r#"{"id": 1396, "name": "Breaking Bad", "original_name": "Breaking Bad", "first_air_date": "2008-01-20",
                "seasons": [{"season_number": 0, "episode_count": 9, "air_date": null},
                            {"season_number": 1, "episode_count": 7, "air_date": "2008-01-20"}],
                "external_ids": {"imdb_id": "tt0903747", "tvdb_id": 81189}}"#,
        )
        .unwrap();

        let show = ShowMetadata::from(raw);
        assert_eq!(show.seasons.len(), 2);
        assert_eq!(show.seasons[0].air_date, "");
        assert_eq!(show.external_ids.external_db_id, 81189);
        assert_eq!(show.real_season_count(), 1);
    }

    #[test]
    fn test_find_picks_results_by_media_type() {
        let found: TmdbFind =
            serde_json::from_str(r#"{"movie_results": [], "tv_results": [{"id": 1399}]}"#).unwrap();
        assert!(found.movie_results.is_empty());
        assert_eq!(found.tv_results[0].id, 1399);
    }
}
