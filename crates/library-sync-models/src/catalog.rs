use serde::{Deserialize, Serialize};

/// Which external database an identifier belongs to when asking the catalog
/// to resolve it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExternalSource {
    Legacy,
    ExternalDb,
}

impl ExternalSource {
    /// Query value the catalog API expects for this source.
    pub fn as_query(self) -> &'static str {
        match self {
            ExternalSource::Legacy => "imdb_id",
            ExternalSource::ExternalDb => "tvdb_id",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalIds {
    #[serde(default)]
    pub legacy_id: String,
    #[serde(default)]
    pub external_db_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieMetadata {
    pub id: i64,
    pub title: String,
    pub original_title: String,
    /// `YYYY-MM-DD`, may be empty
    pub release_date: String,
    #[serde(default)]
    pub runtime_minutes: u32,
    #[serde(default)]
    pub external_ids: ExternalIds,
}

impl MovieMetadata {
    pub fn year(&self) -> &str {
        leading_year(&self.release_date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonSummary {
    pub season: u32,
    pub episode_count: u32,
    #[serde(default)]
    pub air_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowMetadata {
    pub id: i64,
    pub name: String,
    pub original_name: String,
    pub first_air_date: String,
    pub seasons: Vec<SeasonSummary>,
    #[serde(default)]
    pub external_ids: ExternalIds,
}

impl ShowMetadata {
    pub fn year(&self) -> &str {
        leading_year(&self.first_air_date)
    }

    pub fn season_episode_count(&self, season: u32) -> u32 {
        self.seasons
            .iter()
            .find(|s| s.season == season)
            .map(|s| s.episode_count)
            .unwrap_or(0)
    }

    /// Seasons with episodes, specials excluded.
    pub fn real_season_count(&self) -> usize {
        self.seasons
            .iter()
            .filter(|s| s.season > 0 && s.episode_count > 0)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeMetadata {
    pub id: i64,
    pub name: String,
    pub season_number: u32,
    pub episode_number: u32,
    #[serde(default)]
    pub air_date: String,
    #[serde(default)]
    pub runtime_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonMetadata {
    pub season: u32,
    #[serde(default)]
    pub air_date: String,
    pub episodes: Vec<EpisodeMetadata>,
}

fn leading_year(date: &str) -> &str {
    date.split('-').next().unwrap_or_default()
}
