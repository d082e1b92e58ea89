use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::MediaType;

/// IDs a tracking-service item carries. Zero / empty means unknown.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedIds {
    pub tracking_id: i64,
    #[serde(default)]
    pub catalog_id: i64,
    #[serde(default)]
    pub external_db_id: i64,
    #[serde(default)]
    pub external_legacy_id: String,
    #[serde(default)]
    pub slug: String,
}

/// One entry of a watchlist, collection or custom list snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListItem {
    pub title: String,
    pub year: Option<i32>,
    pub ids: TrackedIds,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedMovie {
    pub title: String,
    pub year: Option<i32>,
    pub ids: TrackedIds,
    pub plays: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedEpisode {
    pub number: u32,
    pub plays: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedSeason {
    pub number: u32,
    pub episodes: Vec<WatchedEpisode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedShow {
    pub title: String,
    pub year: Option<i32>,
    pub ids: TrackedIds,
    pub plays: u32,
    pub last_watched_at: Option<DateTime<Utc>>,
    /// Set once every real season is fully watched
    #[serde(default)]
    pub watched: bool,
    pub seasons: Vec<WatchedSeason>,
}

impl WatchedShow {
    pub fn has_episode(&self, season: u32, episode: u32) -> bool {
        self.seasons
            .iter()
            .filter(|s| s.number == season)
            .any(|s| s.episodes.iter().any(|e| e.number == episode))
    }
}

/// A watched-state change pushed back to the tracking service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedUpdate {
    /// Hash of the local placeholder path this update came from
    pub file_key: u64,
    pub media_type: MediaType,
    /// Movie catalog ID, or the show catalog ID for episodes
    pub catalog_id: i64,
    pub season: u32,
    pub episode: u32,
    pub watched: bool,
    pub watched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivityStamps {
    #[serde(default)]
    pub watched_at: DateTime<Utc>,
    #[serde(default)]
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub watchlisted_at: DateTime<Utc>,
    #[serde(default)]
    pub paused_at: DateTime<Utc>,
    #[serde(default)]
    pub hidden_at: DateTime<Utc>,
}

/// Per-category "last changed" timestamps reported by the tracking service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LastActivities {
    #[serde(default)]
    pub all: DateTime<Utc>,
    #[serde(default)]
    pub movies: ActivityStamps,
    #[serde(default)]
    pub episodes: ActivityStamps,
    #[serde(default)]
    pub shows: ActivityStamps,
    #[serde(default)]
    pub seasons: ActivityStamps,
    #[serde(default)]
    pub lists_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PausedMovie {
    pub ids: TrackedIds,
    /// Percentage, 0-100
    pub progress: f64,
    pub runtime_minutes: u32,
    pub paused_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PausedEpisode {
    pub show_ids: TrackedIds,
    pub episode_tracking_id: i64,
    pub season: u32,
    pub number: u32,
    pub progress: f64,
    pub runtime_minutes: u32,
    pub paused_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserList {
    pub name: String,
    pub tracking_id: i64,
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watched_show_has_episode() {
        let show = WatchedShow {
            title: "Show".to_string(),
            year: None,
            ids: TrackedIds::default(),
            plays: 2,
            last_watched_at: None,
            watched: false,
            seasons: vec![WatchedSeason {
                number: 1,
                episodes: vec![WatchedEpisode { number: 3, plays: 1, last_watched_at: None }],
            }],
        };
        assert!(show.has_episode(1, 3));
        assert!(!show.has_episode(1, 4));
        assert!(!show.has_episode(2, 3));
    }

    #[test]
    fn test_last_activities_defaults_to_epoch() {
        let activities: LastActivities = serde_json::from_str("{}").unwrap();
        assert_eq!(activities.all, DateTime::<Utc>::default());
        assert_eq!(activities.movies.watched_at.timestamp(), 0);
    }
}
