use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::{MediaCenterUids, UniqueIds};

pub const PLACEHOLDER_EXTENSION: &str = "strm";

/// Playback position in seconds; zero position means nothing to resume.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Resume {
    pub position: f64,
    pub total: f64,
}

impl Resume {
    pub fn is_empty(&self) -> bool {
        self.position <= 0.0
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.total = 0.0;
    }

    /// Formats the position as `h:mm:ss`, or an empty string when unset.
    pub fn to_display(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let secs = self.position as u64;
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub title: String,
    pub year: i32,
    pub file: PathBuf,
    pub date_added: DateTime<Utc>,
    pub uids: UniqueIds,
    pub media_center: Option<MediaCenterUids>,
    pub resume: Resume,
}

impl Movie {
    pub fn is_watched(&self) -> bool {
        self.uids.is_watched()
    }

    pub fn has_placeholder(&self) -> bool {
        is_placeholder(&self.file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Season {
    pub title: String,
    pub season: u32,
    pub episode_count: u32,
    pub uids: UniqueIds,
    pub media_center: Option<MediaCenterUids>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub file: PathBuf,
    pub date_added: DateTime<Utc>,
    pub uids: UniqueIds,
    pub media_center: Option<MediaCenterUids>,
    pub resume: Resume,
}

impl Episode {
    pub fn is_watched(&self) -> bool {
        self.uids.is_watched()
    }

    pub fn has_placeholder(&self) -> bool {
        is_placeholder(&self.file)
    }
}

/// A show with its seasons in order and all episodes in one flat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Show {
    pub title: String,
    pub year: i32,
    pub date_added: DateTime<Utc>,
    pub seasons: Vec<Season>,
    pub episodes: Vec<Episode>,
    pub uids: UniqueIds,
    pub media_center: Option<MediaCenterUids>,
}

impl Show {
    pub fn is_watched(&self) -> bool {
        self.uids.is_watched()
    }

    pub fn episode(&self, season: u32, episode: u32) -> Option<&Episode> {
        self.episodes
            .iter()
            .find(|e| e.season == season && e.episode == episode)
    }

    pub fn episode_mut(&mut self, season: u32, episode: u32) -> Option<&mut Episode> {
        self.episodes
            .iter_mut()
            .find(|e| e.season == season && e.episode == episode)
    }

    pub fn season(&self, season: u32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.season == season)
    }

    /// Directories holding this show's placeholder episodes.
    pub fn placeholder_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for episode in self.episodes.iter().filter(|e| e.has_placeholder()) {
            if let Some(dir) = episode.file.parent() {
                if !dirs.iter().any(|d| d == dir) {
                    dirs.push(dir.to_path_buf());
                }
            }
        }
        dirs
    }
}

pub fn is_placeholder(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(PLACEHOLDER_EXTENSION)
}
