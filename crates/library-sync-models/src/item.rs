use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::MediaType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ItemState {
    Deleted = 0,
    Active = 1,
}

impl ItemState {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ItemState::Deleted),
            1 => Some(ItemState::Active),
            _ => None,
        }
    }
}

/// Persisted state of a library item, keyed by `(id, media_type)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryItem {
    /// Catalog ID
    pub id: i64,
    pub media_type: MediaType,
    /// Parent show for episodes, 0 otherwise
    pub show_id: i64,
    pub state: ItemState,
}

impl LibraryItem {
    pub fn new(id: i64, media_type: MediaType, show_id: i64, state: ItemState) -> Self {
        Self { id, media_type, show_id, state }
    }
}

/// A torrent that was played for a library item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BtItem {
    pub info_hash: String,
    pub catalog_id: i64,
    pub media_type: MediaType,
    pub show_id: i64,
    pub season: u32,
    pub episode: u32,
    pub state: ItemState,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHistoryEntry {
    pub kind: String,
    pub query: String,
    pub searched_at: DateTime<Utc>,
}

/// Catalog item to torrent assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentLink {
    pub catalog_id: i64,
    pub info_hash: String,
}
