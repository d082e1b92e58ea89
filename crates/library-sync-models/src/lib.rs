pub mod catalog;
pub mod item;
pub mod library;
pub mod media;
pub mod tracking;
pub mod unique_ids;

pub use catalog::{EpisodeMetadata, ExternalIds, ExternalSource, MovieMetadata, SeasonMetadata, SeasonSummary, ShowMetadata};
pub use item::{BtItem, ItemState, LibraryItem, SearchHistoryEntry, TorrentLink};
pub use library::{Episode, Movie, Resume, Season, Show, PLACEHOLDER_EXTENSION};
pub use media::{ListKind, MediaType};
pub use tracking::{
    ActivityStamps, LastActivities, ListItem, PausedEpisode, PausedMovie, TrackedIds, UserList, WatchedEpisode,
    WatchedMovie, WatchedSeason, WatchedShow, WatchedUpdate,
};
pub use unique_ids::{MediaCenterUids, UniqueIds};
