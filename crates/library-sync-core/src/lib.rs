pub mod cache;
pub mod database;
pub mod diff;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod ingest;
pub mod orchestrator;
pub mod placeholder;
pub mod reconcile;
pub mod removal;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod status;
pub mod tracking_sync;

#[cfg(test)]
mod testing;

pub use diff::{diff_list, diff_watched_movies, diff_watched_shows};

pub use cache::PersistedCache;
pub use database::ItemDatabase;
pub use duplicates::{DuplicateDetector, DuplicateStats};
pub use error::{LibraryError, Result};
pub use index::LibraryState;
pub use ingest::{IngestReport, LibraryIngest};
pub use orchestrator::{ListSync, ListSyncResult};
pub use placeholder::PlaceholderWriter;
pub use reconcile::WatchedReconciler;
pub use removal::{RemovalDebouncer, RemovalHandle, RemovedEpisode};
pub use scheduler::{RefreshHandler, RefreshScheduler};
pub use service::{Collaborators, LibraryService};
pub use snapshot::{ListId, SnapshotStore};
pub use status::{RefreshCategory, RefreshStatus, RunGuard};
pub use tracking_sync::{TrackingSync, TrackingSyncReport};
