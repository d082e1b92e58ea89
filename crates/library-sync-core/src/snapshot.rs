//! Previous/current snapshots of tracking-service lists, kept in the persisted cache.

use library_sync_models::{ListItem, ListKind, WatchedMovie, WatchedShow};
use library_sync_sources::{SourceError, TrackingClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use crate::cache::{PersistedCache, CURRENT_SNAPSHOT_TTL, SNAPSHOT_TTL};
use crate::error::Result;

/// Identity of a synced list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListId {
    Watchlist,
    Collection,
    /// A user list, by its tracking ID or slug
    Custom(String),
}

impl ListId {
    pub fn parse(value: &str) -> Self {
        match value {
            "watchlist" => ListId::Watchlist,
            "collection" => ListId::Collection,
            other => ListId::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListId::Watchlist => f.write_str("watchlist"),
            ListId::Collection => f.write_str("collection"),
            ListId::Custom(id) => write!(f, "list.{}", id),
        }
    }
}

const WATCHED_MOVIES: &str = "watched.movies";
const WATCHED_SHOWS: &str = "watched.shows";

pub struct SnapshotStore {
    cache: Arc<PersistedCache>,
    tracking: Arc<dyn TrackingClient>,
}

impl SnapshotStore {
    pub fn new(cache: Arc<PersistedCache>, tracking: Arc<dyn TrackingClient>) -> Self {
        Self { cache, tracking }
    }

    pub fn tracking(&self) -> &Arc<dyn TrackingClient> {
        &self.tracking
    }

    fn list_key(list: &ListId, kind: ListKind) -> String {
        format!("{}.{}", list, kind)
    }

    /// The snapshot committed by the previous cycle and a fresh current one.
    pub async fn list_snapshots(
        &self,
        list: &ListId,
        kind: ListKind,
        force: bool,
    ) -> Result<(Vec<ListItem>, Vec<ListItem>)> {
        let key = Self::list_key(list, kind);
        let previous = self.previous(&key);
        let current = match list {
            ListId::Watchlist => self.current(&key, force, self.tracking.watchlist(kind)).await?,
            ListId::Collection => self.current(&key, force, self.tracking.collection(kind)).await?,
            ListId::Custom(id) => self.current(&key, force, self.tracking.list_items(id, kind)).await?,
        };
        Ok((previous, current))
    }

    pub fn commit_list(&self, list: &ListId, kind: ListKind, current: &[ListItem]) -> Result<()> {
        self.commit(&Self::list_key(list, kind), current)
    }

    pub async fn watched_movies(&self, force: bool) -> Result<(Vec<WatchedMovie>, Vec<WatchedMovie>)> {
        let previous = self.previous(WATCHED_MOVIES);
        let current = self
            .current(WATCHED_MOVIES, force, self.tracking.watched_movies())
            .await?;
        Ok((previous, current))
    }

    pub fn commit_watched_movies(&self, current: &[WatchedMovie]) -> Result<()> {
        self.commit(WATCHED_MOVIES, current)
    }

    pub async fn watched_shows(&self, force: bool) -> Result<(Vec<WatchedShow>, Vec<WatchedShow>)> {
        let previous = self.previous(WATCHED_SHOWS);
        let current = self
            .current(WATCHED_SHOWS, force, self.tracking.watched_shows())
            .await?;
        Ok((previous, current))
    }

    pub fn commit_watched_shows(&self, current: &[WatchedShow]) -> Result<()> {
        self.commit(WATCHED_SHOWS, current)
    }

    fn previous<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.cache
            .get(&format!("snapshot.previous.{}", key))
            .unwrap_or_default()
    }

    /// Serves the current snapshot from the cache while it is fresh, unless forced.
    async fn current<T, F>(&self, key: &str, force: bool, fetch: F) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = std::result::Result<Vec<T>, SourceError>>,
    {
        let current_key = format!("snapshot.current.{}", key);
        if !force {
            if let Some(cached) = self.cache.get::<Vec<T>>(&current_key) {
                debug!(key = key, count = cached.len(), "Using cached snapshot");
                return Ok(cached);
            }
        }

        let items = fetch.await?;
        self.cache.set(&current_key, &items, CURRENT_SNAPSHOT_TTL)?;
        Ok(items)
    }

    fn commit<T: Serialize>(&self, key: &str, current: &[T]) -> Result<()> {
        self.cache
            .set(&format!("snapshot.previous.{}", key), &current, SNAPSHOT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_list_item, FakeTracking};

    #[test]
    fn test_list_id_parse_and_display() {
        assert_eq!(ListId::parse("watchlist"), ListId::Watchlist);
        assert_eq!(ListId::parse("collection").to_string(), "collection");
        assert_eq!(ListId::parse("1234").to_string(), "list.1234");
    }

    #[tokio::test]
    async fn test_current_snapshot_is_cached_until_forced() {
        let tracking = Arc::new(FakeTracking::new());
        tracking.set_watchlist(ListKind::Movies, vec![create_list_item(1, 10)]);
        let store = SnapshotStore::new(Arc::new(PersistedCache::in_memory()), tracking.clone());

        let (previous, current) = store.list_snapshots(&ListId::Watchlist, ListKind::Movies, false).await.unwrap();
        assert!(previous.is_empty());
        assert_eq!(current.len(), 1);

        tracking.set_watchlist(ListKind::Movies, vec![create_list_item(1, 10), create_list_item(2, 20)]);
        let (_, cached) = store.list_snapshots(&ListId::Watchlist, ListKind::Movies, false).await.unwrap();
        assert_eq!(cached.len(), 1);

        let (_, fresh) = store.list_snapshots(&ListId::Watchlist, ListKind::Movies, true).await.unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(tracking.fetches(), vec!["watchlist/movies", "watchlist/movies"]);
    }

    #[tokio::test]
    async fn test_commit_becomes_previous() {
        let tracking = Arc::new(FakeTracking::new());
        let store = SnapshotStore::new(Arc::new(PersistedCache::in_memory()), tracking);

        store
            .commit_list(&ListId::Collection, ListKind::Shows, &[create_list_item(5, 50)])
            .unwrap();
        let (previous, _) = store.list_snapshots(&ListId::Collection, ListKind::Shows, true).await.unwrap();
        assert_eq!(previous, vec![create_list_item(5, 50)]);

        let (previous, _) = store.list_snapshots(&ListId::Collection, ListKind::Movies, true).await.unwrap();
        assert!(previous.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_remote_service() {
        let tracking = Arc::new(FakeTracking::new());
        tracking.set_failing(true);
        let store = SnapshotStore::new(Arc::new(PersistedCache::in_memory()), tracking);

        let err = store.list_snapshots(&ListId::Watchlist, ListKind::Movies, true).await.unwrap_err();
        assert!(matches!(err, crate::error::LibraryError::RemoteService(_)));
    }
}
