use bincode::{deserialize, serialize};
use chrono::Utc;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::error::{LibraryError, Result};

const DAY: u64 = 24 * 60 * 60;

pub const SNAPSHOT_TTL: Duration = Duration::from_secs(30 * DAY);
pub const CURRENT_SNAPSHOT_TTL: Duration = Duration::from_secs(5 * 60);
pub const PLAYCOUNT_TTL: Duration = Duration::from_secs(30 * DAY);
pub const ACTIVITIES_TTL: Duration = Duration::from_secs(30 * DAY);
pub const SHOW_LAST_UPDATES_TTL: Duration = Duration::from_secs(30 * DAY);
pub const PAUSED_TTL: Duration = Duration::from_secs(30 * DAY);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix seconds
    expires_at: i64,
    /// JSON-encoded value
    payload: Vec<u8>,
}

impl CacheEntry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Key/value cache with per-entry expiry, written through to a gzip'd bincode file.
pub struct PersistedCache {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl PersistedCache {
    /// Loads the cache file, starting empty when it is missing or unreadable.
    pub fn open(path: PathBuf) -> Self {
        let entries = load_entries(&path);
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| LibraryError::Cache("cache lock poisoned".to_string()))
    }

    /// Returns the value under `key` if present, unexpired and decodable.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired(Utc::now().timestamp()) {
            debug!(operation = "cache_get", key = key, "Cache entry expired");
            return None;
        }
        match serde_json::from_slice(&entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(operation = "cache_get", key = key, error = %e, "Cache entry could not be decoded");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_vec(value).map_err(|e| LibraryError::Cache(e.to_string()))?;
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;

        let mut entries = self.lock()?;
        entries.insert(key.to_string(), CacheEntry { expires_at, payload });
        self.persist(&mut entries)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.remove(key).is_some() {
            self.persist(&mut entries)?;
        }
        Ok(())
    }

    /// Deletes every entry whose key starts with `prefix`, returning how many were dropped.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&mut entries)?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &mut HashMap<String, CacheEntry>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let now = Utc::now().timestamp();
        entries.retain(|_, entry| !entry.is_expired(now));

        let serialized = serialize(&*entries).map_err(|e| LibraryError::Cache(e.to_string()))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&serialized).map_err(LibraryError::at(path))?;
        let encoded = encoder.finish().map_err(LibraryError::at(path))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(LibraryError::at(parent))?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, encoded).map_err(LibraryError::at(&temp_path))?;
        std::fs::rename(&temp_path, path).map_err(LibraryError::at(path))?;
        Ok(())
    }
}

fn load_entries(path: &Path) -> HashMap<String, CacheEntry> {
    if !path.exists() {
        debug!("Cache file does not exist, starting with empty cache");
        return HashMap::new();
    }

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(operation = "cache_load", error = %e, "Failed to read cache file");
            return HashMap::new();
        }
    };

    let mut buffer = Vec::new();
    let decoded = GzDecoder::new(&data[..])
        .read_to_end(&mut buffer)
        .map_err(|e| e.to_string())
        .and_then(|_| deserialize::<HashMap<String, CacheEntry>>(&buffer).map_err(|e| e.to_string()));

    match decoded {
        Ok(entries) => {
            info!("Loaded cache: {} entries from {:?}", entries.len(), path);
            entries
        }
        Err(e) => {
            // Backup the unreadable file and start fresh
            let backup_path = path.with_extension("bin.bak");
            if let Err(backup_err) = std::fs::copy(path, &backup_path) {
                warn!(
                    "Failed to backup incompatible cache file: {}. Starting with empty cache.",
                    backup_err
                );
            } else {
                info!(
                    "Cache format incompatible (error: {}). Backed up old cache to {:?} and starting with empty cache.",
                    e, backup_path
                );
            }
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.bin");

        let cache = PersistedCache::open(path.clone());
        cache.set("snapshot.watchlist.movies", &vec![1, 2, 3], SNAPSHOT_TTL).unwrap();
        drop(cache);

        let cache = PersistedCache::open(path);
        let value: Option<Vec<i32>> = cache.get("snapshot.watchlist.movies");
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_expired_entry_is_not_returned() {
        let cache = PersistedCache::in_memory();
        cache.set("k", &"v", Duration::from_secs(0)).unwrap();
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    fn test_delete_prefix() {
        let cache = PersistedCache::in_memory();
        cache.set("paused.movies", &1, PAUSED_TTL).unwrap();
        cache.set("paused.episodes", &2, PAUSED_TTL).unwrap();
        cache.set("activities", &3, ACTIVITIES_TTL).unwrap();

        assert_eq!(cache.delete_prefix("paused.").unwrap(), 2);
        assert_eq!(cache.len(), 1);
        cache.delete("activities").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.bin");
        std::fs::write(&path, b"not a gzip stream").unwrap();

        let cache = PersistedCache::open(path.clone());
        assert!(cache.is_empty());
        assert!(path.with_extension("bin.bak").exists());
    }

    #[test]
    fn test_wrong_type_decodes_to_none() {
        let cache = PersistedCache::in_memory();
        cache.set("k", &"text", SNAPSHOT_TTL).unwrap();
        assert_eq!(cache.get::<u64>("k"), None);
    }
}
