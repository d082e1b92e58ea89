//! SQLite store for library item state, search history and torrent bookkeeping.

use chrono::{DateTime, TimeZone, Utc};
use library_sync_models::{BtItem, ItemState, LibraryItem, MediaType, SearchHistoryEntry, TorrentLink};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use crate::error::{LibraryError, Result};

/// Entries kept per search kind and in the torrent history.
pub const HISTORY_MAX_SIZE: usize = 50;

const EMPTY_INFO_HASH: &str = "0000000000000000000000000000000000000000";

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial",
    sql: "
        CREATE TABLE library_items (
            id INTEGER NOT NULL,
            media_type INTEGER NOT NULL,
            show_id INTEGER NOT NULL DEFAULT 0,
            state INTEGER NOT NULL,
            PRIMARY KEY (id, media_type)
        );
        CREATE INDEX idx_library_items_state ON library_items (media_type, state);

        CREATE TABLE search_history (
            kind TEXT NOT NULL,
            query TEXT NOT NULL,
            searched_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX idx_search_history_query ON search_history (kind, query);

        CREATE TABLE torrent_links (
            catalog_id INTEGER PRIMARY KEY NOT NULL,
            info_hash TEXT NOT NULL
        );
        CREATE INDEX idx_torrent_links_hash ON torrent_links (info_hash);

        CREATE TABLE torrent_metadata (
            info_hash TEXT PRIMARY KEY NOT NULL,
            metadata BLOB NOT NULL
        );

        CREATE TABLE bt_items (
            info_hash TEXT PRIMARY KEY NOT NULL,
            catalog_id INTEGER NOT NULL,
            media_type INTEGER NOT NULL,
            show_id INTEGER NOT NULL DEFAULT 0,
            season INTEGER NOT NULL DEFAULT 0,
            episode INTEGER NOT NULL DEFAULT 0,
            state INTEGER NOT NULL,
            query TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE torrent_history (
            info_hash TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            added_at INTEGER NOT NULL
        );
    ",
}];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentHistoryEntry {
    pub info_hash: String,
    pub name: String,
    pub added_at: DateTime<Utc>,
}

pub struct ItemDatabase {
    conn: Mutex<Connection>,
}

impl ItemDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(LibraryError::at(parent))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!("Opened item database at {:?}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Library items

    pub fn item(&self, id: i64, media_type: MediaType) -> Result<Option<LibraryItem>> {
        let conn = self.conn();
        let item = conn
            .query_row(
                "SELECT id, media_type, show_id, state FROM library_items WHERE id = ?1 AND media_type = ?2",
                params![id, media_type.as_i64()],
                library_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn save_item(&self, item: &LibraryItem) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO library_items (id, media_type, show_id, state) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id, media_type) DO UPDATE SET show_id = excluded.show_id, state = excluded.state",
            params![item.id, item.media_type.as_i64(), item.show_id, item.state.as_i64()],
        )?;
        Ok(())
    }

    /// Writes one record per ID in a single transaction; nothing is written if any insert fails.
    pub fn save_items(&self, ids: &[i64], state: ItemState, media_type: MediaType, show_id: i64) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO library_items (id, media_type, show_id, state) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id, media_type) DO UPDATE SET show_id = excluded.show_id, state = excluded.state",
            )?;
            for id in ids {
                stmt.execute(params![id, media_type.as_i64(), show_id, state.as_i64()])?;
            }
        }
        tx.commit()?;

        debug!(
            operation = "save_items",
            count = ids.len(),
            media_type = %media_type,
            "Saved library item batch"
        );
        Ok(())
    }

    /// Marks an item Deleted, or drops the row entirely when `purge`. Returns whether a row existed.
    pub fn remove_item(&self, id: i64, media_type: MediaType, purge: bool) -> Result<bool> {
        let conn = self.conn();
        let changed = if purge {
            conn.execute(
                "DELETE FROM library_items WHERE id = ?1 AND media_type = ?2",
                params![id, media_type.as_i64()],
            )?
        } else {
            conn.execute(
                "UPDATE library_items SET state = ?3 WHERE id = ?1 AND media_type = ?2",
                params![id, media_type.as_i64(), ItemState::Deleted.as_i64()],
            )?
        };

        if changed == 0 {
            debug!(operation = "remove_item", id = id, media_type = %media_type, "No library record to remove");
        }
        Ok(changed > 0)
    }

    pub fn was_removed(&self, id: i64, media_type: MediaType) -> Result<bool> {
        Ok(self
            .item(id, media_type)?
            .is_some_and(|item| item.state == ItemState::Deleted))
    }

    pub fn items_by_state(&self, media_type: MediaType, state: ItemState) -> Result<Vec<LibraryItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, media_type, show_id, state FROM library_items
             WHERE media_type = ?1 AND state = ?2 ORDER BY id",
        )?;
        let items = stmt
            .query_map(params![media_type.as_i64(), state.as_i64()], library_item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // Search history

    /// Records a query, moving it to the front if it was searched before.
    pub fn add_search_history(&self, kind: &str, query: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM search_history WHERE kind = ?1 AND query = ?2",
            params![kind, query],
        )?;
        tx.execute(
            "INSERT INTO search_history (kind, query, searched_at) VALUES (?1, ?2, ?3)",
            params![kind, query, Utc::now().timestamp_millis()],
        )?;
        tx.execute(
            "DELETE FROM search_history WHERE kind = ?1 AND rowid NOT IN (
                SELECT rowid FROM search_history WHERE kind = ?1
                ORDER BY searched_at DESC, rowid DESC LIMIT ?2
             )",
            params![kind, HISTORY_MAX_SIZE as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Newest first.
    pub fn search_history(&self, kind: &str) -> Result<Vec<SearchHistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT kind, query, searched_at FROM search_history WHERE kind = ?1
             ORDER BY searched_at DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map(params![kind], |row| {
                Ok(SearchHistoryEntry {
                    kind: row.get(0)?,
                    query: row.get(1)?,
                    searched_at: from_millis(row.get(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn remove_search_history(&self, kind: &str, query: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM search_history WHERE kind = ?1 AND query = ?2",
            params![kind, query],
        )?;
        Ok(())
    }

    pub fn clean_search_history(&self, kind: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM search_history WHERE kind = ?1", params![kind])?;
        Ok(())
    }

    // Torrent links

    /// Assigns a torrent to a catalog item.
    ///
    /// Metadata is stored once per info hash and only overwritten when `force`.
    /// Replacing an assignment drops the old torrent's metadata if nothing else
    /// references it and detaches its torrent item from the catalog entry.
    pub fn add_torrent_link(&self, catalog_id: i64, info_hash: &str, metadata: &[u8], force: bool) -> Result<()> {
        if info_hash.is_empty() || info_hash == EMPTY_INFO_HASH {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if force {
            tx.execute(
                "INSERT INTO torrent_metadata (info_hash, metadata) VALUES (?1, ?2)
                 ON CONFLICT (info_hash) DO UPDATE SET metadata = excluded.metadata",
                params![info_hash, metadata],
            )?;
        } else {
            tx.execute(
                "INSERT OR IGNORE INTO torrent_metadata (info_hash, metadata) VALUES (?1, ?2)",
                params![info_hash, metadata],
            )?;
        }

        let previous: Option<String> = tx
            .query_row(
                "SELECT info_hash FROM torrent_links WHERE catalog_id = ?1",
                params![catalog_id],
                |row| row.get(0),
            )
            .optional()?;

        match previous {
            Some(old_hash) if old_hash == info_hash => {}
            Some(old_hash) => {
                info!("Update torrent info, old {}, new {}", old_hash, info_hash);
                tx.execute(
                    "UPDATE torrent_links SET info_hash = ?2 WHERE catalog_id = ?1",
                    params![catalog_id, info_hash],
                )?;
                cleanup_torrent_metadata(&tx, &old_hash)?;
                tx.execute(
                    "UPDATE bt_items SET catalog_id = 0, show_id = 0 WHERE info_hash = ?1",
                    params![old_hash],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO torrent_links (catalog_id, info_hash) VALUES (?1, ?2)",
                    params![catalog_id, info_hash],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn torrent_link(&self, catalog_id: i64) -> Result<Option<TorrentLink>> {
        let link = self
            .conn()
            .query_row(
                "SELECT catalog_id, info_hash FROM torrent_links WHERE catalog_id = ?1",
                params![catalog_id],
                |row| {
                    Ok(TorrentLink {
                        catalog_id: row.get(0)?,
                        info_hash: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(link)
    }

    pub fn torrent_metadata(&self, info_hash: &str) -> Result<Option<Vec<u8>>> {
        let metadata = self
            .conn()
            .query_row(
                "SELECT metadata FROM torrent_metadata WHERE info_hash = ?1",
                params![info_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(metadata)
    }

    pub fn remove_torrent_link(&self, catalog_id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT info_hash FROM torrent_links WHERE catalog_id = ?1",
                params![catalog_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(info_hash) = previous {
            tx.execute("DELETE FROM torrent_links WHERE catalog_id = ?1", params![catalog_id])?;
            cleanup_torrent_metadata(&tx, &info_hash)?;
        }
        tx.commit()?;
        Ok(())
    }

    // Torrent items

    pub fn save_bt_item(&self, item: &BtItem) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO bt_items
                (info_hash, catalog_id, media_type, show_id, season, episode, state, query)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.info_hash,
                item.catalog_id,
                item.media_type.as_i64(),
                item.show_id,
                item.season,
                item.episode,
                item.state.as_i64(),
                item.query
            ],
        )?;
        Ok(())
    }

    pub fn bt_item(&self, info_hash: &str) -> Result<Option<BtItem>> {
        let item = self
            .conn()
            .query_row(
                "SELECT info_hash, catalog_id, media_type, show_id, season, episode, state, query
                 FROM bt_items WHERE info_hash = ?1",
                params![info_hash],
                bt_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn deleted_bt_items(&self) -> Result<Vec<BtItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT info_hash, catalog_id, media_type, show_id, season, episode, state, query
             FROM bt_items WHERE state = ?1",
        )?;
        let items = stmt
            .query_map(params![ItemState::Deleted.as_i64()], bt_item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn delete_bt_item(&self, info_hash: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM bt_items WHERE info_hash = ?1", params![info_hash])?;
        Ok(())
    }

    // Torrent history

    pub fn add_torrent_history(&self, info_hash: &str, name: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp_millis();
        let updated = tx.execute(
            "UPDATE torrent_history SET added_at = ?2 WHERE info_hash = ?1",
            params![info_hash, now],
        )?;
        if updated == 0 {
            tx.execute(
                "INSERT INTO torrent_history (info_hash, name, added_at) VALUES (?1, ?2, ?3)",
                params![info_hash, name, now],
            )?;
            tx.execute(
                "DELETE FROM torrent_history WHERE rowid NOT IN (
                    SELECT rowid FROM torrent_history ORDER BY added_at DESC, rowid DESC LIMIT ?1
                 )",
                params![HISTORY_MAX_SIZE as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn torrent_history(&self) -> Result<Vec<TorrentHistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT info_hash, name, added_at FROM torrent_history ORDER BY added_at DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(TorrentHistoryEntry {
                    info_hash: row.get(0)?,
                    name: row.get(1)?,
                    added_at: from_millis(row.get(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;
    let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
        row.get(0)
    })?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        debug!("Applying migration {} ({})", migration.version, migration.name);
        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
    }
    Ok(())
}

/// Drops stored metadata once no assignment points at the torrent anymore.
fn cleanup_torrent_metadata(conn: &Connection, info_hash: &str) -> rusqlite::Result<()> {
    let still_linked: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM torrent_links WHERE info_hash = ?1)",
        params![info_hash],
        |row| row.get(0),
    )?;
    if !still_linked {
        if let Err(e) = conn.execute("DELETE FROM torrent_metadata WHERE info_hash = ?1", params![info_hash]) {
            warn!(operation = "cleanup_torrent_metadata", error = %e, "Could not delete old torrent metadata");
            return Err(e);
        }
    }
    Ok(())
}

fn library_item_from_row(row: &Row<'_>) -> rusqlite::Result<LibraryItem> {
    Ok(LibraryItem {
        id: row.get(0)?,
        media_type: media_type_column(row, 1)?,
        show_id: row.get(2)?,
        state: state_column(row, 3)?,
    })
}

fn bt_item_from_row(row: &Row<'_>) -> rusqlite::Result<BtItem> {
    Ok(BtItem {
        info_hash: row.get(0)?,
        catalog_id: row.get(1)?,
        media_type: media_type_column(row, 2)?,
        show_id: row.get(3)?,
        season: row.get(4)?,
        episode: row.get(5)?,
        state: state_column(row, 6)?,
        query: row.get(7)?,
    })
}

fn media_type_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<MediaType> {
    let value: i64 = row.get(idx)?;
    MediaType::from_i64(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn state_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ItemState> {
    let value: i64 = row.get(idx)?;
    ItemState::from_i64(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
