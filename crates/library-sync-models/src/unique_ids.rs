use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::MediaType;

/// Identifier bundle attached to every library entity
///
/// Aggregates the media-center ID with the catalog (TMDB-style), external
/// database (TVDB-style), legacy (IMDB-style) and tracking-service IDs so an
/// entity can be matched from any side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UniqueIds {
    pub media_type: MediaType,
    /// Media-center internal ID, 0 when unassigned
    pub local_id: i64,
    pub catalog_id: i64,
    pub external_db_id: i64,
    pub external_legacy_id: String,
    pub tracking_id: i64,
    pub play_count: u32,
}

impl UniqueIds {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            local_id: 0,
            catalog_id: 0,
            external_db_id: 0,
            external_legacy_id: String::new(),
            tracking_id: 0,
            play_count: 0,
        }
    }

    pub fn is_watched(&self) -> bool {
        self.play_count > 0
    }

    /// True when the given identifier matches any of the string-typed IDs.
    pub fn matches_external(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        self.external_legacy_id == id
            || (self.external_db_id != 0 && self.external_db_id.to_string() == id)
    }
}

/// What the media center itself knows about an entity: its ID plus the
/// per-scraper unique IDs it stored when scanning the placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaCenterUids {
    pub local_id: i64,
    pub ids: BTreeMap<String, String>,
}

impl MediaCenterUids {
    pub fn new(local_id: i64) -> Self {
        Self { local_id, ids: BTreeMap::new() }
    }

    pub fn with_id(mut self, scraper: &str, value: impl Into<String>) -> Self {
        self.ids.insert(scraper.to_string(), value.into());
        self
    }

    /// The UID our addon wrote into the sidecar, if the media center picked it up.
    pub fn addon_uid(&self, addon_key: &str) -> Option<&str> {
        self.ids
            .get(addon_key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_external() {
        let mut ids = UniqueIds::new(MediaType::Show);
        ids.external_legacy_id = "tt0903747".to_string();
        ids.external_db_id = 81189;

        assert!(ids.matches_external("tt0903747"));
        assert!(ids.matches_external("81189"));
        assert!(!ids.matches_external(""));
        assert!(!ids.matches_external("tt000"));
    }

    #[test]
    fn test_addon_uid_ignores_empty_values() {
        let uids = MediaCenterUids::new(5).with_id("strmsync", "");
        assert_eq!(uids.addon_uid("strmsync"), None);

        let uids = MediaCenterUids::new(5).with_id("strmsync", "603");
        assert_eq!(uids.addon_uid("strmsync"), Some("603"));
    }
}
