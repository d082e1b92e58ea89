use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of library entity. The discriminants are what the item database stores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie = 0,
    Show = 1,
    Season = 2,
    Episode = 3,
}

impl MediaType {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(MediaType::Movie),
            1 => Some(MediaType::Show),
            2 => Some(MediaType::Season),
            3 => Some(MediaType::Episode),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "show",
            MediaType::Season => "season",
            MediaType::Episode => "episode",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of a tracking-service list is being synced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Movies,
    Shows,
}

impl ListKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::Movies => "movies",
            ListKind::Shows => "shows",
        }
    }

    pub fn media_type(self) -> MediaType {
        match self {
            ListKind::Movies => MediaType::Movie,
            ListKind::Shows => MediaType::Show,
        }
    }

    /// Content name the media-center host uses for library cleanups.
    pub fn host_content(self) -> &'static str {
        match self {
            ListKind::Movies => "movies",
            ListKind::Shows => "tvshows",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_round_trips_through_integer() {
        for media_type in [MediaType::Movie, MediaType::Show, MediaType::Season, MediaType::Episode] {
            assert_eq!(MediaType::from_i64(media_type.as_i64()), Some(media_type));
        }
        assert_eq!(MediaType::from_i64(9), None);
    }

    #[test]
    fn test_list_kind_host_content() {
        assert_eq!(ListKind::Movies.host_content(), "movies");
        assert_eq!(ListKind::Shows.host_content(), "tvshows");
        assert_eq!(ListKind::Shows.media_type(), MediaType::Show);
    }
}
