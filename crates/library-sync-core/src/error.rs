use library_sync_models::MediaType;
use library_sync_sources::SourceError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The item was removed from the library by the user and is not re-added implicitly.
    #[error("{media_type} {id} was removed from the library")]
    VideoRemoved { media_type: MediaType, id: i64 },

    #[error("Already in library: {0}")]
    AlreadyExists(String),

    #[error("Path error at {path:?}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    RemoteService(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache error: {0}")]
    Cache(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

impl LibraryError {
    pub fn path(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        LibraryError::Path {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Maps a closure's io error onto the path it happened at.
    pub(crate) fn at(path: &Path) -> impl FnOnce(std::io::Error) -> LibraryError + '_ {
        move |source| LibraryError::path(path, source)
    }

    pub fn is_video_removed(&self) -> bool {
        matches!(self, LibraryError::VideoRemoved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_removed_message() {
        let err = LibraryError::VideoRemoved { media_type: MediaType::Movie, id: 99 };
        assert_eq!(err.to_string(), "movie 99 was removed from the library");
        assert!(err.is_video_removed());
    }

    #[test]
    fn test_remote_service_is_transparent() {
        let err: LibraryError = SourceError::Locked.into();
        assert_eq!(err.to_string(), "Account is locked");
    }
}
