pub mod error;
pub mod kodi;
pub mod tmdb;
pub mod traits;
pub mod trakt;

pub use error::SourceError;
pub use kodi::KodiHost;
pub use tmdb::TmdbClient;
pub use traits::{CatalogClient, MediaCenterHost, TrackingClient};
pub use trakt::{trakt_authorize_device, TraktClient};
