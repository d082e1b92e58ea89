pub mod api;
pub mod auth;
pub mod client;

pub use auth::authorize_device as trakt_authorize_device;
pub use client::TraktClient;
