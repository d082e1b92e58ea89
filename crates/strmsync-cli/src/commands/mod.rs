pub mod auth;
pub mod config;
pub mod daemon;
pub mod library;
pub mod sync;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use library_sync_config::{Config, PathManager};
use library_sync_core::{Collaborators, LibraryService};
use library_sync_sources::{KodiHost, TmdbClient, TraktClient};
use std::sync::Arc;

pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        return Err(eyre!(
            "Configuration file not found at {}. Run 'strmsync config init' to create one.",
            config_file.display()
        ));
    }
    let config = Config::load_from_file(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", config_file.display(), e))?;
    Ok(config)
}

/// Wires the TMDB, Trakt and Kodi clients into a library service.
pub fn open_service(paths: &PathManager, config: Config) -> Result<Arc<LibraryService>> {
    let collaborators = Collaborators {
        catalog: Arc::new(TmdbClient::from_config(&config.tmdb)),
        tracking: Arc::new(TraktClient::from_config(&config.trakt, paths.credentials_file())),
        host: Arc::new(KodiHost::new(&config.kodi)),
    };
    let service = LibraryService::open(config, paths, collaborators)
        .map_err(|e| eyre!("Failed to open library storage: {:#}", e))?;
    Ok(Arc::new(service))
}

/// Opens the service and loads the media center's current library into it.
pub async fn open_loaded_service() -> Result<Arc<LibraryService>> {
    let paths = PathManager::default();
    let config = load_config(&paths)?;
    let service = open_service(&paths, config)?;
    service
        .ingest()
        .refresh_all()
        .await
        .map_err(|e| eyre!("Failed to read the media-center library: {}", e))?;
    Ok(service)
}
