use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub trakt: TraktConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub kodi: KodiConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// What to do with the media-center library after new placeholders were written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LibraryUpdate {
    Always,
    Ask,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub library_path: PathBuf,
    #[serde(default = "default_addon_id")]
    pub addon_id: String,
    /// Scraper key the media center stores our sidecar uniqueid under
    #[serde(default = "default_addon_uid_key")]
    pub addon_uid_key: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_language")]
    pub strm_language: String,
    #[serde(default = "default_true")]
    pub nfo_movies: bool,
    #[serde(default = "default_true")]
    pub nfo_shows: bool,
    #[serde(default)]
    pub add_specials: bool,
    #[serde(default)]
    pub show_unaired_seasons: bool,
    #[serde(default)]
    pub show_unaired_episodes: bool,
    #[serde(default = "default_true")]
    pub show_episodes_on_release_day: bool,
    #[serde(default = "default_library_update")]
    pub library_update: LibraryUpdate,
    #[serde(default = "default_true")]
    pub sync_enabled: bool,
    #[serde(default)]
    pub sync_during_playback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_true")]
    pub sync_enabled: bool,
    #[serde(default)]
    pub sync_during_playback: bool,
    #[serde(default = "default_true")]
    pub sync_watched: bool,
    #[serde(default)]
    pub sync_watched_back: bool,
    #[serde(default = "default_true")]
    pub sync_collections: bool,
    #[serde(default = "default_true")]
    pub sync_watchlist: bool,
    #[serde(default)]
    pub sync_user_lists: bool,
    #[serde(default = "default_true")]
    pub sync_playback_progress: bool,
    #[serde(default)]
    pub sync_removed_movies_back: bool,
    #[serde(default)]
    pub sync_removed_shows_back: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_tmdb_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KodiConfig {
    #[serde(default = "default_kodi_rpc_url")]
    pub rpc_url: String,
    /// Callback endpoint of the addon side, used for dialogs
    #[serde(default = "default_addon_rpc_url")]
    pub addon_rpc_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_kodi_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_update_frequency_hours")]
    pub update_frequency_hours: u64,
    #[serde(default = "default_tracking_sync_frequency_minutes")]
    pub tracking_sync_frequency_minutes: u64,
    /// Seconds before the first planned refresh; 0 disables it
    #[serde(default = "default_update_delay_seconds")]
    pub update_delay_seconds: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_true() -> bool {
    true
}

fn default_addon_id() -> String {
    "plugin.video.strmsync".to_string()
}

fn default_addon_uid_key() -> String {
    "strmsync".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_library_update() -> LibraryUpdate {
    LibraryUpdate::Always
}

fn default_tmdb_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_kodi_rpc_url() -> String {
    "http://127.0.0.1:8080/jsonrpc".to_string()
}

fn default_addon_rpc_url() -> String {
    "http://127.0.0.1:65221".to_string()
}

fn default_kodi_timeout() -> u64 {
    10
}

fn default_update_frequency_hours() -> u64 {
    6
}

fn default_tracking_sync_frequency_minutes() -> u64 {
    5
}

fn default_update_delay_seconds() -> u64 {
    10
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::new(),
            addon_id: default_addon_id(),
            addon_uid_key: default_addon_uid_key(),
            language: default_language(),
            strm_language: default_language(),
            nfo_movies: true,
            nfo_shows: true,
            add_specials: false,
            show_unaired_seasons: false,
            show_unaired_episodes: false,
            show_episodes_on_release_day: true,
            library_update: default_library_update(),
            sync_enabled: true,
            sync_during_playback: false,
        }
    }
}

impl Default for TraktConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            sync_enabled: true,
            sync_during_playback: false,
            sync_watched: true,
            sync_watched_back: false,
            sync_collections: true,
            sync_watchlist: true,
            sync_user_lists: false,
            sync_playback_progress: true,
            sync_removed_movies_back: false,
            sync_removed_shows_back: false,
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_tmdb_url(),
        }
    }
}

impl Default for KodiConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_kodi_rpc_url(),
            addon_rpc_url: default_addon_rpc_url(),
            username: None,
            password: None,
            timeout_seconds: default_kodi_timeout(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_frequency_hours: default_update_frequency_hours(),
            tracking_sync_frequency_minutes: default_tracking_sync_frequency_minutes(),
            update_delay_seconds: default_update_delay_seconds(),
            run_on_startup: true,
        }
    }
}

impl LibraryConfig {
    pub fn movies_path(&self) -> PathBuf {
        self.library_path.join("Movies")
    }

    pub fn shows_path(&self) -> PathBuf {
        self.library_path.join("Shows")
    }

    /// Placeholders use localized titles only when their language differs from the UI one.
    pub fn use_localized_titles(&self) -> bool {
        self.strm_language != self.language
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let library_path = self.library.library_path.as_os_str();
        if library_path.is_empty() || library_path == "." {
            return Err(anyhow::anyhow!("library.library_path is required"));
        }

        if self.library.addon_id.is_empty() {
            return Err(anyhow::anyhow!("library.addon_id cannot be empty"));
        }

        if self.library.addon_uid_key.is_empty() {
            return Err(anyhow::anyhow!("library.addon_uid_key cannot be empty"));
        }

        if self.tmdb.api_key.is_empty() {
            return Err(anyhow::anyhow!("tmdb.api_key is required"));
        }

        if self.trakt.enabled {
            if self.trakt.client_id.is_empty() || self.trakt.client_id == "YOUR_CLIENT_ID" {
                return Err(anyhow::anyhow!("Trakt is enabled but client_id is not configured"));
            }
            if self.trakt.client_secret.is_empty() || self.trakt.client_secret == "YOUR_CLIENT_SECRET" {
                return Err(anyhow::anyhow!("Trakt is enabled but client_secret is not configured"));
            }
        }

        if self.scheduler.update_frequency_hours == 0 {
            return Err(anyhow::anyhow!("scheduler.update_frequency_hours must be at least 1"));
        }
        if self.scheduler.tracking_sync_frequency_minutes == 0 {
            return Err(anyhow::anyhow!("scheduler.tracking_sync_frequency_minutes must be at least 1"));
        }

        Ok(())
    }

    pub fn is_trakt_configured(&self) -> bool {
        self.trakt.enabled
            && !self.trakt.client_id.is_empty()
            && self.trakt.client_id != "YOUR_CLIENT_ID"
            && !self.trakt.client_secret.is_empty()
            && self.trakt.client_secret != "YOUR_CLIENT_SECRET"
    }

    /// Starter config written by `strmsync config init`.
    pub fn template() -> Self {
        let mut config = Config::default();
        config.trakt.client_id = "YOUR_CLIENT_ID".to_string();
        config.trakt.client_secret = "YOUR_CLIENT_SECRET".to_string();
        config
    }
}
