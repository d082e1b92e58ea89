//! Writes and removes the `.strm` placeholders and `.nfo` sidecars the media
//! center scans into its library.

use chrono::{NaiveDate, Utc};
use library_sync_config::LibraryConfig;
use library_sync_models::{ItemState, MediaType, MovieMetadata, ShowMetadata, PLACEHOLDER_EXTENSION};
use library_sync_sources::CatalogClient;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use crate::database::ItemDatabase;
use crate::duplicates::DuplicateDetector;
use crate::error::{LibraryError, Result};
use crate::index::LibraryState;
use crate::removal::{RemovalHandle, RemovedEpisode};

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '?', '*', '%', '+'];

/// Strips characters that are not allowed in file names.
pub fn to_file_name(name: &str) -> String {
    name.chars().filter(|c| !RESERVED_CHARS.contains(c)).collect()
}

/// Whether an item airing on `air_date` is still unaired on `today`.
/// Unparseable dates count as aired.
pub fn air_date_expired(air_date: &str, allow_same_day: bool, today: NaiveDate) -> bool {
    match NaiveDate::parse_from_str(air_date, "%Y-%m-%d") {
        Ok(aired) => aired > today || (!allow_same_day && aired == today),
        Err(_) => false,
    }
}

fn localized<'a>(config: &LibraryConfig, localized: &'a str, original: &'a str) -> &'a str {
    if config.use_localized_titles() && !localized.is_empty() {
        localized
    } else {
        original
    }
}

pub fn movie_nfo(movie: &MovieMetadata, addon_uid_key: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\" ?>\n<movie>\n");
    let _ = writeln!(out, "\t<uniqueid type=\"unknown\" default=\"false\">{}</uniqueid>", movie.id);
    let _ = writeln!(out, "\t<uniqueid type=\"{}\" default=\"false\">{}</uniqueid>", addon_uid_key, movie.id);
    let _ = writeln!(out, "\t<uniqueid type=\"tmdb\" default=\"true\">{}</uniqueid>", movie.id);
    let _ = writeln!(
        out,
        "\t<uniqueid type=\"imdb\" default=\"false\">{}</uniqueid>",
        movie.external_ids.legacy_id
    );
    let _ = writeln!(
        out,
        "\t<uniqueid type=\"tvdb\" default=\"false\">{}</uniqueid>",
        external_db_text(movie.external_ids.external_db_id)
    );
    out.push_str("</movie>\n");
    let _ = writeln!(out, "https://www.themoviedb.org/movie/{}", movie.id);
    if !movie.external_ids.legacy_id.is_empty() {
        let _ = writeln!(out, "https://www.imdb.com/title/{}/", movie.external_ids.legacy_id);
    }
    out
}

pub fn show_nfo(show: &ShowMetadata, addon_uid_key: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\" ?>\n<tvshow>\n");
    let _ = writeln!(out, "\t<uniqueid type=\"unknown\" default=\"false\">{}</uniqueid>", show.id);
    let _ = writeln!(out, "\t<uniqueid type=\"{}\" default=\"false\">{}</uniqueid>", addon_uid_key, show.id);
    let _ = writeln!(out, "\t<uniqueid type=\"tmdb\" default=\"true\">{}</uniqueid>", show.id);
    let _ = writeln!(
        out,
        "\t<uniqueid type=\"imdb\" default=\"false\">{}</uniqueid>",
        show.external_ids.legacy_id
    );
    let _ = writeln!(
        out,
        "\t<uniqueid type=\"tvdb\" default=\"false\">{}</uniqueid>",
        external_db_text(show.external_ids.external_db_id)
    );
    out.push_str("</tvshow>\n");
    let _ = writeln!(out, "https://www.themoviedb.org/tv/{}", show.id);
    if !show.external_ids.legacy_id.is_empty() {
        let _ = writeln!(out, "https://www.imdb.com/title/{}/", show.external_ids.legacy_id);
    }
    if show.external_ids.external_db_id != 0 {
        let _ = writeln!(
            out,
            "https://www.thetvdb.com/?tab=series&id={}&lid=7",
            show.external_ids.external_db_id
        );
    }
    out
}

fn external_db_text(id: i64) -> String {
    if id == 0 {
        String::new()
    } else {
        id.to_string()
    }
}

/// Creates the directory, or bumps its mtime when rewriting so the media center rescans it.
fn ensure_dir(dir: &Path, force: bool) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(LibraryError::at(dir))?;
    } else if force {
        let touched = std::fs::File::open(dir).and_then(|f| f.set_modified(SystemTime::now()));
        if let Err(e) = touched {
            debug!(operation = "touch_dir", path = ?dir, error = %e, "Could not update directory mtime");
        }
    }
    Ok(())
}

pub struct PlaceholderWriter {
    config: LibraryConfig,
    catalog: Arc<dyn CatalogClient>,
    db: Arc<ItemDatabase>,
    state: Arc<LibraryState>,
    duplicates: Arc<DuplicateDetector>,
    removals: Option<RemovalHandle>,
}

impl PlaceholderWriter {
    pub fn new(
        config: LibraryConfig,
        catalog: Arc<dyn CatalogClient>,
        db: Arc<ItemDatabase>,
        state: Arc<LibraryState>,
        duplicates: Arc<DuplicateDetector>,
    ) -> Self {
        Self {
            config,
            catalog,
            db,
            state,
            duplicates,
            removals: None,
        }
    }

    pub fn with_removals(mut self, handle: RemovalHandle) -> Self {
        self.removals = Some(handle);
        self
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub(crate) fn db(&self) -> &Arc<ItemDatabase> {
        &self.db
    }

    pub(crate) fn state(&self) -> &Arc<LibraryState> {
        &self.state
    }

    pub(crate) fn duplicates(&self) -> &Arc<DuplicateDetector> {
        &self.duplicates
    }

    pub fn check_library_path(&self) -> Result<()> {
        let path = &self.config.library_path;
        let os = path.as_os_str();
        if os.is_empty() || os == "." {
            warn!("Library path is not initialized");
            return Err(LibraryError::path(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "library path is not set"),
            ));
        }

        let metadata = std::fs::metadata(path).map_err(|e| {
            warn!("Library path is invalid");
            LibraryError::path(path, e)
        })?;
        if !metadata.is_dir() {
            warn!("Library path is not a directory");
            return Err(LibraryError::path(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "library path is not a directory"),
            ));
        }
        Ok(())
    }

    pub fn movies_dir(&self) -> Result<PathBuf> {
        self.check_library_path()?;
        let dir = self.config.movies_path();
        ensure_dir(&dir, false)?;
        Ok(dir)
    }

    pub fn shows_dir(&self) -> Result<PathBuf> {
        self.check_library_path()?;
        let dir = self.config.shows_path();
        ensure_dir(&dir, false)?;
        Ok(dir)
    }

    fn play_url(&self, route: &str) -> String {
        format!("plugin://{}/library/{}", self.config.addon_id, route)
    }

    fn movie_name(&self, movie: &MovieMetadata) -> String {
        let title = localized(&self.config, &movie.title, &movie.original_title);
        to_file_name(&format!("{} ({})", title, movie.year()))
    }

    fn show_name(&self, show: &ShowMetadata) -> String {
        let name = localized(&self.config, &show.name, &show.original_name);
        to_file_name(&format!("{} ({})", name, show.year()))
    }

    /// The show's directory and the name its episode files are prefixed with.
    /// A directory the library already uses for this show wins over a fresh one.
    pub async fn show_path(&self, show: &ShowMetadata) -> (PathBuf, String) {
        let name = self.show_name(show);
        let existing = self
            .state
            .show_by_catalog_id(show.id)
            .await
            .and_then(|s| s.placeholder_dirs().into_iter().next());
        let dir = existing.unwrap_or_else(|| self.config.shows_path().join(&name));
        (dir, name)
    }

    pub async fn write_movie(&self, catalog_id: i64, force: bool) -> Result<MovieMetadata> {
        if !force && self.db.was_removed(catalog_id, MediaType::Movie)? {
            return Err(LibraryError::VideoRemoved { media_type: MediaType::Movie, id: catalog_id });
        }

        let movies_dir = self.movies_dir()?;
        let movie = self
            .catalog
            .get_movie(catalog_id, &self.config.strm_language)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("movie {}", catalog_id)))?;

        let name = self.movie_name(&movie);
        let dir = movies_dir.join(&name);
        ensure_dir(&dir, force)?;

        if self.config.nfo_movies {
            let nfo_path = dir.join(format!("{}.nfo", name));
            if let Err(e) = std::fs::write(&nfo_path, movie_nfo(&movie, &self.config.addon_uid_key)) {
                warn!(operation = "write_movie_nfo", path = ?nfo_path, error = %e, "Failed to write NFO");
            }
        }

        let strm_path = dir.join(format!("{}.{}", name, PLACEHOLDER_EXTENSION));
        if !force && strm_path.exists() {
            debug!(catalog_id = catalog_id, "Movie placeholder already exists");
            return Ok(movie);
        }

        let url = self.play_url(&format!("movie/play/{}", catalog_id));
        std::fs::write(&strm_path, url).map_err(LibraryError::at(&strm_path))?;
        debug!(catalog_id = catalog_id, path = ?strm_path, "Wrote movie placeholder");
        Ok(movie)
    }

    /// Writes placeholders for every aired episode of a show.
    ///
    /// When `is_adding`, the episodes are recorded as Active per season.
    pub async fn write_show(&self, show_id: i64, is_adding: bool, force: bool) -> Result<ShowMetadata> {
        if !force && self.db.was_removed(show_id, MediaType::Show)? {
            return Err(LibraryError::VideoRemoved { media_type: MediaType::Show, id: show_id });
        }

        self.shows_dir()?;
        let show = self
            .catalog
            .get_show(show_id, &self.config.strm_language)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("show {}", show_id)))?;

        let (show_dir, show_name) = self.show_path(&show).await;
        ensure_dir(&show_dir, force)?;

        if self.config.nfo_shows {
            let nfo_path = show_dir.join("tvshow.nfo");
            if let Err(e) = std::fs::write(&nfo_path, show_nfo(&show, &self.config.addon_uid_key)) {
                warn!(operation = "write_show_nfo", path = ?nfo_path, error = %e, "Failed to write NFO");
            }
        }

        let today = Utc::now().date_naive();
        let on_release_day = self.config.show_episodes_on_release_day;

        for season in &show.seasons {
            if season.episode_count == 0 {
                continue;
            }
            if !self.config.show_unaired_seasons && air_date_expired(&season.air_date, on_release_day, today) {
                continue;
            }
            if !self.config.add_specials && season.season == 0 {
                continue;
            }

            let details = match self.catalog.get_season(show_id, season.season, &self.config.language).await {
                Ok(Some(details)) => details,
                Ok(None) => continue,
                Err(e) => {
                    warn!(operation = "write_show", show_id = show_id, season = season.season, error = %e, "Failed to fetch season");
                    continue;
                }
            };

            let mut added_ids = Vec::new();
            for episode in &details.episodes {
                if !self.config.show_unaired_episodes
                    && (episode.air_date.is_empty() || air_date_expired(&episode.air_date, on_release_day, today))
                {
                    continue;
                }

                if is_adding {
                    added_ids.push(episode.id);
                }

                if !force
                    && self
                        .duplicates
                        .is_duplicate_episode(show_id, season.season, episode.episode_number)
                        .await
                {
                    continue;
                }

                let strm_path = show_dir.join(format!(
                    "{} S{:02}E{:02}.{}",
                    show_name, season.season, episode.episode_number, PLACEHOLDER_EXTENSION
                ));
                if !force && strm_path.exists() {
                    continue;
                }

                let url = self.play_url(&format!(
                    "show/play/{}/{}/{}",
                    show_id, season.season, episode.episode_number
                ));
                std::fs::write(&strm_path, url).map_err(LibraryError::at(&strm_path))?;
            }

            if !added_ids.is_empty() {
                if let Err(e) = self
                    .db
                    .save_items(&added_ids, ItemState::Active, MediaType::Episode, show_id)
                {
                    warn!(operation = "write_show", show_id = show_id, error = %e, "Failed to record episodes");
                }
            }
        }

        Ok(show)
    }

    /// Deletes every placeholder directory of a movie. The record is marked
    /// Deleted (or purged) whether or not anything was found on disk.
    pub async fn remove_movie(&self, catalog_id: i64, purge: bool) -> Result<Vec<PathBuf>> {
        let result = self.remove_movie_dirs(catalog_id).await;
        if let Err(e) = self.db.remove_item(catalog_id, MediaType::Movie, purge) {
            warn!(operation = "remove_movie", catalog_id = catalog_id, error = %e, "Failed to update library record");
        }
        result
    }

    async fn remove_movie_dirs(&self, catalog_id: i64) -> Result<Vec<PathBuf>> {
        let movies_dir = self.movies_dir()?;

        let mut paths: Vec<PathBuf> = self
            .state
            .movie_by_catalog_id(catalog_id)
            .await
            .filter(|m| m.has_placeholder())
            .and_then(|m| m.file.parent().map(Path::to_path_buf))
            .into_iter()
            .filter(|p| p.exists())
            .collect();

        if paths.is_empty() {
            let movie = self
                .catalog
                .get_movie(catalog_id, &self.config.strm_language)
                .await?
                .ok_or_else(|| LibraryError::NotFound(format!("movie {}", catalog_id)))?;
            for title in [&movie.title, &movie.original_title] {
                let candidate = movies_dir.join(to_file_name(&format!("{} ({})", title, movie.year())));
                if candidate.exists() && !paths.contains(&candidate) {
                    paths.push(candidate);
                }
            }
        }

        remove_dirs(paths, &format!("movie {}", catalog_id))
    }

    pub async fn remove_show(&self, catalog_id: i64, purge: bool) -> Result<Vec<PathBuf>> {
        let result = self.remove_show_dirs(catalog_id).await;
        if let Err(e) = self.db.remove_item(catalog_id, MediaType::Show, purge) {
            warn!(operation = "remove_show", catalog_id = catalog_id, error = %e, "Failed to update library record");
        }
        result
    }

    async fn remove_show_dirs(&self, catalog_id: i64) -> Result<Vec<PathBuf>> {
        let shows_dir = self.shows_dir()?;

        let mut paths: Vec<PathBuf> = self
            .state
            .show_by_catalog_id(catalog_id)
            .await
            .map(|s| s.placeholder_dirs())
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.exists())
            .collect();

        if paths.is_empty() {
            let show = self
                .catalog
                .get_show(catalog_id, &self.config.strm_language)
                .await?
                .ok_or_else(|| LibraryError::NotFound(format!("show {}", catalog_id)))?;
            for name in [&show.name, &show.original_name] {
                let candidate = shows_dir.join(to_file_name(&format!("{} ({})", name, show.year())));
                if candidate.exists() && !paths.contains(&candidate) {
                    paths.push(candidate);
                }
            }
        }

        remove_dirs(paths, &format!("show {}", catalog_id))
    }

    /// Deletes one episode placeholder and queues it for the removal summary.
    pub async fn remove_episode(&self, episode_id: i64, show_id: i64, season: u32, episode: u32) -> Result<()> {
        self.shows_dir()?;
        let show = self
            .catalog
            .get_show(show_id, &self.config.strm_language)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("show {}", show_id)))?;

        let (show_dir, show_name) = self.show_path(&show).await;
        let file_name = format!("{} S{:02}E{:02}.{}", show_name, season, episode, PLACEHOLDER_EXTENSION);
        let episode_path = show_dir.join(&file_name);

        let already_removed = !episode_path.exists();
        if !already_removed {
            std::fs::remove_file(&episode_path).map_err(LibraryError::at(&episode_path))?;
        }

        if let Some(removals) = &self.removals {
            removals
                .notify(RemovedEpisode {
                    id: episode_id,
                    show_id,
                    show_name: show.name.clone(),
                    season,
                    episode,
                })
                .await;
        }

        if already_removed {
            return Err(LibraryError::NotFound(format!("{} has nothing left to remove", file_name)));
        }
        info!("{} removed from library", file_name);
        Ok(())
    }
}

fn remove_dirs(paths: Vec<PathBuf>, what: &str) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        warn!("Cannot find directories with placeholder files for {}", what);
        return Err(LibraryError::NotFound(format!("no placeholder directories for {}", what)));
    }

    for path in &paths {
        std::fs::remove_dir_all(path).map_err(LibraryError::at(path))?;
        warn!("Directory {:?} removed from disk", path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_episode, create_show, test_config, FakeCatalog};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        writer: PlaceholderWriter,
        db: Arc<ItemDatabase>,
        state: Arc<LibraryState>,
        config: LibraryConfig,
    }

    fn create_writer(catalog: FakeCatalog) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let db = Arc::new(ItemDatabase::open_in_memory().unwrap());
        let state = Arc::new(LibraryState::new());
        let duplicates = Arc::new(DuplicateDetector::new(state.clone(), config.addon_uid_key.clone()));
        let writer = PlaceholderWriter::new(config.clone(), Arc::new(catalog), db.clone(), state.clone(), duplicates);
        Fixture { _dir: dir, writer, db, state, config }
    }

    #[test]
    fn test_to_file_name_strips_reserved() {
        assert_eq!(to_file_name("Mission: Impossible (1996)"), "Mission Impossible (1996)");
        assert_eq!(to_file_name("AC/DC? 50% <Live>*+"), "ACDC 50 Live");
    }

    #[test]
    fn test_air_date_expired() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(air_date_expired("2024-05-11", true, today));
        assert!(!air_date_expired("2024-05-09", false, today));
        assert!(!air_date_expired("2024-05-10", true, today));
        assert!(air_date_expired("2024-05-10", false, today));
        assert!(!air_date_expired("", false, today));
    }

    #[test]
    fn test_show_nfo_links() {
        let show = FakeCatalog::show_metadata(1396, "Breaking Bad", "2008-01-20", vec![]);
        let nfo = show_nfo(&show, "strmsync");
        assert!(nfo.contains("<uniqueid type=\"strmsync\" default=\"false\">1396</uniqueid>"));
        assert!(nfo.contains("https://www.themoviedb.org/tv/1396\n"));
        assert!(nfo.contains("https://www.imdb.com/title/tt1396/\n"));
        assert!(nfo.contains("https://www.thetvdb.com/?tab=series&id=13960&lid=7\n"));
    }

    #[tokio::test]
    async fn test_write_movie_twice_creates_one_file() {
        let fixture = create_writer(FakeCatalog::new().with_movie(603, "The Matrix", "1999-03-30"));

        fixture.writer.write_movie(603, false).await.unwrap();
        fixture.writer.write_movie(603, false).await.unwrap();

        let dir = fixture.config.movies_path().join("The Matrix (1999)");
        let strm = std::fs::read_to_string(dir.join("The Matrix (1999).strm")).unwrap();
        assert_eq!(strm, "plugin://plugin.video.strmsync/library/movie/play/603");

        let nfo = std::fs::read_to_string(dir.join("The Matrix (1999).nfo")).unwrap();
        assert!(nfo.contains("<uniqueid type=\"tmdb\" default=\"true\">603</uniqueid>"));
        assert!(nfo.ends_with("https://www.themoviedb.org/movie/603\nhttps://www.imdb.com/title/tt603/\n"));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_soft_deleted_movie_needs_force() {
        let fixture = create_writer(FakeCatalog::new().with_movie(99, "Removed", "2001-01-01"));
        fixture
            .db
            .save_item(&library_sync_models::LibraryItem::new(99, MediaType::Movie, 0, ItemState::Deleted))
            .unwrap();

        let err = fixture.writer.write_movie(99, false).await.unwrap_err();
        assert!(err.is_video_removed());
        assert!(!fixture.config.movies_path().join("Removed (2001)").exists());

        fixture.writer.write_movie(99, true).await.unwrap();
        assert!(fixture.config.movies_path().join("Removed (2001)/Removed (2001).strm").exists());
    }

    #[tokio::test]
    async fn test_missing_movie_is_not_found() {
        let fixture = create_writer(FakeCatalog::new());
        let err = fixture.writer.write_movie(1, false).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unset_library_path_is_path_error() {
        let catalog = FakeCatalog::new().with_movie(603, "The Matrix", "1999-03-30");
        let mut config = test_config(Path::new("."));
        config.library_path = PathBuf::from(".");
        let state = Arc::new(LibraryState::new());
        let writer = PlaceholderWriter::new(
            config,
            Arc::new(catalog),
            Arc::new(ItemDatabase::open_in_memory().unwrap()),
            state.clone(),
            Arc::new(DuplicateDetector::new(state, "strmsync".to_string())),
        );

        assert!(matches!(writer.write_movie(603, false).await, Err(LibraryError::Path { .. })));
    }

    #[tokio::test]
    async fn test_write_show_skips_unaired_and_specials() {
        let catalog = FakeCatalog::new()
            .with_show(1396, "Breaking Bad", "2008-01-20", vec![(0, 1), (1, 3)])
            .with_season(1396, 0, vec![(1, "2008-01-01")])
            .with_season(1396, 1, vec![(1, "2008-01-20"), (2, "2008-01-27"), (3, "2999-01-01")]);
        let fixture = create_writer(catalog);

        fixture.writer.write_show(1396, true, false).await.unwrap();

        let dir = fixture.config.shows_path().join("Breaking Bad (2008)");
        assert!(dir.join("tvshow.nfo").exists());
        assert!(dir.join("Breaking Bad (2008) S01E01.strm").exists());
        assert_eq!(
            std::fs::read_to_string(dir.join("Breaking Bad (2008) S01E02.strm")).unwrap(),
            "plugin://plugin.video.strmsync/library/show/play/1396/1/2"
        );
        assert!(!dir.join("Breaking Bad (2008) S01E03.strm").exists());
        assert!(!dir.join("Breaking Bad (2008) S00E01.strm").exists());

        let episodes = fixture.db.items_by_state(MediaType::Episode, ItemState::Active).unwrap();
        assert_eq!(episodes.len(), 2);
        assert!(episodes.iter().all(|e| e.show_id == 1396));
    }

    #[tokio::test]
    async fn test_write_show_reuses_known_directory() {
        let catalog = FakeCatalog::new()
            .with_show(1396, "Breaking Bad", "2008-01-20", vec![(1, 2)])
            .with_season(1396, 1, vec![(1, "2008-01-20"), (2, "2008-01-27")]);
        let fixture = create_writer(catalog);

        let custom = fixture.config.shows_path().join("BB custom");
        std::fs::create_dir_all(&custom).unwrap();
        let known = custom.join("Breaking Bad (2008) S01E01.strm");
        std::fs::write(&known, "x").unwrap();
        fixture
            .state
            .replace_shows(vec![create_show(10, 1396, vec![create_episode(101, 1, 1, known.to_str().unwrap())])])
            .await;

        fixture.writer.write_show(1396, false, false).await.unwrap();

        assert!(custom.join("Breaking Bad (2008) S01E02.strm").exists());
        assert_eq!(std::fs::read_to_string(&known).unwrap(), "x");
        assert!(!fixture.config.shows_path().join("Breaking Bad (2008)").exists());
    }

    #[tokio::test]
    async fn test_remove_movie_marks_record_deleted() {
        let fixture = create_writer(FakeCatalog::new().with_movie(603, "The Matrix", "1999-03-30"));
        fixture.writer.write_movie(603, false).await.unwrap();
        fixture
            .db
            .save_item(&library_sync_models::LibraryItem::new(603, MediaType::Movie, 0, ItemState::Active))
            .unwrap();

        let removed = fixture.writer.remove_movie(603, false).await.unwrap();
        assert_eq!(removed, vec![fixture.config.movies_path().join("The Matrix (1999)")]);
        assert!(!removed[0].exists());
        assert!(fixture.db.was_removed(603, MediaType::Movie).unwrap());

        let err = fixture.writer.remove_movie(603, true).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
        assert!(fixture.db.item(603, MediaType::Movie).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_episode_twice_reports_nothing_left() {
        let catalog = FakeCatalog::new()
            .with_show(1396, "Breaking Bad", "2008-01-20", vec![(1, 1)])
            .with_season(1396, 1, vec![(1, "2008-01-20")]);
        let fixture = create_writer(catalog);
        fixture.writer.write_show(1396, false, false).await.unwrap();

        fixture.writer.remove_episode(62085, 1396, 1, 1).await.unwrap();
        let err = fixture.writer.remove_episode(62085, 1396, 1, 1).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
    }
}
