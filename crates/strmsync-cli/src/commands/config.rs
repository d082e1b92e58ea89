use crate::output::{mask, Output};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use library_sync_config::{Config, PathManager};

pub fn run_show(full: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    if !config_file.exists() {
        return Err(eyre!(
            "Configuration file not found at {}. Run 'strmsync config init' to create one.",
            config_file.display()
        ));
    }
    let config = Config::load_from_file(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    let validation = config.validate();
    let config = if full { config } else { masked(config) };

    if output.is_human() {
        output.info(format!("# {}", config_file.display()));
        output.info(toml::to_string_pretty(&config)?);
        if let Err(e) = validation {
            output.warn(format!("Configuration is incomplete: {}", e));
        }
    } else {
        output.json(&serde_json::json!({
            "path": config_file.display().to_string(),
            "valid": validation.is_ok(),
            "config": config,
        }));
    }
    Ok(())
}

pub fn run_init(force: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        return Err(eyre!(
            "{} already exists. Use --force to overwrite it.",
            config_file.display()
        ));
    }

    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create directories under {}: {}", paths.config_dir().display(), e))?;
    Config::template()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to write {}: {}", config_file.display(), e))?;

    output.success(format!("Wrote {}", config_file.display()));
    output.info("Set library.library_path and tmdb.api_key, then run 'strmsync auth trakt' to link Trakt.");
    Ok(())
}

fn masked(mut config: Config) -> Config {
    config.trakt.client_id = mask(&config.trakt.client_id);
    config.trakt.client_secret = mask(&config.trakt.client_secret);
    config.tmdb.api_key = mask(&config.tmdb.api_key);
    config.kodi.password = config.kodi.password.as_deref().map(mask);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = Config::template();
        config.tmdb.api_key = "0123456789abcdef".to_string();
        config.kodi.password = Some("hunter22".to_string());

        let config = masked(config);
        assert_eq!(config.tmdb.api_key, "01***ef");
        assert_eq!(config.trakt.client_id, "<not set>");
        assert_eq!(config.kodi.password.as_deref(), Some("hu***22"));
    }
}
