use super::load_config;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use library_sync_config::{CredentialStore, PathManager};
use library_sync_sources::trakt_authorize_device;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run_trakt(logout: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let credentials_file = paths.credentials_file();

    if logout {
        if forget_trakt(&credentials_file)? {
            output.success("Trakt tokens removed");
        } else {
            output.info("No Trakt tokens stored");
        }
        return Ok(());
    }

    let config = load_config(&paths)?;
    if !config.is_trakt_configured() {
        return Err(eyre!("Set trakt.enabled, trakt.client_id and trakt.client_secret before authorizing"));
    }

    let token = trakt_authorize_device(&config.trakt.client_id, &config.trakt.client_secret, |code| {
        output.info(format!(
            "Open {} and enter the code {}",
            code.verification_url,
            code.user_code.bold()
        ));
        output.info(format!("Waiting for authorization (expires in {} minutes)...", code.expires_in / 60));
    })
    .await
    .map_err(|e| eyre!("Trakt authorization failed: {:#}", e))?;

    let mut store = open_store(&credentials_file)?;
    store.clear_trakt();
    store.set_trakt_access_token(token.access_token);
    store.set_trakt_refresh_token(token.refresh_token);
    store.set_trakt_token_expires(token.expires_at);
    save_store(&store, &credentials_file)?;

    output.success("Trakt authorized");
    Ok(())
}

/// Drops stored Trakt tokens, keeping other credentials. Returns whether a token was stored.
fn forget_trakt(credentials_file: &Path) -> Result<bool> {
    let mut store = open_store(credentials_file)?;
    let had_token = store.get_trakt_access_token().is_some() || store.get_trakt_refresh_token().is_some();
    if had_token {
        store.clear_trakt();
        save_store(&store, credentials_file)?;
    }
    Ok(had_token)
}

fn open_store(credentials_file: &Path) -> Result<CredentialStore> {
    let mut store = CredentialStore::new(credentials_file.to_path_buf());
    store
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    Ok(store)
}

fn save_store(store: &CredentialStore, credentials_file: &Path) -> Result<()> {
    store
        .save()
        .map_err(|e| eyre!("Failed to save credentials to {}: {}", credentials_file.display(), e))
}
