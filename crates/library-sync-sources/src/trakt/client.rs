use crate::error::{check_response, SourceError};
use crate::traits::TrackingClient;
use crate::trakt::api::{self, API_URL};
use crate::trakt::auth::{self, TokenInfo};
use async_trait::async_trait;
use library_sync_config::{CredentialStore, TraktConfig};
use library_sync_models::{
    LastActivities, ListItem, ListKind, PausedEpisode, PausedMovie, UserList, WatchedMovie, WatchedShow,
    WatchedUpdate,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SERVICE: &str = "Trakt";

pub struct TraktClient {
    client: Client,
    client_id: String,
    client_secret: String,
    credentials_file: PathBuf,
    token: RwLock<Option<TokenInfo>>,
}

impl TraktClient {
    pub fn new(client_id: String, client_secret: String, credentials_file: PathBuf) -> Self {
        Self {
            client: auth::create_trakt_client(),
            client_id,
            client_secret,
            credentials_file,
            token: RwLock::new(None),
        }
    }

    pub fn from_config(config: &TraktConfig, credentials_file: PathBuf) -> Self {
        Self::new(config.client_id.clone(), config.client_secret.clone(), credentials_file)
    }

    /// Returns a usable access token, refreshing and persisting it when it is about to expire.
    async fn access_token(&self) -> Result<String, SourceError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.token.write().await;
        let mut store = CredentialStore::new(self.credentials_file.clone());
        if let Err(e) = store.load() {
            warn!(operation = "trakt_token", error = %e, "Failed to load Trakt credentials");
            return Err(SourceError::NotAuthenticated(SERVICE));
        }

        let saved_access = store.get_trakt_access_token().cloned();
        let saved_refresh = store.get_trakt_refresh_token().cloned();

        if let Some(access_token) = saved_access {
            let token = TokenInfo {
                access_token,
                refresh_token: saved_refresh.clone().unwrap_or_default(),
                // Tokens saved without an expiry are trusted until the API rejects them
                expires_at: store
                    .get_trakt_token_expires()
                    .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::days(1)),
            };
            if token.is_fresh() {
                let access = token.access_token.clone();
                *guard = Some(token);
                return Ok(access);
            }
            info!("Trakt access token expired or expiring soon (expires at {}), refreshing", token.expires_at);
        }

        let Some(refresh_token) = saved_refresh else {
            return Err(SourceError::NotAuthenticated(SERVICE));
        };

        let token = auth::refresh_access_token(&self.client, &self.client_id, &self.client_secret, &refresh_token)
            .await
            .map_err(|e| {
                warn!(operation = "trakt_token_refresh", error = %e, "Trakt token refresh failed");
                SourceError::NotAuthenticated(SERVICE)
            })?;

        store.set_trakt_access_token(token.access_token.clone());
        store.set_trakt_refresh_token(token.refresh_token.clone());
        store.set_trakt_token_expires(token.expires_at);
        if let Err(e) = store.save() {
            warn!(operation = "trakt_token_refresh", error = %e, "Failed to persist refreshed Trakt token");
        }

        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    fn with_headers(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", access_token))
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, action: &str) -> Result<T, SourceError> {
        let access_token = self.access_token().await?;
        let url = format!("{}{}", API_URL, path);
        debug!(operation = "trakt_get", url = %url);

        let response = self.with_headers(self.client.get(&url), &access_token).send().await?;
        let response = check_response(response, action).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value, action: &str) -> Result<(), SourceError> {
        let access_token = self.access_token().await?;
        let url = format!("{}{}", API_URL, path);

        let response = self
            .with_headers(self.client.post(&url), &access_token)
            .json(body)
            .send()
            .await?;
        check_response(response, action).await?;
        Ok(())
    }

    fn extended(kind: ListKind) -> &'static str {
        // Show entries need `updated_at`, which only the full variant carries
        match kind {
            ListKind::Movies => "",
            ListKind::Shows => "?extended=full",
        }
    }
}

#[async_trait]
impl TrackingClient for TraktClient {
    async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_ok()
    }

    async fn watchlist(&self, kind: ListKind) -> Result<Vec<ListItem>, SourceError> {
        let path = format!("/sync/watchlist/{}{}", kind.as_str(), Self::extended(kind));
        let entries = self.get_json(&path, "fetch watchlist").await?;
        Ok(api::list_items(entries, kind))
    }

    async fn collection(&self, kind: ListKind) -> Result<Vec<ListItem>, SourceError> {
        let path = format!("/sync/collection/{}{}", kind.as_str(), Self::extended(kind));
        let entries = self.get_json(&path, "fetch collection").await?;
        Ok(api::list_items(entries, kind))
    }

    async fn list_items(&self, list_id: &str, kind: ListKind) -> Result<Vec<ListItem>, SourceError> {
        let item_type = match kind {
            ListKind::Movies => "movie",
            ListKind::Shows => "show",
        };
        let path = format!("/users/me/lists/{}/items/{}{}", list_id, item_type, Self::extended(kind));
        let entries = self.get_json(&path, "fetch list items").await?;
        Ok(api::list_items(entries, kind))
    }

    async fn watched_movies(&self) -> Result<Vec<WatchedMovie>, SourceError> {
        let entries = self.get_json("/sync/watched/movies", "fetch watched movies").await?;
        Ok(api::watched_movies(entries))
    }

    async fn watched_shows(&self) -> Result<Vec<WatchedShow>, SourceError> {
        let entries = self.get_json("/sync/watched/shows", "fetch watched shows").await?;
        Ok(api::watched_shows(entries))
    }

    async fn paused_movies(&self) -> Result<Vec<PausedMovie>, SourceError> {
        let entries = self
            .get_json("/sync/playback/movies?extended=full", "fetch paused movies")
            .await?;
        Ok(api::paused_movies(entries))
    }

    async fn paused_episodes(&self) -> Result<Vec<PausedEpisode>, SourceError> {
        let entries = self
            .get_json("/sync/playback/episodes?extended=full", "fetch paused episodes")
            .await?;
        Ok(api::paused_episodes(entries))
    }

    async fn user_lists(&self) -> Result<Vec<UserList>, SourceError> {
        let lists = self.get_json("/users/me/lists", "fetch user lists").await?;
        Ok(api::user_lists(lists))
    }

    async fn set_watched_batch(&self, items: &[WatchedUpdate]) -> Result<(), SourceError> {
        let (watched, unwatched): (Vec<WatchedUpdate>, Vec<WatchedUpdate>) =
            items.iter().cloned().partition(|item| item.watched);

        if !watched.is_empty() {
            self.post_json("/sync/history", &api::history_body(&watched), "add to history")
                .await?;
        }
        if !unwatched.is_empty() {
            self.post_json("/sync/history/remove", &api::history_body(&unwatched), "remove from history")
                .await?;
        }

        info!(
            operation = "trakt_set_watched",
            watched = watched.len(),
            unwatched = unwatched.len(),
            "Pushed watched state to Trakt"
        );
        Ok(())
    }

    async fn last_activities(&self) -> Result<LastActivities, SourceError> {
        let raw = self.get_json("/sync/last_activities", "fetch last activities").await?;
        Ok(api::last_activities(raw))
    }
}
