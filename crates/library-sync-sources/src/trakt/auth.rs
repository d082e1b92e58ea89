use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tracing::{debug, info};

const TOKEN_URL: &str = "https://api.trakt.tv/oauth/token";
const DEVICE_CODE_URL: &str = "https://api.trakt.tv/oauth/device/code";
const DEVICE_TOKEN_URL: &str = "https://api.trakt.tv/oauth/device/token";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

pub fn create_trakt_client() -> Client {
    Client::builder()
        .user_agent(concat!("strmsync/", env!("CARGO_PKG_VERSION")))
        .timeout(StdDuration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenInfo {
    fn from_response(response: TokenResponse) -> Self {
        // Refresh two minutes early so a request never races the expiry
        let expires_at = Utc::now() + Duration::seconds(response.expires_in as i64 - 120);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + Duration::minutes(5)
    }
}

/// Code the user enters on the Trakt website to link this device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub expires_in: u64,
    pub interval: u64,
}

pub async fn refresh_access_token(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenInfo> {
    let payload = serde_json::json!({
        "refresh_token": refresh_token,
        "client_id": client_id,
        "client_secret": client_secret,
        "redirect_uri": REDIRECT_URI,
        "grant_type": "refresh_token"
    });

    let response = client
        .post(TOKEN_URL)
        .json(&payload)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Token refresh failed: {} - {}", status, error_text));
    }

    let token_response: TokenResponse = response.json().await?;
    Ok(TokenInfo::from_response(token_response))
}

pub async fn request_device_code(client: &Client, client_id: &str) -> Result<DeviceCode> {
    let response = client
        .post(DEVICE_CODE_URL)
        .json(&serde_json::json!({ "client_id": client_id }))
        .header("Content-Type", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("Failed to request device code: {} - {}", status, error_text));
    }

    Ok(response.json().await?)
}

/// Polls until the user approves the device code, it expires, or is denied.
pub async fn poll_device_token(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    device: &DeviceCode,
) -> Result<TokenInfo> {
    let mut interval = StdDuration::from_secs(device.interval.max(1));
    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(device.expires_in);
    let payload = serde_json::json!({
        "code": device.device_code,
        "client_id": client_id,
        "client_secret": client_secret,
    });

    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(interval).await;

        let response = client
            .post(DEVICE_TOKEN_URL)
            .json(&payload)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {
                let token_response: TokenResponse = response.json().await?;
                return Ok(TokenInfo::from_response(token_response));
            }
            // Pending
            400 => debug!("Waiting for device authorization"),
            429 => interval += StdDuration::from_secs(1),
            404 => return Err(anyhow!("Invalid device code")),
            409 => return Err(anyhow!("Device code already used")),
            410 => return Err(anyhow!("Device code expired")),
            418 => return Err(anyhow!("Authorization denied by user")),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                return Err(anyhow!("Failed to poll device token: {} - {}", status, error_text));
            }
        }
    }

    Err(anyhow!("Device code expired"))
}

/// Full device-code flow. `show_code` is called once with the code to display.
pub async fn authorize_device<F>(client_id: &str, client_secret: &str, show_code: F) -> Result<TokenInfo>
where
    F: FnOnce(&DeviceCode),
{
    let client = create_trakt_client();
    let device = request_device_code(&client, client_id).await?;
    show_code(&device);

    let token = poll_device_token(&client, client_id, client_secret, &device).await?;
    info!(operation = "trakt_authorize", "Device authorized with Trakt");
    Ok(token)
}
