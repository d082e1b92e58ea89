//! Minimal JSON-RPC 2.0 transport.

use crate::error::{check_response, SourceError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

pub struct RpcClient {
    client: Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: String, username: Option<String>, password: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url,
            username,
            password,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SourceError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params: &params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!(operation = "jsonrpc", method = method);

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                SourceError::Unavailable(self.url.clone())
            } else {
                SourceError::Request(e)
            }
        })?;
        let response = check_response(response, method).await?;
        let text = response.text().await?;
        decode_response(method, &text)
    }
}

pub(crate) fn decode_response<T: DeserializeOwned>(method: &str, text: &str) -> Result<T, SourceError> {
    let response: RpcResponse<T> = serde_json::from_str(text)?;
    if let Some(error) = response.error {
        return Err(SourceError::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| SourceError::Decode(format!("{} returned no result", method)))
}
