use thiserror::Error;

/// Failure talking to one of the external collaborators.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to {action}: {status} - {body}")]
    Http { action: String, status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Not authenticated with {0}")]
    NotAuthenticated(&'static str),

    /// The tracking account is locked and needs attention on the website.
    #[error("Account is locked")]
    Locked,

    #[error("{method} failed: {code} - {message}")]
    Rpc { method: String, code: i64, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("{0} is unavailable")]
    Unavailable(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::Http { status: 404, .. })
    }
}

/// Turns a non-success response into `SourceError::Http`, or `Locked` for HTTP 423.
pub(crate) async fn check_response(response: reqwest::Response, action: &str) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 423 {
        return Err(SourceError::Locked);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::Http {
        action: action.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let err = SourceError::Http {
            action: "fetch watchlist".to_string(),
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to fetch watchlist: 401 - unauthorized");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_decode_from_serde() {
        let err: SourceError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SourceError::Decode(_)));
    }
}
