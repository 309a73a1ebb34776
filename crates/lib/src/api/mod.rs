//! REST gateway clients for the dbchat service.
//!
//! [`AuthClient`] covers `/user/*`, [`ChatClient`] covers the query endpoint and
//! chat-history CRUD. Both are thin request/response mappings: no retries, no
//! timeouts, no Authorization header.

mod auth;
mod chat;

pub use auth::AuthClient;
pub use chat::ChatClient;

/// Default API host when neither config nor `DBCHAT_API_URL` sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response: connection refused, DNS, TLS, or a body that failed to decode.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("api error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        status: u16,
        message: Option<String>,
    },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Message the server put in its error body, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// True when the server actually answered (as opposed to a transport failure).
    pub fn server_responded(&self) -> bool {
        match self {
            ApiError::Status { .. } | ApiError::Decode(_) => true,
            ApiError::Request(e) => e.is_decode() || e.is_status(),
        }
    }
}

pub(crate) fn normalize_base_url(base_url: Option<String>) -> String {
    base_url
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Pull a human-readable message out of an error body (`message`, `detail` or `error`).
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
}

/// Map a non-success response to [`ApiError::Status`]; pass successes through.
pub(crate) async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url(Some("http://api.local:9000/".to_string())),
            "http://api.local:9000"
        );
        assert_eq!(normalize_base_url(Some("  ".to_string())), DEFAULT_BASE_URL);
        assert_eq!(normalize_base_url(None), DEFAULT_BASE_URL);
    }

    #[test]
    fn error_message_fields() {
        assert_eq!(
            error_message(r#"{"message":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            error_message(r#"{"detail":"Email already registered"}"#).as_deref(),
            Some("Email already registered")
        );
        assert_eq!(error_message(r#"{"detail":[{"loc":["body"]}]}"#), None);
        assert_eq!(error_message("<html>502</html>"), None);
    }
}
