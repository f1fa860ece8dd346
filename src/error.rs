use thiserror::Error;

/// Failures of a remote call, as seen by the code that issued it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected our credentials. The session has already been
    /// cleared by the time this reaches a caller.
    #[error("session expired (status {status}), please log in again")]
    SessionExpired { status: u16 },

    /// Validation or server error carrying the server's own message.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cannot encode query: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }

    /// Builds a `Remote` error from a non-success body, falling back to the
    /// status line when the body has no usable message.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("errors").and_then(|e| e.get("message")))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("server returned status {}", status));
        ApiError::Remote { status, message }
    }
}
