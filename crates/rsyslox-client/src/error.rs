use thiserror::Error;

/// Failure talking to the query API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or protocol failure before a response arrived
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status with the server's message
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Missing, rejected or expired credentials. Never retried.
    #[error("session expired")]
    Unauthenticated,

    /// Response body did not match the expected shape
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Build an HTTP error from a response body, preferring the JSON
    /// `message` or `error` field over the bare status.
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                ["message", "error"].iter().find_map(|key| {
                    v.get(*key)
                        .and_then(|m| m.as_str())
                        .filter(|m| !m.is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self::Http { status, message }
    }
}
