use thiserror::Error;

use crate::config::ERROR_BODY_MAX_CHARS;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required upstream call failed. `status` is `None` for transport
    /// failures (timeout, connection refused) where no response arrived.
    #[error("API error on {endpoint} (status {}): {body}", fmt_status(.status))]
    TransientApi {
        endpoint: String,
        status: Option<u16>,
        body: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "n/a".to_string())
}

impl AppError {
    pub fn transient(endpoint: &str, status: Option<u16>, body: &str) -> Self {
        AppError::TransientApi {
            endpoint: endpoint.to_string(),
            status,
            body: truncate_body(body),
        }
    }
}

/// Cut a response body down to `ERROR_BODY_MAX_CHARS` characters.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
