//! Error types for the backend client.

use thiserror::Error;

/// Errors produced while talking to the classification backend.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out")]
    Timeout,

    #[error("core error: {0}")]
    Core(#[from] satclass_core::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl CloudError {
    /// Human-readable failure reason: the backend's `detail` when it sent
    /// one, otherwise the transport error message.
    pub fn reason(&self) -> String {
        match self {
            CloudError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            CloudError::Http(e) if e.is_timeout() => "timeout".to_string(),
            CloudError::Timeout => "timeout".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result alias for backend operations.
pub type Result<T> = std::result::Result<T, CloudError>;
