use supportdesk_core::ApplicationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to `{url}` failed: {message}")]
    Transport { url: String, message: String },
    #[error("request rejected: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("stale version: {0}")]
    Conflict(String),
    #[error("action not allowed: {0}")]
    Unprocessable(String),
    #[error("service unavailable ({status}): {detail}")]
    Unavailable { status: u16, detail: String },
    #[error("unexpected status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Maps a non-success response to the taxonomy; `detail` is already
    /// normalized to a single string.
    pub(crate) fn from_status(status: u16, detail: String) -> Self {
        match status {
            400 => Self::BadRequest(detail),
            404 => Self::NotFound(detail),
            409 | 412 => Self::Conflict(detail),
            422 => Self::Unprocessable(detail),
            502..=504 => Self::Unavailable { status, detail },
            _ => Self::Status { status, detail },
        }
    }

    /// Whether an idempotent request may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Unavailable { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<GatewayError> for ApplicationError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::NotFound(detail) => ApplicationError::NotFound(detail),
            other => ApplicationError::Integration(other.to_string()),
        }
    }
}
