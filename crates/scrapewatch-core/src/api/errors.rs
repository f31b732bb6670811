use crate::errors::{ScrapewatchError, SyncError};

/// Message shown when a failed response carries no usable text.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// `message` is the backend's own text, if the body carried one.
    #[error("{url} returned {status}: {}", status_text(.message, .reason))]
    Status {
        url: String,
        status: u16,
        reason: String,
        message: Option<String>,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The backend's own explanation, for showing to a user.
    pub fn server_message(&self) -> &str {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } if !message.is_empty() => message,
            _ => UNEXPECTED_ERROR,
        }
    }
}

fn status_text<'a>(message: &'a Option<String>, reason: &'a str) -> &'a str {
    message.as_deref().unwrap_or(reason)
}

impl ScrapewatchError for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidBaseUrl { .. } => "API_INVALID_BASE_URL",
            ApiError::Request { .. } => "API_REQUEST_FAILED",
            ApiError::Status { .. } => "API_STATUS_ERROR",
            ApiError::Decode { .. } => "API_DECODE_FAILED",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidBaseUrl { .. } | ApiError::Status { status: 400..=499, .. }
        )
    }
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Decode { .. } => SyncError::Decode {
                message: e.to_string(),
            },
            ApiError::Status { status, .. } => SyncError::Fetch {
                message: e.to_string(),
                status: Some(status),
            },
            other => SyncError::Fetch {
                message: other.to_string(),
                status: None,
            },
        }
    }
}
