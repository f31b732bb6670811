use crate::errors::{ScrapewatchError, SyncError};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("could not connect to '{url}': {message}")]
    ConnectFailed { url: String, message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("connection closed: {reason}")]
    Closed { reason: String },

    #[error("failed to encode control message: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },
}

impl ScrapewatchError for ChannelError {
    fn error_code(&self) -> &'static str {
        match self {
            ChannelError::ConnectFailed { .. } => "CHANNEL_CONNECT_FAILED",
            ChannelError::Transport { .. } => "CHANNEL_TRANSPORT_ERROR",
            ChannelError::Closed { .. } => "CHANNEL_CLOSED",
            ChannelError::Encode { .. } => "CHANNEL_ENCODE_FAILED",
        }
    }
}

impl From<ChannelError> for SyncError {
    fn from(e: ChannelError) -> Self {
        SyncError::Disconnected {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_maps_to_disconnected() {
        let err = ChannelError::ConnectFailed {
            url: "ws://localhost:5000/ws".to_string(),
            message: "refused".to_string(),
        };
        assert_eq!(err.error_code(), "CHANNEL_CONNECT_FAILED");
        assert!(!err.is_user_error());

        let sync: SyncError = err.into();
        assert!(matches!(sync, SyncError::Disconnected { ref reason } if reason.contains("refused")));
    }
}
