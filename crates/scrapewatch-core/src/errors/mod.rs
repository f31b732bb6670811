use std::error::Error;

/// Base trait for all scrapewatch errors.
pub trait ScrapewatchError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling
    fn error_code(&self) -> &'static str;

    /// Whether this error was caused by user input rather than the system
    fn is_user_error(&self) -> bool {
        false
    }
}

/// Failure taxonomy surfaced to view state.
///
/// Transport and HTTP errors are normalized into these variants at the
/// fetch/channel boundary; nothing above that boundary sees a raw
/// `reqwest` or websocket error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Superseded or disposed. Never shown to the user.
    #[error("request canceled")]
    Canceled,

    #[error("fetch failed: {message}")]
    Fetch {
        message: String,
        status: Option<u16>,
    },

    #[error("disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("offline after {attempts} reconnect attempts, manual reconnect required")]
    ReconnectExhausted { attempts: u32 },

    #[error("could not {action} session: {message}")]
    ControlAction { action: String, message: String },

    #[error("unexpected response shape: {message}")]
    Decode { message: String },
}

impl SyncError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, SyncError::Canceled)
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Fetch { status, .. } => status.is_none_or(|s| s >= 500 || s == 429),
            SyncError::Disconnected { .. } => true,
            _ => false,
        }
    }
}

impl ScrapewatchError for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            SyncError::Canceled => "REQUEST_CANCELED",
            SyncError::Fetch { .. } => "FETCH_FAILED",
            SyncError::Disconnected { .. } => "CHANNEL_DISCONNECTED",
            SyncError::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            SyncError::ControlAction { .. } => "CONTROL_ACTION_FAILED",
            SyncError::Decode { .. } => "DECODE_FAILED",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, SyncError::ControlAction { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Decode {
            message: e.to_string(),
        }
    }
}

impl ScrapewatchError for scrapewatch_config::ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            scrapewatch_config::ConfigError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
            scrapewatch_config::ConfigError::InvalidConfiguration { .. } => {
                "INVALID_CONFIGURATION"
            }
            scrapewatch_config::ConfigError::IoError { .. } => "CONFIG_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            scrapewatch_config::ConfigError::ConfigParseError { .. }
                | scrapewatch_config::ConfigError::InvalidConfiguration { .. }
        )
    }
}
