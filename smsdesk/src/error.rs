use thiserror::Error;

const GENERIC_MESSAGE: &str = "Something went wrong, please try again.";

/// Every failure an API call can end in.
///
/// Cheap to clone so a single failed fetch can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Rejected locally, nothing was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend answered 401; the session has been cleared.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Backend error (status={status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Unauthorized => {
                "Your session has expired, please sign in again.".to_string()
            }
            ApiError::Timeout => {
                "The server took too long to respond, please try again.".to_string()
            }
            ApiError::Backend { message, .. } if !message.trim().is_empty() => {
                message.clone()
            }
            ApiError::Network(_) | ApiError::Backend { .. } | ApiError::Decode(_) => {
                GENERIC_MESSAGE.to_string()
            }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
