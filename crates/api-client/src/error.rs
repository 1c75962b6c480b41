use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport failure talking to the metering provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication with the metering provider failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded on {0}: daily query quota exhausted, retry tomorrow")]
    RateLimited(String),

    #[error("Permission denied on {0}")]
    PermissionDenied(String),

    #[error("Request to {endpoint} failed with status {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),
}

impl ApiError {
    /// The provider's daily quota is exhausted; retrying today is pointless.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ApiError::PermissionDenied(_))
    }
}
