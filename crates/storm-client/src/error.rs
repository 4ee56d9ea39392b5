use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response from the API server
    #[error("API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A member or node could not be resolved unambiguously
    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid API server URL: {0}")]
    Url(String),
}

impl ApiError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resolution<T: Into<String>>(msg: T) -> Self {
        Self::Resolution(msg.into())
    }

    /// HTTP status of the failed request, if this is an HTTP error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Fatal for the executor loop: desired state it cannot interpret
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Url(_))
    }

    /// Worth retrying on the next tick
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
