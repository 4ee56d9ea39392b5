use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, StormError>;

#[derive(Error, Debug)]
pub enum StormError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed service reference: {0}")]
    ServiceRef(String),

    #[error("Malformed query: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StormError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        Self::Query(msg.into())
    }
}
