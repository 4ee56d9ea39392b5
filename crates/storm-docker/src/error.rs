use thiserror::Error;

/// Result type for recipe handling
pub type Result<T> = std::result::Result<T, HandlerError>;

#[derive(Error, Debug)]
pub enum HandlerError {
    /// Malformed or unsupported recipe content
    #[error("Invalid recipe: {0}")]
    Recipe(String),

    /// The trigger does not name a usable target
    #[error("No target: {0}")]
    NoTarget(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("API error: {0}")]
    Api(#[from] storm_client::ApiError),
}

impl HandlerError {
    pub fn recipe<T: Into<String>>(msg: T) -> Self {
        Self::Recipe(msg.into())
    }

    pub fn no_target<T: Into<String>>(msg: T) -> Self {
        Self::NoTarget(msg.into())
    }
}
