use storm_client::ApiError;
use storm_core::StormError;
use thiserror::Error;

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Model error: {0}")]
    Model(#[from] StormError),

    /// A trigger reached the `error` status
    #[error("Trigger {uuid} failed: {reason}")]
    TriggerFailed { uuid: String, reason: String },

    /// Anything domain-specific a reconciler or handler surfaces
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecutorError {
    /// Fatal errors abort the executor; everything else is retried next tick.
    ///
    /// Validation failures mean the desired state cannot be interpreted, so
    /// retrying would loop forever on the same input.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Api(e) => e.is_validation(),
            Self::Model(_) => true,
            Self::TriggerFailed { .. } => false,
            Self::Other(_) => false,
        }
    }
}
