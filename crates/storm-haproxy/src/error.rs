use thiserror::Error;

/// Result type for HAProxy control operations
pub type Result<T> = std::result::Result<T, HaproxyError>;

#[derive(Error, Debug)]
pub enum HaproxyError {
    /// All 1024 pre-declared slots are bound; members beyond that are
    /// dropped until an existing member leaves
    #[error("no free server slot in backend {backend}")]
    NoFreeSlot { backend: String },

    /// Unexpected output from the runtime socket
    #[error("HAProxy protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HaproxyError {
    pub fn protocol<T: Into<String>>(msg: T) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn is_no_free_slot(&self) -> bool {
        matches!(self, Self::NoFreeSlot { .. })
    }
}
