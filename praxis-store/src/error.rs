//! Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error(
        "write conflict on profile {key}: expected version {expected}, store has {actual}"
    )]
    WriteConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// The backend is unreachable. The in-memory store never raises
    /// this; remote implementations return it so callers can degrade.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
