use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding provider failure: {0}")]
    EmbeddingFailed(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdvisorError {
    /// Transient failures are worth retrying by the caller; everything else
    /// is a caller error that will not succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdvisorError::EmbeddingFailed(_) | AdvisorError::StoreUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        AdvisorError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AdvisorError {
    fn from(err: std::io::Error) -> Self {
        AdvisorError::Snapshot(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AdvisorError {
    fn from(err: ndarray::ShapeError) -> Self {
        AdvisorError::InvalidInput(err.to_string())
    }
}
