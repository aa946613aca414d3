use crate::{bus::BusError, chain::ChainError};
use sower_taskdb::TaskStoreError;

/// The standardized error returned by the gateway endpoints.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// The file is already being processed.
    #[error("file is being processed")]
    Conflict,

    /// Malformed signature, timestamp or public key.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request timestamp is older than the freshness window.
    #[error("expired request")]
    Expired,

    #[error("signature verification failed")]
    AuthFailed,

    /// Unknown fid or token.
    #[error("not found: {0}")]
    NotFound(String),

    /// Every slice of the file is reserved.
    #[error("all subtasks have been distributed")]
    AlreadyClaimed,

    /// The slice cursor reached the end of its column.
    #[error("subtask done")]
    Exhausted,

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("store error: {0}")]
    Store(TaskStoreError),

    /// A catch-all for any other error type.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A type alias for the standardized result type of the gateway endpoints.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<TaskStoreError> for GatewayError {
    fn from(error: TaskStoreError) -> Self {
        match error {
            TaskStoreError::KeyNotFound(key) => GatewayError::NotFound(key),
            other => GatewayError::Store(other),
        }
    }
}

impl From<BusError> for GatewayError {
    fn from(error: BusError) -> Self {
        GatewayError::Internal(anyhow::Error::new(error))
    }
}
