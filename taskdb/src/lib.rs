//! # Sower Task Store
//!
//! Distributing a file takes several reconciliation rounds: workers claim
//! slices, upload them on their own schedule, and the chain confirms deals
//! long after the announcement went out. To survive crashes and restarts the
//! gateway persists one `ProvideTask` record per fid and replays the workflow
//! from the store on every sweep.
//!
//! The store itself is a plain keyed map with snapshot iteration. Single
//! operations are atomic; the gateway's per-fid key lock provides the
//! read-modify-write transaction, so no backend needs transactional
//! semantics. Two backends exist: an in-memory map (default, also the test
//! double) and redis (`redis-db` feature) for deployments that co-locate the
//! record with the message bus.

use sower_lib::task::ProvideTask;

mod mem_db;

pub use mem_db::{InMemoryTaskDb, InMemoryTaskStore};

#[cfg(feature = "redis-db")]
mod redis_db;

#[cfg(feature = "redis-db")]
pub use redis_db::{RedisStoreConfig, RedisTaskDb, RedisTaskStore};

#[derive(PartialEq, Debug, thiserror::Error)]
pub enum TaskStoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("redis error: {0}")]
    Redis(String),
}

pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

impl From<serde_json::Error> for TaskStoreError {
    fn from(error: serde_json::Error) -> TaskStoreError {
        TaskStoreError::Serde(error.to_string())
    }
}

/// Persistent map `fid -> ProvideTask`.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    /// Serialize and store the record under `fid`.
    async fn put(&self, fid: &str, task: &ProvideTask) -> TaskStoreResult<()>;

    /// Load and deserialize the record; `KeyNotFound` when absent.
    async fn get(&self, fid: &str) -> TaskStoreResult<ProvideTask>;

    /// Drop the record. Absent keys are not an error.
    async fn delete(&self, fid: &str) -> TaskStoreResult<()>;

    /// Stable snapshot of the stored fids; the reconciler's iteration source.
    async fn fids(&self) -> TaskStoreResult<Vec<String>>;
}
