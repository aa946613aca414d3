// Sower
// Copyright (c) 2025 Sower Contributors
// Licensed and distributed under either of
//   * MIT license (license terms in the root directory or at http://opensource.org/licenses/MIT).
//   * Apache v2 license (license terms in the root directory or at http://www.apache.org/licenses/LICENSE-2.0).
// at your option. This file may not be copied, modified, or distributed except according to those terms.

// Imports
// ----------------------------------------------------------------
use backoff::ExponentialBackoff;
use redis::{Client, Commands, RedisResult};
use sower_lib::task::ProvideTask;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::error;

use crate::{TaskStore, TaskStoreError, TaskStoreResult};

/// Key prefix in case the database is co-located with other services.
const TASK_KEY_PREFIX: &str = "ptask:";

#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// The URL of the redis database, e.g. "redis://localhost:6379".
    pub url: String,
    /// Record TTL in seconds; a safety net well above any workflow lifetime.
    pub ttl: u64,
}

pub struct RedisTaskDb {
    client: Client,
    config: RedisStoreConfig,
}

impl RedisTaskDb {
    fn new(config: RedisStoreConfig) -> TaskStoreResult<Self> {
        let client =
            Client::open(config.url.clone()).map_err(|e| TaskStoreError::Redis(e.to_string()))?;
        Ok(RedisTaskDb { client, config })
    }

    fn get_conn(&mut self) -> Result<redis::Connection, redis::RedisError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Some(Duration::from_secs(300)),
            ..Default::default()
        };

        backoff::retry(backoff, || match self.client.get_connection() {
            Ok(conn) => Ok(conn),
            Err(e) => {
                error!("Failed to connect to redis: {e:?}, retrying...");
                self.client = redis::Client::open(self.config.url.clone())?;
                Err(backoff::Error::Transient {
                    err: e,
                    retry_after: None,
                })
            }
        })
        .map_err(|e| match e {
            backoff::Error::Transient {
                err,
                retry_after: _,
            }
            | backoff::Error::Permanent(err) => err,
        })
    }

    fn key(fid: &str) -> String {
        format!("{TASK_KEY_PREFIX}{fid}")
    }

    fn put(&mut self, fid: &str, task: &ProvideTask) -> TaskStoreResult<()> {
        let ttl = self.config.ttl;
        self.get_conn()
            .and_then(|mut conn| conn.set_ex(Self::key(fid), task, ttl))
            .map_err(|e| TaskStoreError::Redis(e.to_string()))
    }

    fn get(&mut self, fid: &str) -> TaskStoreResult<ProvideTask> {
        let result: RedisResult<ProvideTask> = self
            .get_conn()
            .map_err(|e| TaskStoreError::Redis(e.to_string()))?
            .get(Self::key(fid));
        match result {
            Ok(task) => Ok(task),
            // nil replies fail the type conversion
            Err(e) if e.kind() == redis::ErrorKind::TypeError => {
                Err(TaskStoreError::KeyNotFound(fid.to_string()))
            }
            Err(e) => Err(TaskStoreError::Redis(e.to_string())),
        }
    }

    fn delete(&mut self, fid: &str) -> TaskStoreResult<()> {
        let _removed: usize = self
            .get_conn()
            .and_then(|mut conn| conn.del(Self::key(fid)))
            .map_err(|e| TaskStoreError::Redis(e.to_string()))?;
        Ok(())
    }

    fn fids(&mut self) -> TaskStoreResult<Vec<String>> {
        let keys: Vec<String> = self
            .get_conn()
            .and_then(|mut conn| conn.keys(format!("{TASK_KEY_PREFIX}*")))
            .map_err(|e| TaskStoreError::Redis(e.to_string()))?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(TASK_KEY_PREFIX).map(str::to_string))
            .collect())
    }
}

/// Redis-backed task store for deployments that co-locate the records with
/// the message bus.
pub struct RedisTaskStore {
    db: Arc<Mutex<RedisTaskDb>>,
}

impl RedisTaskStore {
    pub fn open(config: RedisStoreConfig) -> TaskStoreResult<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(RedisTaskDb::new(config)?)),
        })
    }
}

#[async_trait::async_trait]
impl TaskStore for RedisTaskStore {
    async fn put(&self, fid: &str, task: &ProvideTask) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.put(fid, task)
    }

    async fn get(&self, fid: &str) -> TaskStoreResult<ProvideTask> {
        let mut db = self.db.lock().await;
        db.get(fid)
    }

    async fn delete(&self, fid: &str) -> TaskStoreResult<()> {
        let mut db = self.db.lock().await;
        db.delete(fid)
    }

    async fn fids(&self) -> TaskStoreResult<Vec<String>> {
        let mut db = self.db.lock().await;
        db.fids()
    }
}
