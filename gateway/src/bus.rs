use async_trait::async_trait;
use backoff::ExponentialBackoff;
use redis::Commands;
use sower_lib::task::Task;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(String),
}

/// Best-effort broadcast to storage workers. No delivery guarantee: lost
/// announcements are compensated by the reconciler's re-publish.
#[async_trait]
pub trait ProvideBus: Send + Sync {
    async fn publish(&self, channel: &str, task: &Task) -> Result<(), BusError>;
}

/// Redis PUBLISH-backed bus.
#[derive(Debug, Clone)]
pub struct RedisBus {
    client: redis::Client,
    url: String,
}

impl RedisBus {
    pub fn open(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(|e| BusError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn conn(&self) -> Result<redis::Connection, redis::RedisError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        backoff::retry(backoff, || {
            self.client.get_connection().map_err(|e| {
                error!("bus connection to {} failed: {e:?}, retrying...", self.url);
                backoff::Error::transient(e)
            })
        })
        .map_err(|e| match e {
            backoff::Error::Transient { err, .. } | backoff::Error::Permanent(err) => err,
        })
    }
}

#[async_trait]
impl ProvideBus for RedisBus {
    async fn publish(&self, channel: &str, task: &Task) -> Result<(), BusError> {
        debug!("publish task {} for file {} on {channel}", task.tid, task.did);
        let mut conn = self.conn().map_err(|e| BusError::Redis(e.to_string()))?;
        let _: () = conn
            .publish(channel, task)
            .map_err(|e| BusError::Redis(e.to_string()))?;
        Ok(())
    }
}
