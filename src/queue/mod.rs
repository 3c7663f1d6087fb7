//! Work queue: a FIFO list of [`crate::models::QueueMessage`] payloads plus
//! a sibling dead-letter list, backed by Redis.
//!
//! Mirrors `services/queue/redis_queue.go`: `enqueue` is `LPUSH`,
//! `dequeue_blocking` is `BRPOP` with a timeout that returns `None` (not
//! an error) on an empty wait, `enqueue_dlq` is `LPUSH` into the sibling
//! list. The async Redis idiom (`redis::aio::ConnectionManager`) follows
//! a stream-worker reference implementation.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::error::QueueError;

#[cfg(test)]
pub mod fakes;

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append `payload` to the tail of the primary queue.
    async fn enqueue(&self, payload: Vec<u8>) -> Result<(), QueueError>;

    /// Wait up to `timeout` for a message from the head of the primary
    /// queue. Returns `Ok(None)` on timeout (not an error).
    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError>;

    /// Append `payload` to the tail of the dead letter queue.
    async fn enqueue_dlq(&self, payload: Vec<u8>) -> Result<(), QueueError>;

    /// Primary queue length (operator visibility).
    async fn len(&self) -> Result<u64, QueueError>;

    /// Dead letter queue length (operator visibility).
    async fn dlq_len(&self) -> Result<u64, QueueError>;
}

#[derive(Clone)]
pub struct RedisWorkQueue {
    conn: ConnectionManager,
    queue_name: String,
    dlq_name: String,
}

impl RedisWorkQueue {
    pub async fn connect(
        redis_url: &str,
        queue_name: impl Into<String>,
        dlq_name: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            queue_name: queue_name.into(),
            dlq_name: dlq_name.into(),
        })
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.queue_name, payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError> {
        let mut conn = self.conn.clone();
        let timeout_secs = timeout.as_secs_f64().max(0.0);
        let result: Option<(String, Vec<u8>)> = conn
            .brpop(&self.queue_name, timeout_secs)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(result.map(|(_, payload)| payload))
    }

    async fn enqueue_dlq(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.dlq_name, payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    async fn len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        conn.llen(&self.queue_name)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    async fn dlq_len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        conn.llen(&self.dlq_name)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }
}
