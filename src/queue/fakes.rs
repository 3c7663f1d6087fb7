//! In-memory [`WorkQueue`] fake used by unit tests (see
//! [`crate::worker::tests`]) so they don't require a live Redis instance.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::WorkQueue;
use crate::error::QueueError;

#[derive(Default)]
pub struct FakeWorkQueue {
    pub primary: Mutex<VecDeque<Vec<u8>>>,
    pub dlq: Mutex<VecDeque<Vec<u8>>>,
}

#[async_trait]
impl WorkQueue for FakeWorkQueue {
    async fn enqueue(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        self.primary.lock().unwrap().push_back(payload);
        Ok(())
    }

    async fn dequeue_blocking(&self, _timeout: Duration) -> Result<Option<Vec<u8>>, QueueError> {
        Ok(self.primary.lock().unwrap().pop_front())
    }

    async fn enqueue_dlq(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        self.dlq.lock().unwrap().push_back(payload);
        Ok(())
    }

    async fn len(&self) -> Result<u64, QueueError> {
        Ok(self.primary.lock().unwrap().len() as u64)
    }

    async fn dlq_len(&self) -> Result<u64, QueueError> {
        Ok(self.dlq.lock().unwrap().len() as u64)
    }
}
