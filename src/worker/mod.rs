//! Delivery worker: the background consumer that drives `pending` readings
//! to a terminal state via bounded, exponential-backoff retries.
//!
//! Mirrors `app/master-service/service/queue_consumer.go` step for step: a
//! 1-tick-per-second polling loop that owns the blocking dequeue, hydrates
//! the reading with its sensor and device,
//! POSTs it downstream, and on failure either re-enqueues after a backoff
//! (scheduled as a detached task, never blocking the poll loop) or — once
//! `retry_count >= max_retries` — marks the reading `failed` and pushes the
//! raw message onto the dead letter queue.
//!
//! State machine:
//! ```text
//! pending --delivery 2xx--------------> success        (terminal)
//! pending --delivery failure, n<max---> pending         (retry_count bumped, re-enqueued after backoff)
//! pending --delivery failure, n>=max--> failed          (terminal; DLQ receives the raw message)
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::models::{HydratedReading, QueueMessage, ReadingId, ReadingStatus};
use crate::queue::WorkQueue;
use crate::store::{CatalogStore, ReadingStore};

/// Configuration the worker needs, trimmed from [`crate::config::Config`]
/// so the worker doesn't depend on unrelated ingest-only fields.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_retries: u32,
    pub retry_backoff_base: u32,
    pub dequeue_poll_interval: Duration,
    pub dequeue_block_timeout: Duration,
    pub http_timeout: Duration,
    pub downstream_url: String,
    pub downstream_api_key_header: String,
    pub downstream_api_key: String,
}

impl From<&crate::config::Config> for WorkerConfig {
    fn from(cfg: &crate::config::Config) -> Self {
        Self {
            max_retries: cfg.max_retries,
            retry_backoff_base: cfg.retry_backoff_base,
            dequeue_poll_interval: cfg.dequeue_poll_interval,
            dequeue_block_timeout: cfg.dequeue_block_timeout,
            http_timeout: cfg.http_timeout,
            downstream_url: format!("{}/receive", cfg.downstream_base_url()),
            downstream_api_key_header: cfg.downstream_api_key_header.clone(),
            downstream_api_key: cfg.server_secret_key.clone(),
        }
    }
}

pub struct DeliveryWorker {
    reading_store: Arc<dyn ReadingStore>,
    catalog_store: Arc<dyn CatalogStore>,
    queue: Arc<dyn WorkQueue>,
    http_client: Client,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl DeliveryWorker {
    pub fn new(
        reading_store: Arc<dyn ReadingStore>,
        catalog_store: Arc<dyn CatalogStore>,
        queue: Arc<dyn WorkQueue>,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> anyhow::Result<Arc<Self>> {
        let http_client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Arc::new(Self {
            reading_store,
            catalog_store,
            queue,
            http_client,
            config,
            cancel,
        }))
    }

    /// Poll-dequeue-process loop. Never sleeps for the retry backoff itself
    /// — that happens in a detached task spawned from [`Self::fail`] — so
    /// the loop keeps consuming new work while backoffs elapse in the
    /// background.
    pub async fn run(self: Arc<Self>) {
        tracing::info!("delivery worker starting");
        let mut ticker = tokio::time::interval(self.config.dequeue_poll_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("delivery worker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(self: &Arc<Self>) {
        let msg = tokio::select! {
            _ = self.cancel.cancelled() => return,
            res = self.queue.dequeue_blocking(self.config.dequeue_block_timeout) => res,
        };
        match msg {
            Ok(Some(bytes)) => self.clone().process(bytes).await,
            Ok(None) => {}
            Err(e) => tracing::warn!("queue error while dequeuing: {e}"),
        }
    }

    /// Process one raw queue payload end to end.
    async fn process(self: Arc<Self>, raw: Vec<u8>) {
        let msg: QueueMessage = match serde_json::from_slice(&raw) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("dropping unparseable queue message: {e}");
                return;
            }
        };

        let reading = match self.reading_store.get_by_id(msg.reading_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(reading_id = %msg.reading_id, "dropping message for unknown reading: {e}");
                return;
            }
        };

        let hydrated = match self.hydrate(reading.clone()).await {
            Ok(h) => h,
            Err(e) => {
                // Orphaned reading policy: a missing sensor/device is a
                // permanent delivery failure for this reading, subject to
                // the same retry/DLQ accounting as any other failure.
                tracing::warn!(reading_id = %reading.id, "hydration failed, treating as delivery failure: {e}");
                self.fail(reading.id, raw).await;
                return;
            }
        };

        let delivered = self.deliver(&hydrated).await;

        if delivered {
            if let Err(e) = self
                .reading_store
                .update_status(reading.id, ReadingStatus::Success)
                .await
            {
                tracing::error!(reading_id = %reading.id, "failed to mark reading success: {e}");
            } else {
                tracing::info!(reading_id = %reading.id, "delivered reading downstream");
            }
        } else {
            self.fail(reading.id, raw).await;
        }
    }

    /// Join a reading with its sensor and device. Resolution is a DAG:
    /// `Reading.sensor_id -> Sensor -> Sensor.device_id -> Device`.
    async fn hydrate(&self, reading: crate::models::Reading) -> anyhow::Result<HydratedReading> {
        let sensor = self
            .catalog_store
            .get_sensor_by_id(reading.sensor_id)
            .await
            .map_err(|e| anyhow::anyhow!("sensor lookup failed: {e}"))?;
        let device = self
            .catalog_store
            .get_device_by_id(sensor.device_id)
            .await
            .map_err(|e| anyhow::anyhow!("device lookup failed: {e}"))?;
        Ok(HydratedReading::new(reading, sensor, device))
    }

    /// POST the hydrated payload downstream. `true` iff the response status
    /// is in `[200, 300)`; any transport error or non-2xx is a failure.
    async fn deliver(&self, payload: &HydratedReading) -> bool {
        let result = self
            .http_client
            .post(&self.config.downstream_url)
            .header("Content-Type", "application/json")
            .header(
                self.config.downstream_api_key_header.as_str(),
                self.config.downstream_api_key.as_str(),
            )
            .json(payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(
                    reading_id = %payload.id,
                    status = %resp.status(),
                    "downstream receiver returned non-2xx"
                );
                false
            }
            Err(e) => {
                tracing::warn!(reading_id = %payload.id, "downstream delivery failed: {e}");
                false
            }
        }
    }

    /// Record a delivery failure: bump `retry_count`, and either terminal-fail
    /// the reading onto the DLQ or schedule a backoff re-enqueue.
    async fn fail(self: &Arc<Self>, reading_id: ReadingId, raw: Vec<u8>) {
        let n = match self.reading_store.increment_retry_count(reading_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(reading_id = %reading_id, "failed to increment retry count: {e}");
                return;
            }
        };

        if n >= self.config.max_retries as i32 {
            if let Err(e) = self
                .reading_store
                .update_status(reading_id, ReadingStatus::Failed)
                .await
            {
                tracing::error!(reading_id = %reading_id, "failed to mark reading failed: {e}");
            }
            if let Err(e) = self.queue.enqueue_dlq(raw).await {
                tracing::error!(reading_id = %reading_id, "failed to enqueue to DLQ: {e}");
            } else {
                tracing::info!(reading_id = %reading_id, retries = n, "reading moved to dead letter queue");
            }
            return;
        }

        let delay_secs = (self.config.retry_backoff_base as u64).saturating_pow(n as u32);
        let delay = Duration::from_secs(delay_secs);
        tracing::info!(reading_id = %reading_id, attempt = n, max = self.config.max_retries, delay_secs, "scheduling retry");

        let worker = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(reading_id = %reading_id, "cancelled before backoff elapsed, not re-enqueuing");
                }
                _ = tokio::time::sleep(delay) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    if let Err(e) = worker.queue.enqueue(raw).await {
                        tracing::error!(reading_id = %reading_id, "failed to re-enqueue after backoff: {e}");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Device, NewReading, Sensor};
    use crate::queue::fakes::FakeWorkQueue;
    use crate::store::fakes::{FakeCatalogStore, FakeReadingStore};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn worker_config(downstream_url: String) -> WorkerConfig {
        WorkerConfig {
            max_retries: 3,
            retry_backoff_base: 1,
            dequeue_poll_interval: Duration::from_millis(10),
            dequeue_block_timeout: Duration::from_millis(10),
            http_timeout: Duration::from_secs(5),
            downstream_url,
            downstream_api_key_header: "X-API-Key".to_string(),
            downstream_api_key: "secret".to_string(),
        }
    }

    fn sensor_and_device() -> (Sensor, Device) {
        let device_id = Uuid::new_v4();
        let sensor_id = Uuid::new_v4();
        (
            Sensor {
                id: sensor_id,
                device_id,
                name: "temp-1".to_string(),
                unit: "C".to_string(),
            },
            Device {
                id: device_id,
                code: "dev-1".to_string(),
                name: "Device 1".to_string(),
                is_active: true,
                description: None,
                location: None,
            },
        )
    }

    async fn setup(
        downstream_url: String,
    ) -> (
        Arc<DeliveryWorker>,
        Arc<FakeReadingStore>,
        Arc<FakeWorkQueue>,
        Sensor,
    ) {
        let (sensor, device) = sensor_and_device();
        let catalog = Arc::new(FakeCatalogStore::with_sensor_and_device(
            sensor.clone(),
            device,
        ));
        let reading_store = Arc::new(FakeReadingStore::default());
        let queue = Arc::new(FakeWorkQueue::default());
        let cancel = CancellationToken::new();
        let worker = DeliveryWorker::new(
            reading_store.clone(),
            catalog,
            queue.clone(),
            worker_config(downstream_url),
            cancel,
        )
        .unwrap();
        (worker, reading_store, queue, sensor)
    }

    #[tokio::test]
    async fn successful_delivery_marks_reading_success() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/receive"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        let (worker, reading_store, queue, sensor) =
            setup(format!("{}/receive", mock.uri())).await;

        let reading = reading_store
            .create(NewReading {
                sensor_id: sensor.id,
                value: serde_json::json!(42),
                event_timestamp: Utc::now(),
                status: ReadingStatus::Pending,
            })
            .await
            .unwrap();
        let raw = serde_json::to_vec(&QueueMessage {
            reading_id: reading.id,
        })
        .unwrap();

        worker.clone().process(raw).await;

        let got = reading_store.get_by_id(reading.id).await.unwrap();
        assert_eq!(got.status, ReadingStatus::Success);
        assert_eq!(got.retry_count, 0);
        assert_eq!(queue.dlq_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exhausted_retries_move_reading_to_dlq() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/receive"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let (worker, reading_store, queue, sensor) =
            setup(format!("{}/receive", mock.uri())).await;

        let reading = reading_store
            .create(NewReading {
                sensor_id: sensor.id,
                value: serde_json::json!(1),
                event_timestamp: Utc::now(),
                status: ReadingStatus::Pending,
            })
            .await
            .unwrap();
        let raw = serde_json::to_vec(&QueueMessage {
            reading_id: reading.id,
        })
        .unwrap();

        // max_retries = 3: three failing attempts terminal-fail the reading.
        for _ in 0..3 {
            worker.clone().process(raw.clone()).await;
        }

        let got = reading_store.get_by_id(reading.id).await.unwrap();
        assert_eq!(got.status, ReadingStatus::Failed);
        assert_eq!(got.retry_count, 3);
        assert_eq!(queue.dlq_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn orphaned_reading_is_treated_as_delivery_failure() {
        let reading_store = Arc::new(FakeReadingStore::default());
        let catalog = Arc::new(FakeCatalogStore::default()); // empty: sensor unresolved
        let queue = Arc::new(FakeWorkQueue::default());
        let cancel = CancellationToken::new();
        let worker = DeliveryWorker::new(
            reading_store.clone(),
            catalog,
            queue.clone(),
            worker_config("http://127.0.0.1:1/receive".to_string()),
            cancel,
        )
        .unwrap();

        let reading = reading_store
            .create(NewReading {
                sensor_id: Uuid::new_v4(), // no matching sensor in the catalog
                value: serde_json::json!(1),
                event_timestamp: Utc::now(),
                status: ReadingStatus::Pending,
            })
            .await
            .unwrap();
        let raw = serde_json::to_vec(&QueueMessage {
            reading_id: reading.id,
        })
        .unwrap();

        worker.clone().process(raw).await;

        let got = reading_store.get_by_id(reading.id).await.unwrap();
        assert_eq!(got.retry_count, 1);
        assert_eq!(got.status, ReadingStatus::Pending);
    }

    #[tokio::test]
    async fn unparseable_message_is_dropped_without_touching_the_store() {
        let (worker, reading_store, _queue, _sensor) = setup("http://127.0.0.1:1/receive".to_string()).await;
        worker.clone().process(b"not json".to_vec()).await;
        assert!(reading_store.readings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn max_retries_zero_fails_on_first_error() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/receive"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;

        let (sensor, device) = sensor_and_device();
        let catalog = Arc::new(FakeCatalogStore::with_sensor_and_device(
            sensor.clone(),
            device,
        ));
        let reading_store = Arc::new(FakeReadingStore::default());
        let queue = Arc::new(FakeWorkQueue::default());
        let mut cfg = worker_config(format!("{}/receive", mock.uri()));
        cfg.max_retries = 0;
        let worker = DeliveryWorker::new(
            reading_store.clone(),
            catalog,
            queue.clone(),
            cfg,
            CancellationToken::new(),
        )
        .unwrap();

        let reading = reading_store
            .create(NewReading {
                sensor_id: sensor.id,
                value: serde_json::json!(1),
                event_timestamp: Utc::now(),
                status: ReadingStatus::Pending,
            })
            .await
            .unwrap();
        let raw = serde_json::to_vec(&QueueMessage {
            reading_id: reading.id,
        })
        .unwrap();

        worker.process(raw).await;

        let got = reading_store.get_by_id(reading.id).await.unwrap();
        assert_eq!(got.status, ReadingStatus::Failed);
        assert_eq!(got.retry_count, 1);
        assert_eq!(queue.dlq_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success_retains_retry_count() {
        let mock = MockServer::start().await;
        let attempt = Arc::new(AtomicUsize::new(0));
        // First two attempts fail, third succeeds; wiremock doesn't do
        // stateful sequencing out of the box, so we drive this manually by
        // calling process() with a server that always fails for the first
        // two calls then flipping the mock's response.
        Mock::given(method("POST"))
            .and(path("/receive"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock)
            .await;
        Mock::given(method("POST"))
            .and(path("/receive"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;
        let _ = &attempt;

        let (worker, reading_store, queue, sensor) =
            setup(format!("{}/receive", mock.uri())).await;

        let reading = reading_store
            .create(NewReading {
                sensor_id: sensor.id,
                value: serde_json::json!(7),
                event_timestamp: Utc::now(),
                status: ReadingStatus::Pending,
            })
            .await
            .unwrap();
        let raw = serde_json::to_vec(&QueueMessage {
            reading_id: reading.id,
        })
        .unwrap();

        worker.clone().process(raw.clone()).await;
        worker.clone().process(raw.clone()).await;
        worker.clone().process(raw).await;

        let got = reading_store.get_by_id(reading.id).await.unwrap();
        assert_eq!(got.status, ReadingStatus::Success);
        assert_eq!(got.retry_count, 2);
        assert_eq!(queue.dlq_len().await.unwrap(), 0);
    }
}
