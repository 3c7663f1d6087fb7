//! Ingest path: validate → persist `pending` → enqueue. The one synchronous,
//! producer-facing operation in the pipeline.
//!
//! Mirrors `domain/sensorreadingdomain/sensor_reading_domain.go`'s `Ingest`:
//! resolve the sensor (404 on miss), build the reading, create it (store
//! write precedes enqueue so a queued message never outlives a
//! non-existent reading), then publish the queue message.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{IngestRequest, NewReading, QueueMessage, Reading, ReadingStatus};
use crate::queue::WorkQueue;
use crate::store::{CatalogStore, ReadingStore};

#[derive(Clone)]
pub struct IngestService {
    reading_store: Arc<dyn ReadingStore>,
    catalog_store: Arc<dyn CatalogStore>,
    queue: Arc<dyn WorkQueue>,
}

impl IngestService {
    pub fn new(
        reading_store: Arc<dyn ReadingStore>,
        catalog_store: Arc<dyn CatalogStore>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            reading_store,
            catalog_store,
            queue,
        }
    }

    /// Accept one reading: resolve its sensor, persist it `pending`, and
    /// enqueue a work item referencing it. Returns the persisted reading.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Reading, AppError> {
        // 1. Resolve the sensor; unknown sensor_id is the only validation
        //    failure this path has (the body itself is typed, so malformed
        //    JSON is rejected by the Axum extractor before we're called).
        self.catalog_store
            .get_sensor_by_id(request.sensor_id)
            .await
            .map_err(|_| AppError::NotFound("sensor not found".to_string()))?;

        // 2. Build and persist the reading as `pending`.
        let reading = self
            .reading_store
            .create(NewReading {
                sensor_id: request.sensor_id,
                value: request.value,
                event_timestamp: request.timestamp.unwrap_or_else(Utc::now),
                status: ReadingStatus::Pending,
            })
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        // 3. Publish a work item. The store write above already committed,
        //    so on enqueue failure the reading is left observably `pending`
        //    without a work item — an accepted gap (see module docs).
        let message = QueueMessage {
            reading_id: reading.id,
        };
        let bytes = serde_json::to_vec(&message)
            .map_err(|e| AppError::Storage(format!("failed to encode queue message: {e}")))?;
        self.queue
            .enqueue(bytes)
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        Ok(reading)
    }
}
