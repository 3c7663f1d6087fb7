//! Reading store: persists readings, looks them up by id, and advances
//! their delivery status.
//!
//! Mirrors `app/master-service/repository/sensorreadingrepo`: `Create`
//! assigns identity and timestamps, `GetByID` surfaces not-found
//! distinctly, `IncrementRetryCount` is atomic and returns the
//! post-increment value.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::{NewReading, Reading, ReadingId, ReadingStatus};

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a new reading with `status = pending, retry_count = 0`
    /// (unless the caller supplies a different initial status). Assigns
    /// `id`, `created_at`, and `updated_at`.
    async fn create(&self, new: NewReading) -> Result<Reading, StoreError>;

    /// Look up a reading by id.
    async fn get_by_id(&self, id: ReadingId) -> Result<Reading, StoreError>;

    /// Set `status` and refresh `updated_at`. Idempotent: setting the same
    /// terminal status twice succeeds both times.
    async fn update_status(&self, id: ReadingId, status: ReadingStatus) -> Result<(), StoreError>;

    /// Atomically bump `retry_count` by one and return the post-increment
    /// value. The store is the sole source of truth for retry accounting,
    /// so this survives worker restarts.
    async fn increment_retry_count(&self, id: ReadingId) -> Result<i32, StoreError>;
}

pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn create(&self, new: NewReading) -> Result<Reading, StoreError> {
        let now = Utc::now();
        sqlx::query_as::<_, Reading>(
            r#"
            INSERT INTO sensor_readings
                (sensor_id, value, event_timestamp, status, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, $5, $5)
            RETURNING id, sensor_id, value, event_timestamp, status, retry_count, created_at, updated_at
            "#,
        )
        .bind(new.sensor_id)
        .bind(new.value)
        .bind(new.event_timestamp)
        .bind(new.status)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_by_id(&self, id: ReadingId) -> Result<Reading, StoreError> {
        sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, sensor_id, value, event_timestamp, status, retry_count, created_at, updated_at
            FROM sensor_readings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .ok_or(StoreError::NotFound)
    }

    async fn update_status(&self, id: ReadingId, status: ReadingStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sensor_readings
            SET status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn increment_retry_count(&self, id: ReadingId) -> Result<i32, StoreError> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE sensor_readings
            SET retry_count = retry_count + 1, updated_at = $2
            WHERE id = $1
            RETURNING retry_count
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .ok_or(StoreError::NotFound)
    }
}
