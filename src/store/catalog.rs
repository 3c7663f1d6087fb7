//! Catalog store: read-mostly lookup of sensors and devices. Owned by an
//! external collaborator (device/sensor management); this service never
//! writes to it.
//!
//! Mirrors `app/master-service/repository/{sensorrepo,devicerepo}`, both of
//! which expose only `GetByID`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::{Device, DeviceId, Sensor, SensorId};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_sensor_by_id(&self, id: SensorId) -> Result<Sensor, StoreError>;
    async fn get_device_by_id(&self, id: DeviceId) -> Result<Device, StoreError>;
}

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_sensor_by_id(&self, id: SensorId) -> Result<Sensor, StoreError> {
        sqlx::query_as::<_, Sensor>(
            r#"SELECT id, device_id, name, unit FROM sensors WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .ok_or(StoreError::NotFound)
    }

    async fn get_device_by_id(&self, id: DeviceId) -> Result<Device, StoreError> {
        sqlx::query_as::<_, Device>(
            r#"SELECT id, code, name, is_active, description, location FROM devices WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .ok_or(StoreError::NotFound)
    }
}
