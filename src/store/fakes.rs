//! In-memory fakes for [`ReadingStore`] and [`CatalogStore`], used by unit
//! tests across the crate (notably [`crate::worker`]) so they don't require
//! a live Postgres instance.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::catalog::CatalogStore;
use super::reading::ReadingStore;
use crate::error::StoreError;
use crate::models::{Device, DeviceId, NewReading, Reading, ReadingId, ReadingStatus, Sensor, SensorId};

#[derive(Default)]
pub struct FakeReadingStore {
    pub readings: Mutex<HashMap<ReadingId, Reading>>,
}

#[async_trait]
impl ReadingStore for FakeReadingStore {
    async fn create(&self, new: NewReading) -> Result<Reading, StoreError> {
        let now = Utc::now();
        let reading = Reading {
            id: Uuid::new_v4(),
            sensor_id: new.sensor_id,
            value: new.value,
            event_timestamp: new.event_timestamp,
            status: new.status,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.readings
            .lock()
            .unwrap()
            .insert(reading.id, reading.clone());
        Ok(reading)
    }

    async fn get_by_id(&self, id: ReadingId) -> Result<Reading, StoreError> {
        self.readings
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_status(&self, id: ReadingId, status: ReadingStatus) -> Result<(), StoreError> {
        let mut map = self.readings.lock().unwrap();
        let reading = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        reading.status = status;
        reading.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_retry_count(&self, id: ReadingId) -> Result<i32, StoreError> {
        let mut map = self.readings.lock().unwrap();
        let reading = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        reading.retry_count += 1;
        reading.updated_at = Utc::now();
        Ok(reading.retry_count)
    }
}

#[derive(Default)]
pub struct FakeCatalogStore {
    pub sensors: Mutex<HashMap<SensorId, Sensor>>,
    pub devices: Mutex<HashMap<DeviceId, Device>>,
}

impl FakeCatalogStore {
    pub fn with_sensor_and_device(sensor: Sensor, device: Device) -> Self {
        let store = Self::default();
        store.sensors.lock().unwrap().insert(sensor.id, sensor);
        store.devices.lock().unwrap().insert(device.id, device);
        store
    }
}

#[async_trait]
impl CatalogStore for FakeCatalogStore {
    async fn get_sensor_by_id(&self, id: SensorId) -> Result<Sensor, StoreError> {
        self.sensors
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_device_by_id(&self, id: DeviceId) -> Result<Device, StoreError> {
        self.devices
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}
