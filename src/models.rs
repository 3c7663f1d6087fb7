//! Core data model: readings, sensors, devices, and the queue envelope that
//! ties them together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

pub type ReadingId = Uuid;
pub type SensorId = Uuid;
pub type DeviceId = Uuid;

/// Lifecycle status of a [`Reading`]. `Pending` is the only non-terminal
/// state; `Success` and `Failed` are terminal (see [`crate::worker`] for the
/// state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Pending,
    Success,
    Failed,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Pending => "pending",
            ReadingStatus::Success => "success",
            ReadingStatus::Failed => "failed",
        }
    }
}

/// A single measurement accepted by the ingest path. Never deleted by this
/// service; only transitions between [`ReadingStatus`] values.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub id: ReadingId,
    pub sensor_id: SensorId,
    pub value: serde_json::Value,
    pub event_timestamp: DateTime<Utc>,
    pub status: ReadingStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the caller supplies when creating a reading; the store assigns
/// `id`, `created_at`, and `updated_at`.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub sensor_id: SensorId,
    pub value: serde_json::Value,
    pub event_timestamp: DateTime<Utc>,
    pub status: ReadingStatus,
}

/// A managed sensor, attached to exactly one device. Owned by the external
/// catalog management; this service only ever reads it.
///
/// Serializes with `device_id` included in the downstream payload's sensor
/// sub-object, matching the full-sensor shape `sendToClient` sends rather
/// than a trimmed `{id, name, unit}` view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sensor {
    pub id: SensorId,
    pub device_id: DeviceId,
    pub name: String,
    pub unit: String,
}

/// A managed IoT device. Owned by the external catalog management; this
/// service only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: DeviceId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// Queue payload: a pointer to the reading that needs delivery. No payload
/// duplication — the reading store is the source of truth for content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub reading_id: ReadingId,
}

/// Producer-facing ingest request body: `POST /sensors`.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub sensor_id: SensorId,
    pub value: serde_json::Value,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Hydrated payload sent to the downstream receiver: the reading flattened
/// alongside its device and sensor.
#[derive(Debug, Clone, Serialize)]
pub struct HydratedReading {
    pub id: ReadingId,
    pub sensor_id: SensorId,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub status: ReadingStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub device: Device,
    pub sensor: Sensor,
}

impl HydratedReading {
    pub fn new(reading: Reading, sensor: Sensor, device: Device) -> Self {
        Self {
            id: reading.id,
            sensor_id: reading.sensor_id,
            value: reading.value,
            timestamp: reading.event_timestamp,
            status: reading.status,
            retry_count: reading.retry_count,
            created_at: reading.created_at,
            updated_at: reading.updated_at,
            device,
            sensor,
        }
    }
}
