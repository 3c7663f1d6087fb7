//! Database schema management for the sensor ingest/delivery backend.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `devices` and `sensors` (the read-mostly catalog this service
/// only ever reads — created here so the core is runnable standalone) and
/// `sensor_readings` (owned by this service). Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(r#"CREATE EXTENSION IF NOT EXISTS pgcrypto;"#)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            code        TEXT NOT NULL,
            name        TEXT NOT NULL,
            is_active   BOOLEAN NOT NULL DEFAULT TRUE,
            description TEXT,
            location    TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            id        UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            device_id UUID NOT NULL REFERENCES devices (id),
            name      TEXT NOT NULL,
            unit      TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Core table the ingest path writes to and the worker advances.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            sensor_id       UUID NOT NULL,
            value           JSONB NOT NULL,
            event_timestamp TIMESTAMPTZ NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            retry_count     INTEGER NOT NULL DEFAULT 0,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_sensor_id
            ON sensor_readings (sensor_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_status
            ON sensor_readings (status);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensors_device_id
            ON sensors (device_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
