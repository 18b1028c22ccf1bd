//! Database schema management for `codemetal-fanflow`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when the PostgreSQL backend is used.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `readings` (append-only samples), `devices` (one row per device)
/// and `daily_rollups` (one row per device per local day). Safe to call on
/// every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id           UUID             PRIMARY KEY,
            device_id    TEXT             NOT NULL,
            temperature  DOUBLE PRECISION NOT NULL,
            humidity     DOUBLE PRECISION NOT NULL,
            recorded_at  TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id            TEXT             PRIMARY KEY,
            relay_state          BOOLEAN          NOT NULL DEFAULT FALSE,
            auto_mode            BOOLEAN          NOT NULL DEFAULT TRUE,
            temp_threshold_high  DOUBLE PRECISION NOT NULL DEFAULT 28.0,
            temp_threshold_low   DOUBLE PRECISION NOT NULL DEFAULT 24.0,
            last_seen            TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // `day` is the UTC instant of the local midnight opening the day
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_rollups (
            device_id            TEXT             NOT NULL,
            day                  TIMESTAMPTZ      NOT NULL,
            avg_temperature      DOUBLE PRECISION NOT NULL,
            avg_humidity         DOUBLE PRECISION NOT NULL,
            min_temperature      DOUBLE PRECISION NOT NULL,
            max_temperature      DOUBLE PRECISION NOT NULL,
            fan_runtime_minutes  INTEGER          NOT NULL DEFAULT 0,
            reading_count        BIGINT           NOT NULL DEFAULT 0,
            PRIMARY KEY (device_id, day)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Range scans by device and time (rollup recompute, series)
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_device_time
            ON readings (device_id, recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Series over all devices
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_time
            ON readings (recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
