use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{DeviceRegistry, ReadingStore, RollupStore};
use crate::error::StoreError;
use crate::models::{DailyRollup, Device, DevicePatch, Reading};

// ---

const DEVICE_COLUMNS: &str =
    "device_id, relay_state, auto_mode, temp_threshold_high, temp_threshold_low, last_seen";

const ROLLUP_COLUMNS: &str = "device_id, day AS date, avg_temperature, avg_humidity, \
     min_temperature, max_temperature, fan_runtime_minutes, reading_count";

/// PostgreSQL-backed store. Tables are created by [`crate::schema::create_schema`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    // ---
    async fn append(&self, reading: Reading) -> Result<Reading, StoreError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO readings (id, device_id, temperature, humidity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(reading.id)
        .bind(&reading.device_id)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(reading)
    }

    async fn query(
        &self,
        device_id: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        // ---
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, device_id, temperature, humidity, recorded_at AS "timestamp"
            FROM readings
            WHERE recorded_at >= $1
              AND recorded_at <= $2
              AND ($3::TEXT IS NULL OR device_id = $3)
            ORDER BY recorded_at, id
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl DeviceRegistry for PgStore {
    // ---
    async fn get_or_create(&self, defaults: Device) -> Result<Device, StoreError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO devices (
                device_id, relay_state, auto_mode,
                temp_threshold_high, temp_threshold_low, last_seen
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (device_id) DO NOTHING
            "#,
        )
        .bind(&defaults.device_id)
        .bind(defaults.relay_state)
        .bind(defaults.auto_mode)
        .bind(defaults.temp_threshold_high)
        .bind(defaults.temp_threshold_low)
        .bind(defaults.last_seen)
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = $1");
        let device = sqlx::query_as::<_, Device>(&sql)
            .bind(&defaults.device_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(device)
    }

    async fn update(&self, device_id: &str, patch: &DevicePatch) -> Result<(), StoreError> {
        // ---
        sqlx::query(
            r#"
            UPDATE devices SET
                relay_state         = COALESCE($2, relay_state),
                auto_mode           = COALESCE($3, auto_mode),
                temp_threshold_high = COALESCE($4, temp_threshold_high),
                temp_threshold_low  = COALESCE($5, temp_threshold_low),
                last_seen           = COALESCE($6, last_seen)
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .bind(patch.relay_state)
        .bind(patch.auto_mode)
        .bind(patch.temp_threshold_high)
        .bind(patch.temp_threshold_low)
        .bind(patch.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        // ---
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = $1");
        let device = sqlx::query_as::<_, Device>(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(device)
    }

    async fn list(&self) -> Result<Vec<Device>, StoreError> {
        // ---
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY device_id");
        let devices = sqlx::query_as::<_, Device>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(devices)
    }
}

#[async_trait]
impl RollupStore for PgStore {
    // ---
    async fn get_or_create(&self, defaults: DailyRollup) -> Result<DailyRollup, StoreError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO daily_rollups (
                device_id, day, avg_temperature, avg_humidity,
                min_temperature, max_temperature, fan_runtime_minutes, reading_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (device_id, day) DO NOTHING
            "#,
        )
        .bind(&defaults.device_id)
        .bind(defaults.date)
        .bind(defaults.avg_temperature)
        .bind(defaults.avg_humidity)
        .bind(defaults.min_temperature)
        .bind(defaults.max_temperature)
        .bind(defaults.fan_runtime_minutes)
        .bind(defaults.reading_count)
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {ROLLUP_COLUMNS} FROM daily_rollups WHERE device_id = $1 AND day = $2");
        let rollup = sqlx::query_as::<_, DailyRollup>(&sql)
            .bind(&defaults.device_id)
            .bind(defaults.date)
            .fetch_one(&self.pool)
            .await?;

        Ok(rollup)
    }

    async fn update(&self, rollup: &DailyRollup) -> Result<(), StoreError> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO daily_rollups (
                device_id, day, avg_temperature, avg_humidity,
                min_temperature, max_temperature, fan_runtime_minutes, reading_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (device_id, day) DO UPDATE SET
                avg_temperature     = EXCLUDED.avg_temperature,
                avg_humidity        = EXCLUDED.avg_humidity,
                min_temperature     = EXCLUDED.min_temperature,
                max_temperature     = EXCLUDED.max_temperature,
                fan_runtime_minutes = EXCLUDED.fan_runtime_minutes,
                reading_count       = EXCLUDED.reading_count
            "#,
        )
        .bind(&rollup.device_id)
        .bind(rollup.date)
        .bind(rollup.avg_temperature)
        .bind(rollup.avg_humidity)
        .bind(rollup.min_temperature)
        .bind(rollup.max_temperature)
        .bind(rollup.fan_runtime_minutes)
        .bind(rollup.reading_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        device_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyRollup>, StoreError> {
        // ---
        let sql = format!(
            "SELECT {ROLLUP_COLUMNS} FROM daily_rollups \
             WHERE day >= $1 AND ($2::TEXT IS NULL OR device_id = $2) \
             ORDER BY day DESC, device_id"
        );
        let rollups = sqlx::query_as::<_, DailyRollup>(&sql)
            .bind(since)
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rollups)
    }
}
