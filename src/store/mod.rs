//! Storage capabilities consumed by the engine.
//!
//! The engine never talks to a database directly; it is handed one
//! implementation of each trait at construction time. Two backends live here:
//! - [`PgStore`]: PostgreSQL via `sqlx`, used in production
//! - [`MemoryStore`]: process-local maps, used by tests and `STORE_BACKEND=memory`

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{DailyRollup, Device, DevicePatch, Reading};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

/// Append-only reading log.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    // ---
    async fn append(&self, reading: Reading) -> Result<Reading, StoreError>;

    /// Readings with `start <= timestamp <= end`, oldest first, optionally
    /// restricted to one device.
    async fn query(
        &self,
        device_id: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError>;
}

/// One record per device.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    // ---
    /// Return the stored device, inserting `defaults` if there is none.
    async fn get_or_create(&self, defaults: Device) -> Result<Device, StoreError>;

    async fn update(&self, device_id: &str, patch: &DevicePatch) -> Result<(), StoreError>;

    async fn get(&self, device_id: &str) -> Result<Option<Device>, StoreError>;

    async fn list(&self) -> Result<Vec<Device>, StoreError>;
}

/// One record per `(device_id, date)`.
#[async_trait]
pub trait RollupStore: Send + Sync {
    // ---
    /// Return the stored rollup for `defaults.device_id`/`defaults.date`,
    /// inserting `defaults` if there is none.
    async fn get_or_create(&self, defaults: DailyRollup) -> Result<DailyRollup, StoreError>;

    async fn update(&self, rollup: &DailyRollup) -> Result<(), StoreError>;

    /// Rollups dated `since` or later, newest first.
    async fn list(
        &self,
        device_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyRollup>, StoreError>;
}
