use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{DeviceRegistry, ReadingStore, RollupStore};
use crate::error::StoreError;
use crate::models::{DailyRollup, Device, DevicePatch, Reading};

// ---

#[derive(Debug, Default)]
struct Tables {
    // ---
    readings: Vec<Reading>,
    devices: BTreeMap<String, Device>,
    rollups: BTreeMap<(String, DateTime<Utc>), DailyRollup>,
}

/// In-process store backed by ordered maps behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    // ---
    async fn append(&self, reading: Reading) -> Result<Reading, StoreError> {
        self.tables.write().await.readings.push(reading.clone());
        Ok(reading)
    }

    async fn query(
        &self,
        device_id: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        // ---
        let tables = self.tables.read().await;
        let mut out: Vec<Reading> = tables
            .readings
            .iter()
            .filter(|r| device_id.map_or(true, |id| r.device_id == id))
            .filter(|r| start <= r.timestamp && r.timestamp <= end)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.timestamp);
        Ok(out)
    }
}

#[async_trait]
impl DeviceRegistry for MemoryStore {
    // ---
    async fn get_or_create(&self, defaults: Device) -> Result<Device, StoreError> {
        let mut tables = self.tables.write().await;
        let device = tables
            .devices
            .entry(defaults.device_id.clone())
            .or_insert(defaults);
        Ok(device.clone())
    }

    async fn update(&self, device_id: &str, patch: &DevicePatch) -> Result<(), StoreError> {
        // ---
        if let Some(device) = self.tables.write().await.devices.get_mut(device_id) {
            patch.apply(device);
        }
        Ok(())
    }

    async fn get(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        Ok(self.tables.read().await.devices.get(device_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Device>, StoreError> {
        Ok(self.tables.read().await.devices.values().cloned().collect())
    }
}

#[async_trait]
impl RollupStore for MemoryStore {
    // ---
    async fn get_or_create(&self, defaults: DailyRollup) -> Result<DailyRollup, StoreError> {
        let mut tables = self.tables.write().await;
        let key = (defaults.device_id.clone(), defaults.date);
        Ok(tables.rollups.entry(key).or_insert(defaults).clone())
    }

    async fn update(&self, rollup: &DailyRollup) -> Result<(), StoreError> {
        // ---
        let key = (rollup.device_id.clone(), rollup.date);
        self.tables.write().await.rollups.insert(key, rollup.clone());
        Ok(())
    }

    async fn list(
        &self,
        device_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyRollup>, StoreError> {
        // ---
        let tables = self.tables.read().await;
        let mut out: Vec<DailyRollup> = tables
            .rollups
            .values()
            .filter(|r| device_id.map_or(true, |id| r.device_id == id))
            .filter(|r| r.date >= since)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.device_id.cmp(&b.device_id)));
        Ok(out)
    }
}
