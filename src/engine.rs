//! Ingestion coordinator and read-side operations.
//!
//! [`Engine::ingest`] runs, strictly in order:
//! 1. persist the reading
//! 2. fetch-or-create the device
//! 3. evaluate the hysteresis policy, persist relay change and `last_seen`
//! 4. fetch-or-create the rollup for the reading's own local day
//! 5. aggregate and persist the rollup
//!
//! Nothing is rolled back. A failure after step 1 is reported as
//! [`Error::StoreUnavailable`] with the failing stage, while the reading stays
//! stored; the next successful ingestion for the device recomputes the day.
//!
//! Ingestions for the same device are serialised by a per-device async lock so
//! the rollup read-modify-write cannot lose fan runtime increments. Different
//! devices never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{debug, info, warn};

use crate::calendar::DayBounds;
use crate::control::{self, ControlDecision};
use crate::error::{Error, Result, Stage, StoreResultExt};
use crate::models::{DailyRollup, Device, DeviceCommand, DevicePatch, RawReading, Reading, RelayCommand};
use crate::rollup::{self, RollupStrategy};
use crate::series::{self, SeriesPoint, Window};
use crate::store::{DeviceRegistry, ReadingStore, RollupStore};

// ---

/// Behavioural knobs fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    // ---
    /// Offset defining local midnight and bucket alignment.
    pub utc_offset: FixedOffset,
    pub rollup_strategy: RollupStrategy,
}

impl EngineSettings {
    // ---
    pub fn with_offset(utc_offset: FixedOffset) -> Self {
        Self {
            utc_offset,
            rollup_strategy: RollupStrategy::default(),
        }
    }
}

pub struct Engine {
    // ---
    readings: Arc<dyn ReadingStore>,
    devices: Arc<dyn DeviceRegistry>,
    rollups: Arc<dyn RollupStore>,
    settings: EngineSettings,
    // Never pruned; one entry per device id ever ingested, so it grows with
    // the device population rather than with traffic.
    device_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    // ---
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        devices: Arc<dyn DeviceRegistry>,
        rollups: Arc<dyn RollupStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            readings,
            devices,
            rollups,
            settings,
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build an engine whose three collaborators are one backend.
    pub fn with_store<S>(store: Arc<S>, settings: EngineSettings) -> Self
    where
        S: ReadingStore + DeviceRegistry + RollupStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, settings)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn device_lock(&self, device_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        // ---
        let mut locks = self
            .device_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(device_id.to_string()).or_default().clone()
    }

    /// Ingest one reading. See the module docs for the step order.
    pub async fn ingest(&self, raw: RawReading) -> Result<Reading> {
        // ---
        let reading = raw.validate(Utc::now())?;

        let lock = self.device_lock(&reading.device_id);
        let _guard = lock.lock().await;

        // Step 1
        let reading = self.readings.append(reading).await.during(Stage::Reading)?;
        debug!(
            "Stored reading {} for {} ({} C, {} %)",
            reading.id, reading.device_id, reading.temperature, reading.humidity
        );

        if let Err(e) = self.apply_derived_state(&reading).await {
            warn!(
                "Reading {} for {} accepted but derived state is stale: {}",
                reading.id, reading.device_id, e
            );
            return Err(e);
        }

        Ok(reading)
    }

    /// Steps 2-5 of ingestion.
    async fn apply_derived_state(&self, reading: &Reading) -> Result<(Device, DailyRollup)> {
        // ---
        // Step 2
        let now = Utc::now();
        let mut device = self
            .devices
            .get_or_create(Device::with_defaults(&reading.device_id, now))
            .await
            .during(Stage::Device)?;

        // Step 3
        let decision = control::decide(reading, &device);
        let mut patch = DevicePatch {
            last_seen: Some(now),
            ..Default::default()
        };
        if decision.changed {
            info!(
                "Relay for {} switched {} at {} C (low={}, high={})",
                device.device_id,
                if decision.relay_state { "on" } else { "off" },
                reading.temperature,
                device.temp_threshold_low,
                device.temp_threshold_high
            );
            patch.relay_state = Some(decision.relay_state);
        }
        self.devices
            .update(&device.device_id, &patch)
            .await
            .during(Stage::Device)?;
        patch.apply(&mut device);

        // Step 4
        let day = DayBounds::containing(reading.timestamp, &self.settings.utc_offset)
            .ok_or_else(|| Error::Validation(format!("timestamp {} is out of range", reading.timestamp)))?;
        let existing = self
            .rollups
            .get_or_create(DailyRollup::seeded(reading, day.start))
            .await
            .during(Stage::Rollup)?;

        // Step 5
        let rollup = match self.settings.rollup_strategy {
            RollupStrategy::Recompute => {
                let day_readings = self
                    .readings
                    .query(Some(&reading.device_id), day.start, day.end)
                    .await
                    .during(Stage::Rollup)?;
                rollup::recompute(Some(existing), &day, &day_readings, reading, decision.relay_state)
            }
            RollupStrategy::Incremental => {
                rollup::accumulate(Some(existing), &day, reading, decision.relay_state)
            }
        };
        self.rollups.update(&rollup).await.during(Stage::Rollup)?;
        debug!(
            "Rollup {} {}: avg={:.2} min={} max={} fan={} n={}",
            rollup.device_id,
            rollup.date,
            rollup.avg_temperature,
            rollup.min_temperature,
            rollup.max_temperature,
            rollup.fan_runtime_minutes,
            rollup.reading_count
        );

        Ok((device, rollup))
    }

    /// Gap-filled series for `window` ending now.
    pub async fn build_series(&self, window: Window, device_id: Option<&str>) -> Result<Vec<SeriesPoint>> {
        self.build_series_at(window, device_id, Utc::now()).await
    }

    /// Gap-filled series for `window` ending at `now`.
    pub async fn build_series_at(
        &self,
        window: Window,
        device_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeriesPoint>> {
        // ---
        let offset = &self.settings.utc_offset;
        let start = window
            .first_bucket_start(now, offset)
            .ok_or_else(|| Error::Validation(format!("series end {now} is out of range")))?;
        let readings = self
            .readings
            .query(device_id, start, now)
            .await
            .during(Stage::Query)?;

        debug!(
            "Series {} for {}: {} readings since {}",
            window,
            device_id.unwrap_or("all devices"),
            readings.len(),
            start
        );
        series::bucketize(window, &readings, now, offset)
    }

    /// Evaluate the control policy for a device without persisting anything.
    pub async fn decide_control(&self, device_id: &str, temperature: f64) -> Result<ControlDecision> {
        // ---
        if !temperature.is_finite() {
            return Err(Error::Validation(format!(
                "temperature must be finite, got {temperature}"
            )));
        }
        let device = self.device(device_id).await?;
        Ok(control::decide_for_temperature(temperature, &device))
    }

    pub async fn device(&self, device_id: &str) -> Result<Device> {
        // ---
        self.devices
            .get(device_id)
            .await
            .during(Stage::Query)?
            .ok_or_else(|| Error::NotFound(device_id.to_string()))
    }

    pub async fn devices(&self) -> Result<Vec<Device>> {
        self.devices.list().await.during(Stage::Query)
    }

    pub async fn device_command(&self, device_id: &str) -> Result<DeviceCommand> {
        let device = self.device(device_id).await?;
        Ok(DeviceCommand::from(&device))
    }

    /// Apply a manual control request to an existing device.
    pub async fn configure_device(&self, device_id: &str, command: &RelayCommand) -> Result<Device> {
        // ---
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;

        let mut device = self.device(device_id).await?;
        let patch = command.to_patch(&device)?;
        if patch.is_empty() {
            return Ok(device);
        }

        self.devices
            .update(device_id, &patch)
            .await
            .during(Stage::Device)?;
        patch.apply(&mut device);

        if device.temp_threshold_low > device.temp_threshold_high {
            warn!(
                "Device {} has inverted thresholds (low={} > high={}); relay may never turn off",
                device_id, device.temp_threshold_low, device.temp_threshold_high
            );
        }
        info!("Device {} updated: {:?}", device_id, patch);
        Ok(device)
    }

    /// Rollups from local midnight `days` days ago onward, newest first.
    pub async fn daily_rollups(&self, device_id: Option<&str>, days: u32) -> Result<Vec<DailyRollup>> {
        // ---
        let today = DayBounds::containing(Utc::now(), &self.settings.utc_offset)
            .ok_or_else(|| Error::Validation("current day is out of range".to_string()))?;
        let since = Duration::try_days(i64::from(days))
            .and_then(|back| today.start.checked_sub_signed(back))
            .ok_or_else(|| Error::Validation(format!("days out of range: {days}")))?;
        self.rollups.list(device_id, since).await.during(Stage::Query)
    }
}
