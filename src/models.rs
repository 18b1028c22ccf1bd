//! Typed records shared by the engine, the stores and the HTTP adapter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---

/// Upper threshold given to devices created on their first reading.
pub const DEFAULT_TEMP_THRESHOLD_HIGH: f64 = 28.0;

/// Lower threshold given to devices created on their first reading.
pub const DEFAULT_TEMP_THRESHOLD_LOW: f64 = 24.0;

/// Inbound sensor sample, as received from a device
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReading {
    // ---
    pub device_id: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Validated, immutable sensor sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub timestamp: DateTime<Utc>,
}

impl RawReading {
    // ---
    pub fn new(device_id: &str, temperature: f64, humidity: f64) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            temperature: Some(temperature),
            humidity: Some(humidity),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check every field and stamp the reading with `now` if it carries no
    /// timestamp of its own.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Reading> {
        // ---
        let device_id = self
            .device_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Validation("device_id is required".into()))?;

        let temperature = finite("temperature", self.temperature)?;
        let humidity = finite("humidity", self.humidity)?;
        let timestamp = representable(self.timestamp.unwrap_or(now))?;

        Ok(Reading {
            id: Uuid::new_v4(),
            device_id,
            temperature,
            humidity,
            timestamp,
        })
    }
}

/// Reject instants whose local day (under any offset) cannot be represented.
fn representable(ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    // ---
    let margin = Duration::days(2);
    match (ts.checked_sub_signed(margin), ts.checked_add_signed(margin)) {
        (Some(_), Some(_)) => Ok(ts),
        _ => Err(Error::Validation(format!("timestamp {ts} is out of range"))),
    }
}

fn finite(field: &str, value: Option<f64>) -> Result<f64> {
    // ---
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(Error::Validation(format!("{field} must be finite, got {v}"))),
        None => Err(Error::Validation(format!("{field} is required"))),
    }
}

/// Control and configuration record for one physical unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    // ---
    pub device_id: String,
    pub relay_state: bool,
    pub auto_mode: bool,
    pub temp_threshold_high: f64,
    pub temp_threshold_low: f64,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Record for a device seen for the first time.
    pub fn with_defaults(device_id: &str, seen_at: DateTime<Utc>) -> Self {
        // ---
        Self {
            device_id: device_id.to_string(),
            relay_state: false,
            auto_mode: true,
            temp_threshold_high: DEFAULT_TEMP_THRESHOLD_HIGH,
            temp_threshold_low: DEFAULT_TEMP_THRESHOLD_LOW,
            last_seen: seen_at,
        }
    }
}

/// Partial update of a [`Device`]; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
    // ---
    pub relay_state: Option<bool>,
    pub auto_mode: Option<bool>,
    pub temp_threshold_high: Option<f64>,
    pub temp_threshold_low: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DevicePatch {
    // ---
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, device: &mut Device) {
        // ---
        if let Some(v) = self.relay_state {
            device.relay_state = v;
        }
        if let Some(v) = self.auto_mode {
            device.auto_mode = v;
        }
        if let Some(v) = self.temp_threshold_high {
            device.temp_threshold_high = v;
        }
        if let Some(v) = self.temp_threshold_low {
            device.temp_threshold_low = v;
        }
        if let Some(v) = self.last_seen {
            device.last_seen = v;
        }
    }
}

/// Manual control request for a device.
///
/// `state` only takes effect while the device is in manual mode; the other
/// fields are always applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayCommand {
    // ---
    pub state: Option<bool>,
    pub auto_mode: Option<bool>,
    pub temp_threshold_high: Option<f64>,
    pub temp_threshold_low: Option<f64>,
}

impl RelayCommand {
    /// Translate into a patch against the device's current state.
    ///
    /// Inverted thresholds (`low > high`) are accepted; non-finite ones are not.
    pub fn to_patch(&self, current: &Device) -> Result<DevicePatch> {
        // ---
        for (name, value) in [
            ("temp_threshold_high", self.temp_threshold_high),
            ("temp_threshold_low", self.temp_threshold_low),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::Validation(format!("{name} must be finite, got {v}")));
                }
            }
        }

        Ok(DevicePatch {
            relay_state: self.state.filter(|_| !current.auto_mode),
            auto_mode: self.auto_mode,
            temp_threshold_high: self.temp_threshold_high,
            temp_threshold_low: self.temp_threshold_low,
            last_seen: None,
        })
    }
}

/// What a device polls to learn its desired relay state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    // ---
    pub relay: bool,
    pub auto_mode: bool,
    pub temp_threshold_high: f64,
    pub temp_threshold_low: f64,
}

impl From<&Device> for DeviceCommand {
    fn from(device: &Device) -> Self {
        // ---
        Self {
            relay: device.relay_state,
            auto_mode: device.auto_mode,
            temp_threshold_high: device.temp_threshold_high,
            temp_threshold_low: device.temp_threshold_low,
        }
    }
}

/// Per-device, per-local-day summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyRollup {
    // ---
    pub device_id: String,
    /// UTC instant of the local midnight that opens the day.
    pub date: DateTime<Utc>,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    /// One per ingested reading with the relay on.
    pub fan_runtime_minutes: i32,
    pub reading_count: i64,
}

impl DailyRollup {
    /// Rollup for a day that has no summary yet, seeded from its first reading.
    pub fn seeded(reading: &Reading, date: DateTime<Utc>) -> Self {
        // ---
        Self {
            device_id: reading.device_id.clone(),
            date,
            avg_temperature: reading.temperature,
            avg_humidity: reading.humidity,
            min_temperature: reading.temperature,
            max_temperature: reading.temperature,
            fan_runtime_minutes: 0,
            reading_count: 0,
        }
    }
}
