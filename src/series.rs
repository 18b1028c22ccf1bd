//! Fixed-cadence, gap-filled time series for charting.
//!
//! Raw readings arrive at whatever rate devices report. For a requested
//! [`Window`] the builder partitions the lookback into buckets of a fixed width
//! and averages the readings inside each one:
//!
//! | window | lookback | bucket  | buckets |
//! |--------|----------|---------|---------|
//! | `1h`   | 1 hour   | 10 min  | 6       |
//! | `24h`  | 24 hours | 1 hour  | 24      |
//! | `7d`   | 7 days   | 1 day   | 7       |
//!
//! Buckets are aligned in local time. The last bucket is the one containing
//! `now`, so it usually extends past `now`. Empty buckets are zero-filled; their
//! `reading_count` of 0 is what distinguishes them from a genuine zero reading.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::floor_local;
use crate::error::Error;
use crate::models::Reading;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
}

impl Window {
    // ---
    pub fn lookback(self) -> Duration {
        match self {
            Window::Hour => Duration::hours(1),
            Window::Day => Duration::hours(24),
            Window::Week => Duration::days(7),
        }
    }

    pub fn bucket_width(self) -> Duration {
        match self {
            Window::Hour => Duration::minutes(10),
            Window::Day => Duration::hours(1),
            Window::Week => Duration::days(1),
        }
    }

    pub fn bucket_count(self) -> usize {
        (self.lookback().num_seconds() / self.bucket_width().num_seconds()) as usize
    }

    /// Start of the first bucket for a series ending at `now`.
    ///
    /// `now - lookback` is floored to the bucket grid; that bucket lies almost
    /// entirely before the lookback, so the series opens one bucket later.
    /// `None` if `now` is too close to the ends of chrono's range.
    pub fn first_bucket_start(self, now: DateTime<Utc>, offset: &FixedOffset) -> Option<DateTime<Utc>> {
        // ---
        let width = self.bucket_width();
        let from = now.checked_sub_signed(self.lookback())?;
        floor_local(from, width, offset)?.checked_add_signed(width)
    }
}

impl FromStr for Window {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim() {
            "1h" => Ok(Window::Hour),
            "24h" => Ok(Window::Day),
            "7d" => Ok(Window::Week),
            other => Err(Error::Validation(format!(
                "unknown timespan '{other}' (expected 1h|24h|7d)"
            ))),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let s = match self {
            Window::Hour => "1h",
            Window::Day => "24h",
            Window::Week => "7d",
        };
        f.write_str(s)
    }
}

/// One bucket of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    // ---
    /// Bucket start.
    pub timestamp: DateTime<Utc>,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    /// Readings averaged into this bucket; 0 marks a zero-filled gap.
    pub reading_count: usize,
}

/// Bucket `readings` for `window` ending at `now`.
///
/// `readings` should already be restricted to `[first_bucket_start, now]`;
/// anything outside the buckets is ignored. Because the series opens one
/// bucket after `floor(now - lookback)`, readings in
/// `[now - lookback, first_bucket_start)` fall in no bucket; that keeps the
/// bucket count fixed at `lookback / width`.
pub fn bucketize(
    window: Window,
    readings: &[Reading],
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Result<Vec<SeriesPoint>, Error> {
    // ---
    let out_of_range = || Error::Validation(format!("series end {now} is out of range"));
    let width = window.bucket_width();
    let mut start = window.first_bucket_start(now, offset).ok_or_else(out_of_range)?;
    let mut points = Vec::with_capacity(window.bucket_count());

    while start <= now {
        let end = start.checked_add_signed(width).ok_or_else(out_of_range)?;
        let (count, sum_t, sum_h) = readings
            .iter()
            .filter(|r| start <= r.timestamp && r.timestamp < end)
            .fold((0usize, 0.0, 0.0), |(n, t, h), r| {
                (n + 1, t + r.temperature, h + r.humidity)
            });

        let (avg_temperature, avg_humidity) = if count > 0 {
            (sum_t / count as f64, sum_h / count as f64)
        } else {
            (0.0, 0.0)
        };

        points.push(SeriesPoint {
            timestamp: start,
            avg_temperature,
            avg_humidity,
            reading_count: count,
        });
        start = end;
    }

    Ok(points)
}
