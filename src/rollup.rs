//! Daily rollup aggregation.
//!
//! Two strategies produce a [`DailyRollup`] after each ingested reading:
//!
//! - [`RollupStrategy::Recompute`] folds every reading of the device's local day
//!   from scratch. A rollup that missed an update heals on the next reading.
//! - [`RollupStrategy::Incremental`] folds only the new reading into the stored
//!   running mean. Constant cost per reading, but the mean is rounded at every
//!   step, so it can drift from the recomputed value in the last bits.
//!
//! In both cases `fan_runtime_minutes` counts ingested readings that left the
//! relay on, which equals minutes only for devices reporting once a minute.

use std::str::FromStr;

use serde::Serialize;

use crate::calendar::DayBounds;
use crate::error::Error;
use crate::models::{DailyRollup, Reading};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupStrategy {
    #[default]
    Recompute,
    Incremental,
}

impl FromStr for RollupStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "recompute" => Ok(Self::Recompute),
            "incremental" => Ok(Self::Incremental),
            other => Err(Error::Validation(format!(
                "unknown rollup strategy '{other}' (expected recompute|incremental)"
            ))),
        }
    }
}

/// Rebuild the day's statistics from every reading recorded in `day`.
///
/// `day_readings` may contain readings outside the day or for other devices;
/// they are ignored. The just-ingested `reading` is always included.
pub fn recompute(
    existing: Option<DailyRollup>,
    day: &DayBounds,
    day_readings: &[Reading],
    reading: &Reading,
    relay_on: bool,
) -> DailyRollup {
    // ---
    let mut rollup = existing.unwrap_or_else(|| DailyRollup::seeded(reading, day.start));

    let mut samples: Vec<&Reading> = day_readings
        .iter()
        .filter(|r| r.device_id == reading.device_id && day.contains(r.timestamp))
        .collect();
    if !samples.iter().any(|r| r.id == reading.id) {
        samples.push(reading);
    }

    let count = samples.len() as f64;
    let (sum_t, sum_h, min_t, max_t) = samples.iter().fold(
        (0.0, 0.0, f64::INFINITY, f64::NEG_INFINITY),
        |(st, sh, lo, hi), r| {
            (
                st + r.temperature,
                sh + r.humidity,
                lo.min(r.temperature),
                hi.max(r.temperature),
            )
        },
    );

    rollup.avg_temperature = sum_t / count;
    rollup.avg_humidity = sum_h / count;
    rollup.min_temperature = min_t;
    rollup.max_temperature = max_t;
    rollup.reading_count = samples.len() as i64;
    count_fan_runtime(&mut rollup, relay_on);
    rollup
}

/// Fold one reading into the stored running summary.
pub fn accumulate(
    existing: Option<DailyRollup>,
    day: &DayBounds,
    reading: &Reading,
    relay_on: bool,
) -> DailyRollup {
    // ---
    let mut rollup = existing.unwrap_or_else(|| DailyRollup::seeded(reading, day.start));

    let prev = rollup.reading_count as f64;
    let next = prev + 1.0;
    rollup.avg_temperature = (rollup.avg_temperature * prev + reading.temperature) / next;
    rollup.avg_humidity = (rollup.avg_humidity * prev + reading.humidity) / next;
    rollup.min_temperature = rollup.min_temperature.min(reading.temperature);
    rollup.max_temperature = rollup.max_temperature.max(reading.temperature);
    rollup.reading_count += 1;
    count_fan_runtime(&mut rollup, relay_on);
    rollup
}

fn count_fan_runtime(rollup: &mut DailyRollup, relay_on: bool) {
    if relay_on {
        rollup.fan_runtime_minutes += 1;
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::RawReading;
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

    fn day() -> DayBounds {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 12, 0, 0).unwrap();
        DayBounds::containing(ts, &FixedOffset::east_opt(0).unwrap()).unwrap()
    }

    fn reading_at(temp: f64, humidity: f64, ts: DateTime<Utc>) -> Reading {
        RawReading::new("fan-1", temp, humidity).at(ts).validate(ts).unwrap()
    }

    fn fixture() -> Vec<Reading> {
        // ---
        let base = day().start + Duration::hours(8);
        vec![
            reading_at(20.0, 40.0, base),
            reading_at(30.0, 50.0, base + Duration::minutes(1)),
            reading_at(40.0, 60.0, base + Duration::minutes(2)),
        ]
    }

    /// Replay the fixture through a strategy the way the engine does.
    fn replay(strategy: RollupStrategy, relay: &[bool]) -> DailyRollup {
        // ---
        let readings = fixture();
        let mut stored: Option<DailyRollup> = None;
        for (i, r) in readings.iter().enumerate() {
            let existing = stored
                .take()
                .unwrap_or_else(|| DailyRollup::seeded(r, day().start));
            let next = match strategy {
                RollupStrategy::Recompute => {
                    recompute(Some(existing), &day(), &readings[..=i], r, relay[i])
                }
                RollupStrategy::Incremental => accumulate(Some(existing), &day(), r, relay[i]),
            };
            stored = Some(next);
        }
        stored.unwrap()
    }

    #[test]
    fn test_statistics_for_both_strategies() {
        // ---
        for strategy in [RollupStrategy::Recompute, RollupStrategy::Incremental] {
            let rollup = replay(strategy, &[false, false, false]);
            assert_eq!(rollup.avg_temperature, 30.0, "{strategy:?}");
            assert_eq!(rollup.avg_humidity, 50.0, "{strategy:?}");
            assert_eq!(rollup.min_temperature, 20.0, "{strategy:?}");
            assert_eq!(rollup.max_temperature, 40.0, "{strategy:?}");
            assert_eq!(rollup.reading_count, 3, "{strategy:?}");
            assert_eq!(rollup.fan_runtime_minutes, 0, "{strategy:?}");
        }
    }

    #[test]
    fn test_fan_runtime_counts_relay_on_readings() {
        // ---
        for strategy in [RollupStrategy::Recompute, RollupStrategy::Incremental] {
            assert_eq!(replay(strategy, &[true, true, true]).fan_runtime_minutes, 3);
            assert_eq!(replay(strategy, &[false, true, false]).fan_runtime_minutes, 1);
        }
    }

    #[test]
    fn test_first_reading_initialises_rollup() {
        // ---
        let readings = fixture();
        let rollup = recompute(None, &day(), &[], &readings[0], true);

        assert_eq!(rollup.date, day().start);
        assert_eq!(rollup.avg_temperature, 20.0);
        assert_eq!(rollup.min_temperature, 20.0);
        assert_eq!(rollup.max_temperature, 20.0);
        assert_eq!(rollup.fan_runtime_minutes, 1);
        assert_eq!(rollup.reading_count, 1);
    }

    #[test]
    fn test_recompute_ignores_other_days_and_devices() {
        // ---
        let mut readings = fixture();
        readings.push(reading_at(99.0, 99.0, day().end));
        readings.push(reading_at(-5.0, 10.0, day().start - Duration::seconds(1)));
        let mut other = reading_at(50.0, 50.0, day().start + Duration::hours(9));
        other.device_id = "fan-2".into();
        readings.push(other);

        let latest = readings[2].clone();
        let rollup = recompute(None, &day(), &readings, &latest, false);

        assert_eq!(rollup.min_temperature, 20.0);
        assert_eq!(rollup.max_temperature, 40.0);
        assert_eq!(rollup.reading_count, 3);
    }

    #[test]
    fn test_recompute_heals_stale_rollup() {
        // ---
        let readings = fixture();
        let stale = DailyRollup {
            avg_temperature: 0.0,
            min_temperature: 0.0,
            max_temperature: 0.0,
            reading_count: 1,
            fan_runtime_minutes: 7,
            ..DailyRollup::seeded(&readings[0], day().start)
        };
        let rollup = recompute(Some(stale), &day(), &readings, &readings[2], false);

        assert_eq!(rollup.avg_temperature, 30.0);
        assert_eq!(rollup.min_temperature, 20.0);
        assert_eq!(rollup.fan_runtime_minutes, 7);
    }

    #[test]
    fn test_parse_strategy() {
        // ---
        assert_eq!("recompute".parse::<RollupStrategy>().unwrap(), RollupStrategy::Recompute);
        assert_eq!(" Incremental ".parse::<RollupStrategy>().unwrap(), RollupStrategy::Incremental);
        assert!("streaming".parse::<RollupStrategy>().is_err());
    }
}
