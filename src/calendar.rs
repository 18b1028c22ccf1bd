//! Local-time alignment helpers.
//!
//! All instants are stored as UTC; day boundaries and bucket alignment are
//! computed in a fixed local offset chosen at startup.

use chrono::{DateTime, Duration, FixedOffset, Utc};

// ---

/// Floor `ts` to a multiple of `step` in local time.
///
/// `step` must divide a day evenly (10 minutes, 1 hour, 1 day). Returns `None`
/// when the floored instant falls outside chrono's representable range.
pub fn floor_local(ts: DateTime<Utc>, step: Duration, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    // ---
    let step_secs = step.num_seconds();
    let local_secs = ts.timestamp() + i64::from(offset.local_minus_utc());
    let excess = Duration::seconds(local_secs.rem_euclid(step_secs))
        + Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos()));
    ts.checked_sub_signed(excess)
}

/// Half-open local calendar day `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    // ---
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayBounds {
    /// The local day containing `ts`, if both of its ends are representable.
    pub fn containing(ts: DateTime<Utc>, offset: &FixedOffset) -> Option<Self> {
        // ---
        let start = floor_local(ts, Duration::days(1), offset)?;
        let end = start.checked_add_signed(Duration::days(1))?;
        Some(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_floor_to_ten_minutes() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 47, 31).unwrap()
            + Duration::milliseconds(250);
        let floored = floor_local(ts, Duration::minutes(10), &utc()).unwrap();
        assert_eq!(floored, Utc.with_ymd_and_hms(2025, 3, 26, 18, 40, 0).unwrap());
    }

    #[test]
    fn test_floor_is_identity_on_boundary() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 0, 0).unwrap();
        assert_eq!(floor_local(ts, Duration::hours(1), &utc()), Some(ts));
    }

    #[test]
    fn test_day_bounds_follow_local_offset() {
        // ---
        // 23:30 UTC is already the next day at UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 23, 30, 0).unwrap();
        let day = DayBounds::containing(ts, &plus_two).unwrap();

        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 3, 26, 22, 0, 0).unwrap());
        assert_eq!(day.end, Utc.with_ymd_and_hms(2025, 3, 27, 22, 0, 0).unwrap());
        assert!(day.contains(ts));
        assert!(!day.contains(day.end));
    }

    #[test]
    fn test_day_bounds_negative_offset() {
        // ---
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 27, 3, 0, 0).unwrap();
        let day = DayBounds::containing(ts, &minus_five).unwrap();

        // 03:00 UTC is 22:00 on the 26th locally
        assert_eq!(day.start, Utc.with_ymd_and_hms(2025, 3, 26, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_day_bounds_at_end_of_time() {
        // ---
        let last = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        assert_eq!(DayBounds::containing(last, &utc()), None);

        let first = DateTime::<Utc>::MIN_UTC + Duration::hours(1);
        assert_eq!(floor_local(first, Duration::days(1), &FixedOffset::west_opt(3 * 3600).unwrap()), None);
    }
}
