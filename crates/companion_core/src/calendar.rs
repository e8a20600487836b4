//! crates/companion_core/src/calendar.rs
//!
//! Wall-clock access and "today" arithmetic in the application's home timezone.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use std::sync::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Builds the home timezone from a whole-hour UTC offset.
pub fn home_offset(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
}

/// Midnight of the home-timezone calendar day containing `now`, as a UTC instant.
pub fn start_of_today(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_date = now.with_timezone(&offset).date_naive();
    let midnight = local_date.and_time(NaiveTime::MIN);
    match offset.from_local_datetime(&midnight).single() {
        Some(start) => start.with_timezone(&Utc),
        // A fixed offset always maps a local time to exactly one instant.
        None => now,
    }
}

/// True when both instants fall on the same home-timezone calendar day.
pub fn is_same_home_day<A: TimeZone, B: TimeZone>(
    a: &DateTime<A>,
    b: &DateTime<B>,
    offset: FixedOffset,
) -> bool {
    a.with_timezone(&offset).date_naive() == b.with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokyo() -> FixedOffset {
        home_offset(9).unwrap()
    }

    #[test]
    fn start_of_today_is_local_midnight() {
        // 2026-10-19 02:00 in Tokyo is still 2026-10-18 in UTC.
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 17, 0, 0).unwrap();
        let start = start_of_today(now, tokyo());
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap());
    }

    #[test]
    fn one_second_before_midnight_is_yesterday() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
        let start = start_of_today(now, tokyo());
        let late_yesterday = start - Duration::seconds(1);
        assert!(late_yesterday < start);
        assert!(!is_same_home_day(&late_yesterday, &now, tokyo()));
        assert!(is_same_home_day(&start, &now, tokyo()));
    }

    #[test]
    fn manual_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), t0 + Duration::minutes(5));
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }
}
