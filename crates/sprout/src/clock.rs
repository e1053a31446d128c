//! Server time estimate.

use std::time::Instant;

use chrono::{Local, NaiveDate, Utc};
use parking_lot::RwLock;

/// Tracks the server's wall clock from the last login or heartbeat reply.
#[derive(Debug, Default)]
pub struct ServerClock {
    anchor: RwLock<Option<(i64, Instant)>>,
    pinned_day: RwLock<Option<NaiveDate>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `server_ms` as the server time at this instant. Non-positive
    /// values are ignored.
    pub fn sync(&self, server_ms: i64) {
        if server_ms <= 0 {
            return;
        }
        *self.anchor.write() = Some((server_ms, Instant::now()));
    }

    pub fn is_synced(&self) -> bool {
        self.anchor.read().is_some()
    }

    /// Estimated server time in milliseconds. Falls back to the local wall
    /// clock before the first sync.
    pub fn now_ms(&self) -> i64 {
        match *self.anchor.read() {
            Some((server_ms, at)) => server_ms + at.elapsed().as_millis() as i64,
            None => Utc::now().timestamp_millis(),
        }
    }

    pub fn now_sec(&self) -> i64 {
        self.now_ms() / 1000
    }

    /// Local calendar date that scopes the daily quotas, or the pinned
    /// date when one is set.
    pub fn today(&self) -> NaiveDate {
        match *self.pinned_day.read() {
            Some(date) => date,
            None => Local::now().date_naive(),
        }
    }

    /// Fixes the date `today` reports. `None` goes back to the local
    /// calendar.
    pub fn pin_today(&self, date: Option<NaiveDate>) {
        *self.pinned_day.write() = date;
    }
}

/// Normalizes a wire timestamp to seconds.
///
/// The server mixes seconds and milliseconds; anything above 1e12 is taken
/// as milliseconds. Non-positive values mean "unset" and map to 0.
pub fn to_time_sec(value: i64) -> i64 {
    if value <= 0 {
        0
    } else if value > 1_000_000_000_000 {
        value / 1000
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_time_sec_normalizes_units() {
        assert_eq!(to_time_sec(-5), 0);
        assert_eq!(to_time_sec(0), 0);
        assert_eq!(to_time_sec(1_700_000_000), 1_700_000_000);
        assert_eq!(to_time_sec(1_700_000_000_123), 1_700_000_000);
    }

    #[test]
    fn test_sync_anchors_server_time() {
        let clock = ServerClock::new();
        assert!(!clock.is_synced());

        clock.sync(1_000_000_000_000);
        assert!(clock.is_synced());
        let now = clock.now_sec();
        assert!((1_000_000_000..1_000_000_005).contains(&now));
    }

    #[test]
    fn test_pinned_day_overrides_local_calendar() {
        let clock = ServerClock::new();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");

        clock.pin_today(Some(day));
        assert_eq!(clock.today(), day);

        clock.pin_today(None);
        assert_eq!(clock.today(), Local::now().date_naive());
    }

    #[test]
    fn test_non_positive_sync_is_ignored() {
        let clock = ServerClock::new();
        clock.sync(0);
        assert!(!clock.is_synced());
    }
}
