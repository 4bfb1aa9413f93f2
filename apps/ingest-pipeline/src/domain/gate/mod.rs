//! Market-Hours Acquisition Gate
//!
//! Decides whether acquisition should proceed at a given wall-clock instant.
//! Used only by the polling pipeline; a closed gate means the cycle is
//! skipped (sleep and recheck), never an error.
//!
//! The decision is a pure function of the instant: the daily window
//! `[open_time, close_time]` is inclusive on both boundaries, evaluated in
//! the configured zone, and weekends are always closed.

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use chrono_tz::Tz;

/// Pure acquisition-window decision.
///
/// Implemented by [`TradingGate`] in production; tests substitute scripted
/// gates to drive pacing scenarios.
pub trait Gate {
    /// Whether acquisition may proceed at `now`.
    fn is_open(&self, now: DateTime<Utc>) -> bool;
}

/// Daily trading window in a named time zone, weekdays only.
#[derive(Debug, Clone)]
pub struct TradingGate {
    open_time: NaiveTime,
    close_time: NaiveTime,
    zone: Tz,
}

impl TradingGate {
    /// Create a gate with an explicit window and zone.
    #[must_use]
    pub const fn new(open_time: NaiveTime, close_time: NaiveTime, zone: Tz) -> Self {
        Self {
            open_time,
            close_time,
            zone,
        }
    }

    /// Regular US equities session: 09:30:00-16:00:00 Eastern, Monday-Friday.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn us_equities() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(9, 30, 0).expect("static time literal is valid"),
            NaiveTime::from_hms_opt(16, 0, 0).expect("static time literal is valid"),
            chrono_tz::US::Eastern,
        )
    }
}

impl Gate for TradingGate {
    fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.zone);
        let time = local.time();

        local.weekday().num_days_from_monday() < 5
            && time >= self.open_time
            && time <= self.close_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::US::Eastern;
    use test_case::test_case;

    fn eastern_instant(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Eastern
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    // 2024-01-03 is a Wednesday.
    #[test_case(9, 30, 0 => true; "opening boundary is inclusive")]
    #[test_case(16, 0, 0 => true; "closing boundary is inclusive")]
    #[test_case(9, 29, 59 => false; "one second before the open")]
    #[test_case(16, 0, 1 => false; "one second after the close")]
    #[test_case(12, 0, 0 => true; "midday")]
    #[test_case(0, 0, 0 => false; "midnight")]
    fn weekday_window(h: u32, mi: u32, s: u32) -> bool {
        TradingGate::us_equities().is_open(eastern_instant(2024, 1, 3, h, mi, s))
    }

    #[test]
    fn weekends_are_closed() {
        let gate = TradingGate::us_equities();
        // 2024-01-06 Saturday, 2024-01-07 Sunday: midday, inside the window.
        assert!(!gate.is_open(eastern_instant(2024, 1, 6, 12, 0, 0)));
        assert!(!gate.is_open(eastern_instant(2024, 1, 7, 12, 0, 0)));
    }

    #[test]
    fn window_follows_eastern_across_dst() {
        let gate = TradingGate::us_equities();
        // 2024-07-10 Wednesday, during EDT: 15:59 Eastern is 19:59 UTC.
        assert!(gate.is_open(eastern_instant(2024, 7, 10, 15, 59, 0)));
        assert!(!gate.is_open(eastern_instant(2024, 7, 10, 16, 1, 0)));
    }

    #[test]
    fn custom_window() {
        let gate = TradingGate::new(
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            chrono_tz::UTC,
        );
        // Any weekday instant passes with an all-day window.
        assert!(gate.is_open(Utc.with_ymd_and_hms(2024, 1, 3, 3, 4, 5).unwrap()));
    }
}
