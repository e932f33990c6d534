//! Rate and schedule gating
//!
//! Pure decision logic: given caller-supplied counters, a policy, and the
//! current time, decide whether the next action may proceed. Checks run in
//! a fixed order (active window, hourly cap, daily cap, cooldown) and the
//! first failing check names the reported reason. No clock and no state
//! live here; counters are persisted elsewhere and handed in.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::DenyReason;
use crate::domain::constants::{
    DEFAULT_COOLDOWN_SECS, DEFAULT_DAILY_LIMIT, DEFAULT_HOURLY_LIMIT,
};

/// Daily scheduling window. `start > end` describes an overnight window
/// (e.g. 22:00–06:00).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ActiveHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Deny Saturdays and Sundays entirely.
    pub workdays_only: bool,
}

impl ActiveHours {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if self.workdays_only && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = now.time();
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Caps and cooldown for one interaction workflow. A cap of `u32::MAX`
/// effectively disables that gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatePolicy {
    pub daily_limit: u32,
    pub hourly_limit: u32,
    pub cooldown_secs: i64,
    /// `None` disables scheduling; every time of day is acceptable.
    pub active_hours: Option<ActiveHours>,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            hourly_limit: DEFAULT_HOURLY_LIMIT,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            active_hours: None,
        }
    }
}

/// Persisted action counters, bucketed per calendar day and per clock
/// hour. Counts from an expired bucket read as zero after [`rolled`].
///
/// [`rolled`]: RateCounters::rolled
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateCounters {
    pub daily_count: u32,
    pub hourly_count: u32,
    pub last_action_ts: Option<DateTime<Utc>>,
    pub day_start: NaiveDate,
    /// Hours since the Unix epoch of the current hourly bucket.
    pub hour_bucket: i64,
}

impl RateCounters {
    fn hour_bucket_of(now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(3_600)
    }

    /// Counters with expired period buckets zeroed.
    pub fn rolled(mut self, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        if self.day_start != today {
            self.daily_count = 0;
            self.day_start = today;
        }
        let bucket = Self::hour_bucket_of(now);
        if self.hour_bucket != bucket {
            self.hourly_count = 0;
            self.hour_bucket = bucket;
        }
        self
    }

    /// Records one performed action at `now`.
    pub fn record_action(&mut self, now: DateTime<Utc>) {
        *self = self.clone().rolled(now);
        self.daily_count += 1;
        self.hourly_count += 1;
        self.last_action_ts = Some(now);
    }
}

/// The gate. Pure: rolls a copy of `counters` to `now` and applies the
/// checks in their specified order.
pub fn can_proceed(
    counters: &RateCounters,
    policy: &RatePolicy,
    now: DateTime<Utc>,
) -> Result<(), DenyReason> {
    if let Some(window) = &policy.active_hours {
        if !window.contains(now) {
            return Err(DenyReason::OutsideActiveHours);
        }
    }

    let current = counters.clone().rolled(now);
    if current.hourly_count >= policy.hourly_limit {
        return Err(DenyReason::HourlyCapReached);
    }
    if current.daily_count >= policy.daily_limit {
        return Err(DenyReason::DailyCapReached);
    }
    if let Some(last) = current.last_action_ts {
        if now - last < Duration::seconds(policy.cooldown_secs) {
            return Err(DenyReason::CoolingDown);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        // 2026-03-04 is a Wednesday.
        Utc.with_ymd_and_hms(2026, 3, 4, h, m, 0).unwrap()
    }

    fn open_policy() -> RatePolicy {
        RatePolicy {
            daily_limit: 10,
            hourly_limit: 5,
            cooldown_secs: 60,
            active_hours: None,
        }
    }

    #[test]
    fn all_gates_open_proceeds() {
        let counters = RateCounters::default().rolled(at(12, 0));
        assert_eq!(can_proceed(&counters, &open_policy(), at(12, 0)), Ok(()));
    }

    #[test]
    fn hourly_cap_denies_regardless_of_daily_and_cooldown() {
        let mut counters = RateCounters::default().rolled(at(12, 0));
        counters.hourly_count = 5;
        // Daily room left, no recent action; the hourly gate still wins.
        assert_eq!(
            can_proceed(&counters, &open_policy(), at(12, 30)),
            Err(DenyReason::HourlyCapReached)
        );
    }

    #[test]
    fn daily_cap_checked_after_hourly() {
        let mut counters = RateCounters::default().rolled(at(12, 0));
        counters.daily_count = 10;
        assert_eq!(
            can_proceed(&counters, &open_policy(), at(12, 0)),
            Err(DenyReason::DailyCapReached)
        );
    }

    #[test]
    fn cooldown_is_the_last_gate() {
        let mut counters = RateCounters::default();
        counters.record_action(at(12, 0));
        assert_eq!(
            can_proceed(&counters, &open_policy(), at(12, 0) + Duration::seconds(30)),
            Err(DenyReason::CoolingDown)
        );
        assert_eq!(
            can_proceed(&counters, &open_policy(), at(12, 0) + Duration::seconds(61)),
            Ok(())
        );
    }

    #[test]
    fn active_window_is_checked_first() {
        let mut policy = open_policy();
        policy.active_hours = Some(ActiveHours {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            workdays_only: false,
        });
        let mut counters = RateCounters::default().rolled(at(20, 0));
        counters.hourly_count = 99;
        // Both would deny; the window reason is reported.
        assert_eq!(
            can_proceed(&counters, &policy, at(20, 0)),
            Err(DenyReason::OutsideActiveHours)
        );
        assert_eq!(can_proceed(&RateCounters::default(), &policy, at(10, 0)), Ok(()));
    }

    #[test]
    fn overnight_window_spans_midnight() {
        let window = ActiveHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            workdays_only: false,
        };
        assert!(window.contains(at(23, 0)));
        assert!(window.contains(at(5, 0)));
        assert!(!window.contains(at(12, 0)));
    }

    #[test]
    fn weekend_denied_when_workdays_only() {
        let window = ActiveHours {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            workdays_only: true,
        };
        // 2026-03-07 is a Saturday.
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        assert!(!window.contains(saturday));
        assert!(window.contains(at(12, 0)));
    }

    #[test]
    fn expired_buckets_read_as_zero() {
        let mut counters = RateCounters::default();
        counters.record_action(at(12, 59));
        assert_eq!(counters.hourly_count, 1);
        assert_eq!(counters.daily_count, 1);

        let next_hour = counters.clone().rolled(at(13, 1));
        assert_eq!(next_hour.hourly_count, 0);
        assert_eq!(next_hour.daily_count, 1);

        let next_day = Utc.with_ymd_and_hms(2026, 3, 5, 0, 1, 0).unwrap();
        let rolled = counters.rolled(next_day);
        assert_eq!(rolled.daily_count, 0);
        assert_eq!(rolled.hourly_count, 0);
    }
}
