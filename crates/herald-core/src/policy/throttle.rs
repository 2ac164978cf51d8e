//! Throttling state: per-day usage counters and re-invocation timers
//!
//! Both operate on sub-records owned by the user record and mutate them in
//! place. Neither provides atomic increments: concurrent invocations against
//! the same bucket may both pass a check-then-increment.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::session::{TimerMap, UsageMap};

/// Milliseconds in one day
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of "now" for throttling decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use herald_core::policy::{Clock, FixedClock};
/// use std::time::Duration;
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
/// clock.advance(Duration::from_secs(60));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *crate::session::lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = crate::session::lock(&self.now);
        *now += chrono::Duration::milliseconds(duration_ms(by));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *crate::session::lock(&self.now)
    }
}

/// Saturating conversion of a duration to whole milliseconds
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Day number of `now` in a zone `utc_offset_minutes` east of UTC
pub fn date_number(now: DateTime<Utc>, utc_offset_minutes: i32) -> i64 {
    let local_ms = now.timestamp_millis() + i64::from(utc_offset_minutes) * 60_000;
    local_ms.div_euclid(DAY_MS)
}

/// Current count for `name`, resetting the whole map when `today` differs
/// from its `$date`
pub fn get_usage(name: &str, usage: &mut UsageMap, today: i64) -> u64 {
    if usage.date != today {
        *usage = UsageMap::for_day(today);
    }
    usage.counts.get(name).copied().unwrap_or(0)
}

/// Consume one use of `name`
///
/// Returns `true` when the bucket has already reached `max_usage`, in which
/// case the count is left untouched.
pub fn check_usage(name: &str, usage: &mut UsageMap, max_usage: u64, today: i64) -> bool {
    let count = get_usage(name, usage, today);
    if count >= max_usage {
        return true;
    }
    usage.counts.insert(name.to_string(), count + 1);
    false
}

/// Test and arm the re-invocation timer for `name`
///
/// Expired entries are swept only once `now` passes the map's `$date`
/// deadline, which then moves one day ahead. Returns `true` while the timer
/// for `name` is still running; otherwise re-arms it to `now + offset` when an
/// offset is given.
pub fn check_timer(name: &str, timers: &mut TimerMap, offset: Option<Duration>, now_ms: i64) -> bool {
    if now_ms > timers.date {
        timers.expiries.retain(|_, expiry| now_ms <= *expiry);
        timers.date = now_ms + DAY_MS;
    }

    if let Some(expiry) = timers.expiries.get(name) {
        if now_ms <= *expiry {
            return true;
        }
    }

    if let Some(offset) = offset {
        timers
            .expiries
            .insert(name.to_string(), now_ms.saturating_add(duration_ms(offset)));
    }
    false
}
