//! Clock arithmetic and opening-window checks.
//!
//! All times are same-day clock times; adding past midnight wraps around
//! instead of rolling over to another day.

use std::cmp::Ordering;

use crate::types::{ClockTime, OpeningWindow, MINUTES_PER_DAY};

/// Add a (possibly fractional) number of minutes to a clock time.
///
/// The sum is floored to whole minutes and wrapped modulo 24h. Negative or
/// non-finite durations are treated as zero.
pub fn add_minutes(clock: ClockTime, minutes: f64) -> ClockTime {
    let minutes = if minutes.is_finite() && minutes > 0.0 { minutes } else { 0.0 };
    let total = (clock.minutes_since_midnight() as f64 + minutes).floor();
    let wrapped = total.rem_euclid(MINUTES_PER_DAY as f64) as u32;
    ClockTime::from_minutes(wrapped)
}

/// Compare two clock times by minutes since midnight
pub fn compare(a: ClockTime, b: ClockTime) -> Ordering {
    a.minutes_since_midnight().cmp(&b.minutes_since_midnight())
}

/// `window.start <= clock <= window.end`, inclusive on both ends
pub fn is_within(clock: ClockTime, window: &OpeningWindow) -> bool {
    let t = clock.minutes_since_midnight();
    window.start.minutes_since_midnight() <= t && t <= window.end.minutes_since_midnight()
}
