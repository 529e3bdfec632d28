//! Same-day clock time at minute resolution

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minutes in one calendar day; clock arithmetic wraps at this boundary.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A time of day with no date attached, serialized as zero-padded `HH:MM`.
///
/// Seconds are always zero, so the derived ordering is the ordering by
/// minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Build from minutes since midnight, wrapping past 24h.
    pub fn from_minutes(minutes: u32) -> Self {
        let wrapped = minutes % MINUTES_PER_DAY;
        Self(NaiveTime::from_num_seconds_from_midnight_opt(wrapped * 60, 0).unwrap_or_default())
    }

    pub fn minutes_since_midnight(self) -> u32 {
        self.0.num_seconds_from_midnight() / 60
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(time: NaiveTime) -> Self {
        Self::from_minutes(time.num_seconds_from_midnight() / 60)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for ClockTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M").map(Self::from)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid clock time '{}': {}", raw, e)))
    }
}
