//! Time-of-day posting windows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A `HH:MM-HH:MM` local-time range. End is exclusive; a range whose end is
/// not after its start wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `t` falls in the part of the range that belongs to its own day.
    fn contains_same_day(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.start
        } else {
            t >= self.start && t < self.end
        }
    }

    /// Whether `t` falls in the after-midnight tail of a wrapping range.
    fn contains_carry_over(&self, t: NaiveTime) -> bool {
        self.wraps_midnight() && t < self.end
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("time range '{}' must look like HH:MM-HH:MM", s))?;
        let parse = |part: &str| {
            NaiveTime::parse_from_str(part.trim(), "%H:%M")
                .map_err(|_| format!("invalid time '{}' in range '{}'", part.trim(), s))
        };
        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

impl TryFrom<String> for TimeRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Weekday and weekend upload ranges in a named IANA timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingWindow {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub weekday: Vec<TimeRange>,
    /// Falls back to `weekday` when empty.
    #[serde(default)]
    pub weekend: Vec<TimeRange>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl PostingWindow {
    pub fn validate(&self) -> Result<(), String> {
        self.tz().map(|_| ())
    }

    fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse()
            .map_err(|_| format!("'{}' is not a valid IANA timezone", self.timezone))
    }

    fn ranges_for(&self, day: Weekday) -> &[TimeRange] {
        match day {
            Weekday::Sat | Weekday::Sun if !self.weekend.is_empty() => &self.weekend,
            _ => &self.weekday,
        }
    }

    /// Whether uploads are allowed at `now`.
    ///
    /// With no ranges configured at all the window is always open. An
    /// unparseable timezone also leaves it open; config validation rejects
    /// that case before a run starts.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if self.weekday.is_empty() && self.weekend.is_empty() {
            return true;
        }

        let tz = match self.tz() {
            Ok(tz) => tz,
            Err(e) => {
                warn!(error = %e, "Posting window ignored");
                return true;
            }
        };

        let local = now.with_timezone(&tz);
        let t = local.time();
        let today = local.weekday();

        self.ranges_for(today).iter().any(|r| r.contains_same_day(t))
            || self.ranges_for(today.pred()).iter().any(|r| r.contains_carry_over(t))
    }
}
