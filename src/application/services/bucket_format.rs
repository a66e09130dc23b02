//! Time bucket keys for click aggregation.
//!
//! A bucket format is an ordered, contiguous run of calendar units such as
//! `year.month.day.hour`. Formatting a timestamp yields the bucket key
//! (`analytics:2024.03.05.14`); parsing the key back yields the bucket's
//! canonical start with every finer unit zeroed.

use chrono::{DateTime, Datelike, Months, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Key prefix shared by every bucket hash.
pub const BUCKET_KEY_PREFIX: &str = "analytics:";

const SEPARATOR: char = '.';
const HOUR_SECS: u64 = 3600;
const DAY_SECS: u64 = 24 * HOUR_SECS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BucketFormatError {
    #[error("Bucket format is empty")]
    Empty,

    #[error("Unknown time unit '{0}'")]
    UnknownUnit(String),

    #[error("Time units must be a contiguous run of year.month.day.hour.minute.second, got '{0}'")]
    NotContiguous(String),

    #[error("Bucket key '{0}' does not match the configured format")]
    KeyMismatch(String),

    #[error("Bucket key '{0}' is not a valid calendar time")]
    InvalidTime(String),
}

/// Calendar units, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    fn name(self) -> &'static str {
        match self {
            TimeUnit::Year => "year",
            TimeUnit::Month => "month",
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Upper bound of one unit in seconds.
    fn max_secs(self) -> u64 {
        match self {
            TimeUnit::Year => 366 * DAY_SECS,
            TimeUnit::Month => 31 * DAY_SECS,
            TimeUnit::Day => DAY_SECS,
            TimeUnit::Hour => HOUR_SECS,
            TimeUnit::Minute => 60,
            TimeUnit::Second => 1,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = BucketFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(TimeUnit::Year),
            "month" => Ok(TimeUnit::Month),
            "day" => Ok(TimeUnit::Day),
            "hour" => Ok(TimeUnit::Hour),
            "minute" => Ok(TimeUnit::Minute),
            "second" | "seconds" => Ok(TimeUnit::Second),
            other => Err(BucketFormatError::UnknownUnit(other.to_string())),
        }
    }
}

/// A validated bucket granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFormat {
    units: Vec<TimeUnit>,
}

impl Default for BucketFormat {
    fn default() -> Self {
        Self {
            units: vec![
                TimeUnit::Year,
                TimeUnit::Month,
                TimeUnit::Day,
                TimeUnit::Hour,
            ],
        }
    }
}

impl fmt::Display for BucketFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.units.iter().map(|u| u.name()).collect();
        write!(f, "{}", names.join("."))
    }
}

impl FromStr for BucketFormat {
    type Err = BucketFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl BucketFormat {
    /// Parses a dotted unit list such as `year.month.day.hour`.
    ///
    /// # Errors
    ///
    /// Rejects empty input, unknown units, and units that skip, repeat, or
    /// run out of order.
    pub fn parse(format: &str) -> Result<Self, BucketFormatError> {
        if format.trim().is_empty() {
            return Err(BucketFormatError::Empty);
        }

        let units = format
            .split(SEPARATOR)
            .map(TimeUnit::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        let contiguous = units
            .windows(2)
            .all(|pair| pair[1].index() == pair[0].index() + 1);
        if !contiguous {
            return Err(BucketFormatError::NotContiguous(format.to_string()));
        }

        Ok(Self { units })
    }

    pub fn units(&self) -> &[TimeUnit] {
        &self.units
    }

    /// The finest unit in the format; it decides the bucket width.
    pub fn finest(&self) -> TimeUnit {
        // parse() guarantees at least one unit
        self.units.last().copied().unwrap_or(TimeUnit::Hour)
    }

    /// Bucket key for the bucket containing `ts`.
    pub fn key_for(&self, ts: DateTime<Utc>) -> String {
        let parts: Vec<String> = self
            .units
            .iter()
            .map(|unit| {
                let value = match unit {
                    TimeUnit::Year => ts.year(),
                    TimeUnit::Month => ts.month() as i32,
                    TimeUnit::Day => ts.day() as i32,
                    TimeUnit::Hour => ts.hour() as i32,
                    TimeUnit::Minute => ts.minute() as i32,
                    TimeUnit::Second => ts.second() as i32,
                };
                format!("{:02}", value)
            })
            .collect();

        format!("{}{}", BUCKET_KEY_PREFIX, parts.join("."))
    }

    /// Canonical timestamp of a bucket key.
    ///
    /// Units absent from the format take their zero value (month and day 1,
    /// time fields 0). A format without `year` falls back to `current_year`.
    ///
    /// # Errors
    ///
    /// Returns [`BucketFormatError::KeyMismatch`] when the key has the wrong
    /// prefix, field count, or non-numeric fields, and
    /// [`BucketFormatError::InvalidTime`] for impossible dates.
    pub fn parse_key(
        &self,
        key: &str,
        current_year: i32,
    ) -> Result<DateTime<Utc>, BucketFormatError> {
        let mismatch = || BucketFormatError::KeyMismatch(key.to_string());

        let body = key.strip_prefix(BUCKET_KEY_PREFIX).ok_or_else(mismatch)?;
        let fields: Vec<&str> = body.split(SEPARATOR).collect();
        if fields.len() != self.units.len() {
            return Err(mismatch());
        }

        let mut year = current_year;
        let mut parts = [1u32, 1, 0, 0, 0];
        for (unit, raw) in self.units.iter().zip(fields) {
            match unit {
                TimeUnit::Year => year = raw.parse().map_err(|_| mismatch())?,
                other => parts[other.index() - 1] = raw.parse().map_err(|_| mismatch())?,
            }
        }

        let [month, day, hour, minute, second] = parts;
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .ok_or_else(|| BucketFormatError::InvalidTime(key.to_string()))
    }

    /// Like [`Self::parse_key`], but resolves a missing year against `now`.
    ///
    /// A year-less key that would land after `now` belongs to the previous
    /// year, which happens when the December bucket is flushed in January.
    pub fn parse_key_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, BucketFormatError> {
        let parsed = self.parse_key(key, now.year());
        if self.has_year() {
            return parsed;
        }
        match parsed {
            Ok(ts) if ts <= now => Ok(ts),
            // Feb 29 only exists in some years, so retry on error too
            _ => self.parse_key(key, now.year() - 1),
        }
    }

    /// Start of the bucket containing `ts`, with units finer than the format zeroed.
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let finest = self.finest();
        let keep = |unit: TimeUnit| unit <= finest;

        let month = if keep(TimeUnit::Month) { ts.month() } else { 1 };
        let day = if keep(TimeUnit::Day) { ts.day() } else { 1 };
        let hour = if keep(TimeUnit::Hour) { ts.hour() } else { 0 };
        let minute = if keep(TimeUnit::Minute) { ts.minute() } else { 0 };
        let second = if keep(TimeUnit::Second) { ts.second() } else { 0 };

        Utc.with_ymd_and_hms(ts.year(), month, day, hour, minute, second)
            .single()
            .unwrap_or(ts)
    }

    /// Timestamp one full bucket before `now`.
    ///
    /// Month and year buckets step back by calendar months, so the result
    /// always lands in the preceding bucket.
    pub fn previous_bucket(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.truncate(now);
        let stepped = match self.finest() {
            TimeUnit::Year => start.checked_sub_months(Months::new(12)),
            TimeUnit::Month => start.checked_sub_months(Months::new(1)),
            other => {
                let secs = i64::try_from(other.max_secs()).unwrap_or(i64::MAX);
                start.checked_sub_signed(chrono::Duration::seconds(secs))
            }
        };
        stepped.unwrap_or(start)
    }

    /// Start of the bucket after the one containing `ts`.
    pub fn next_bucket(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.truncate(ts);
        let stepped = match self.finest() {
            TimeUnit::Year => start.checked_add_months(Months::new(12)),
            TimeUnit::Month => start.checked_add_months(Months::new(1)),
            other => {
                let secs = i64::try_from(other.max_secs()).unwrap_or(i64::MAX);
                start.checked_add_signed(chrono::Duration::seconds(secs))
            }
        };
        stepped.unwrap_or(start)
    }

    /// Scheduler period: one finest unit, capped at one day.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.finest().max_secs().min(DAY_SECS))
    }

    /// TTL applied to a bucket hash on every increment: two buckets plus an hour.
    pub fn retention_seconds(&self) -> u64 {
        2 * self.finest().max_secs() + HOUR_SECS
    }

    /// False when keys fall back to the current year on parse.
    pub fn has_year(&self) -> bool {
        self.units.contains(&TimeUnit::Year)
    }
}
