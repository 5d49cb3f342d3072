use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Number of days in a month, `None` if `month` is not 1-12
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Some(31),
        4 | 6 | 9 | 11 => Some(30),
        2 if is_leap_year(year) => Some(29),
        2 => Some(28),
        _ => None,
    }
}

/// Check if a year is a leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Unit of a CF `"<unit> since <reference>"` time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

/// Parsed CF time units, e.g. `hours since 1970-01-01 00:00:00`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: NaiveDateTime,
}

impl TimeUnits {
    pub fn new(unit: TimeUnit, reference: NaiveDateTime) -> Self {
        Self { unit, reference }
    }

    /// Convert a timestamp to an offset in these units
    pub fn encode(&self, time: &NaiveDateTime) -> f64 {
        let delta = *time - self.reference;
        let seconds = delta.num_seconds() as f64
            + delta.subsec_nanos() as f64 / 1e9;
        seconds / self.unit.seconds()
    }

    /// A span of days expressed in these units
    pub fn from_days(&self, days: f64) -> f64 {
        days * TimeUnit::Days.seconds() / self.unit.seconds()
    }

    /// Convert an offset in these units back to a timestamp
    pub fn decode(&self, value: f64) -> NaiveDateTime {
        let millis = (value * self.unit.seconds() * 1000.0).round() as i64;
        self.reference + Duration::milliseconds(millis)
    }
}

impl FromStr for TimeUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (unit, reference) = s
            .trim()
            .split_once(" since ")
            .ok_or_else(|| format!("Could not parse time units: {}", s))?;

        let unit = match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "s" => TimeUnit::Seconds,
            "minute" | "minutes" | "min" => TimeUnit::Minutes,
            "hour" | "hours" | "h" => TimeUnit::Hours,
            "day" | "days" | "d" => TimeUnit::Days,
            other => return Err(format!("Unsupported time unit: {}", other)),
        };

        Ok(Self {
            unit,
            reference: parse_time_string(reference.trim())?,
        })
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.as_str(),
            self.reference.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Parse a reference time in the formats found in CF `units` attributes
pub fn parse_time_string(time_str: &str) -> Result<NaiveDateTime, String> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    for format in FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(time_str, format) {
            return Ok(time);
        }
    }

    NaiveDate::parse_from_str(time_str, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("Could not parse time string: {}", time_str))
}

/// Only calendars identical to the proleptic gregorian for our dates are supported
pub fn check_calendar(calendar: &str) -> Result<(), String> {
    match calendar.to_lowercase().as_str() {
        "gregorian" | "standard" | "proleptic_gregorian" => Ok(()),
        other => Err(format!("Unsupported calendar: {}", other)),
    }
}

pub fn date2num(times: &[NaiveDateTime], units: &TimeUnits) -> Vec<f64> {
    times.iter().map(|t| units.encode(t)).collect()
}

pub fn num2date(values: &[f64], units: &TimeUnits) -> Vec<NaiveDateTime> {
    values.iter().map(|&v| units.decode(v)).collect()
}

fn midnight(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Vegetation climatology time axis: three steps per month, ten days apart,
/// starting on the 10th of January.
pub fn climatology_times(year: i32, steps: usize, step_days: i64) -> Vec<NaiveDateTime> {
    let Some(start) = midnight(year, 1, 10) else {
        return Vec::new();
    };
    (0..steps)
        .map(|i| start + Duration::days(i as i64 * step_days))
        .collect()
}

/// Daily midnight timestamps from `start` to `end` inclusive
pub fn daily_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDateTime> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter_map(|d| d.and_hms_opt(0, 0, 0))
        .collect()
}

/// Day of year of a timestamp (1-based)
pub fn day_of_year(time: &NaiveDateTime) -> u32 {
    time.ordinal()
}
