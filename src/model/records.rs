//! Input record types
//!
//! The three record streams this engine consumes:
//! - `CycleRecord`: one menstrual cycle (start date required, the rest optional)
//! - `DailyLog`: one symptom/mood log per user per date
//! - `MetricSeries`: a named wearable metric as (timestamp, value) pairs
//!
//! CRUD for these lives elsewhere; from this crate's perspective they are
//! read-only inputs.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default cycle length (days) when a record carries none.
pub const DEFAULT_CYCLE_LENGTH: u32 = 28;

/// Default period length (days) when a record carries none.
pub const DEFAULT_PERIOD_LENGTH: u32 = 5;

/// Menstrual flow intensity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowIntensity {
    Spotting,
    Light,
    Medium,
    Heavy,
}

/// One recorded menstrual cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleRecord {
    /// First day of the cycle
    pub start: NaiveDate,
    /// Last day of the cycle, if known
    #[serde(default)]
    pub end: Option<NaiveDate>,
    /// Total cycle length in days, if known
    #[serde(default)]
    pub cycle_length: Option<u32>,
    /// Length of the menstrual period in days, if known
    #[serde(default)]
    pub period_length: Option<u32>,
    /// Flow intensity, if recorded
    #[serde(default)]
    pub flow: Option<FlowIntensity>,
    /// Symptoms noted for the cycle as a whole
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl CycleRecord {
    /// Create a cycle record with only a start date
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            end: None,
            cycle_length: None,
            period_length: None,
            flow: None,
            symptoms: Vec::new(),
            notes: None,
        }
    }

    /// Builder method: set the end date
    pub fn end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method: set the cycle length in days
    pub fn cycle_length(mut self, days: u32) -> Self {
        self.cycle_length = Some(days);
        self
    }

    /// Builder method: set the period length in days
    pub fn period_length(mut self, days: u32) -> Self {
        self.period_length = Some(days);
        self
    }

    /// Effective cycle length: explicit length, end-derived span, or the default
    pub fn effective_length(&self) -> u32 {
        if let Some(len) = self.cycle_length {
            return len.max(1);
        }
        if let Some(end) = self.end {
            let span = (end - self.start).num_days() + 1;
            if span > 0 {
                return span as u32;
            }
        }
        DEFAULT_CYCLE_LENGTH
    }

    /// Effective period length, falling back to the default
    pub fn effective_period_length(&self) -> u32 {
        self.period_length.unwrap_or(DEFAULT_PERIOD_LENGTH).max(1)
    }

    /// Whether `date` falls inside this cycle's interval
    ///
    /// The interval is `[start, end]` when an end date exists, otherwise
    /// `[start, start + effective_length)`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date < self.start {
            return false;
        }
        match self.end {
            Some(end) => date <= end,
            None => (date - self.start).num_days() < self.effective_length() as i64,
        }
    }

    /// Validate internal consistency
    pub fn validate(&self) -> Result<(), RecordError> {
        if let Some(end) = self.end {
            if end <= self.start {
                return Err(RecordError::InvalidCycleInterval {
                    start: self.start,
                    end,
                });
            }
        }
        Ok(())
    }
}

/// One daily symptom/mood log
///
/// There is one logical log per user per date: later writes replace the
/// earlier log for that date, they never duplicate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLog {
    pub date: NaiveDate,
    /// Symptom names as logged (matched case-insensitively)
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Mood rating, 1-10
    #[serde(default)]
    pub mood: Option<u8>,
    /// Energy level, 1-10
    #[serde(default)]
    pub energy: Option<u8>,
    /// Sleep quality, 1-10
    #[serde(default)]
    pub sleep_quality: Option<u8>,
    /// Stress level, 1-10
    #[serde(default)]
    pub stress: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DailyLog {
    /// Create an empty log for a date
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            symptoms: Vec::new(),
            mood: None,
            energy: None,
            sleep_quality: None,
            stress: None,
            notes: None,
        }
    }

    /// Builder method: set mood rating
    pub fn mood(mut self, rating: u8) -> Self {
        self.mood = Some(rating);
        self
    }

    /// Builder method: set stress level
    pub fn stress(mut self, level: u8) -> Self {
        self.stress = Some(level);
        self
    }

    /// Builder method: add a symptom
    pub fn symptom(mut self, name: impl Into<String>) -> Self {
        self.symptoms.push(name.into());
        self
    }

    /// Whether this log mentions a symptom (case-insensitive)
    pub fn has_symptom(&self, name: &str) -> bool {
        self.symptoms.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Validate rating ranges (1-10 where present)
    pub fn validate(&self) -> Result<(), RecordError> {
        for (field, value) in [
            ("mood", self.mood),
            ("energy", self.energy),
            ("sleep_quality", self.sleep_quality),
            ("stress", self.stress),
        ] {
            if let Some(v) = value {
                if !(1..=10).contains(&v) {
                    return Err(RecordError::RatingOutOfRange {
                        field: field.to_string(),
                        value: v,
                    });
                }
            }
        }
        Ok(())
    }
}

/// How daily aggregation treats a metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Accumulating counts (steps, calories): daily value is the sum
    Counter,
    /// Continuous signals (heart rate, sleep hours): daily value is the mean
    Gauge,
}

/// A single metric measurement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A named wearable metric as a time-ordered series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSeries {
    /// Metric name (steps, heart_rate, sleep_hours, ...)
    pub name: String,
    /// Unit of measure, for display
    #[serde(default)]
    pub unit: String,
    pub kind: MetricKind,
    pub points: Vec<MetricPoint>,
}

/// Per-day summary of a metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyStat {
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl MetricSeries {
    /// Create an empty series
    pub fn new(name: impl Into<String>, unit: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            kind,
            points: Vec::new(),
        }
    }

    /// Builder method: append a point
    pub fn point(mut self, timestamp: DateTime<Utc>, value: f64) -> Self {
        self.points.push(MetricPoint { timestamp, value });
        self
    }

    /// Aggregate to one value per UTC day: sum for counters, mean for gauges
    pub fn daily_values(&self) -> BTreeMap<NaiveDate, f64> {
        self.daily_stats()
            .into_iter()
            .map(|(d, s)| (d, s.value))
            .collect()
    }

    /// Aggregate to per-day summaries including min/max
    pub fn daily_stats(&self) -> BTreeMap<NaiveDate, DailyStat> {
        let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for p in &self.points {
            buckets
                .entry(p.timestamp.date_naive())
                .or_default()
                .push(p.value);
        }

        buckets
            .into_iter()
            .map(|(date, values)| {
                let sum: f64 = values.iter().sum();
                let value = match self.kind {
                    MetricKind::Counter => sum,
                    MetricKind::Gauge => sum / values.len() as f64,
                };
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (
                    date,
                    DailyStat {
                        value,
                        min,
                        max,
                        samples: values.len(),
                    },
                )
            })
            .collect()
    }

    /// Most recent daily value, if any
    pub fn latest_daily_value(&self) -> Option<(NaiveDate, f64)> {
        self.daily_values().into_iter().next_back()
    }
}

/// Whether a date is a Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(
        date.weekday(),
        chrono::Weekday::Sat | chrono::Weekday::Sun
    )
}

/// Input record validation errors
#[derive(Debug, Error)]
pub enum RecordError {
    /// Cycle end date does not follow its start date
    #[error("Invalid cycle interval: start {start} must precede end {end}")]
    InvalidCycleInterval { start: NaiveDate, end: NaiveDate },

    /// Rating outside the 1-10 scale
    #[error("Rating out of range: {field}={value} (expected 1-10)")]
    RatingOutOfRange { field: String, value: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_cycle_covers_open_ended() {
        let cycle = CycleRecord::new(d(2024, 1, 1));
        assert!(cycle.covers(d(2024, 1, 1)));
        assert!(cycle.covers(d(2024, 1, 28)));
        assert!(!cycle.covers(d(2024, 1, 29)));
        assert!(!cycle.covers(d(2023, 12, 31)));
    }

    #[test]
    fn test_cycle_covers_with_end() {
        let cycle = CycleRecord::new(d(2024, 1, 1)).end(d(2024, 1, 30));
        assert!(cycle.covers(d(2024, 1, 30)));
        assert!(!cycle.covers(d(2024, 1, 31)));
    }

    #[test]
    fn test_cycle_validate_rejects_inverted_interval() {
        let cycle = CycleRecord::new(d(2024, 2, 1)).end(d(2024, 1, 1));
        assert!(cycle.validate().is_err());
    }

    #[test]
    fn test_effective_length_from_end_date() {
        let cycle = CycleRecord::new(d(2024, 1, 1)).end(d(2024, 1, 30));
        assert_eq!(cycle.effective_length(), 30);
    }

    #[test]
    fn test_log_symptom_match_is_case_insensitive() {
        let log = DailyLog::new(d(2024, 1, 3)).symptom("Headache");
        assert!(log.has_symptom("headache"));
        assert!(!log.has_symptom("cramps"));
    }

    #[test]
    fn test_log_validate_rejects_out_of_range_mood() {
        let log = DailyLog::new(d(2024, 1, 3)).mood(11);
        assert!(log.validate().is_err());
        let log = DailyLog::new(d(2024, 1, 3)).mood(10);
        assert!(log.validate().is_ok());
    }

    #[test]
    fn test_counter_daily_aggregation_sums() {
        let ts = |h| Utc.with_ymd_and_hms(2024, 1, 5, h, 0, 0).unwrap();
        let series = MetricSeries::new("steps", "count", MetricKind::Counter)
            .point(ts(8), 1000.0)
            .point(ts(12), 2500.0)
            .point(ts(18), 1500.0);

        let daily = series.daily_values();
        assert_eq!(daily[&d(2024, 1, 5)], 5000.0);
    }

    #[test]
    fn test_gauge_daily_aggregation_averages() {
        let ts = |h| Utc.with_ymd_and_hms(2024, 1, 5, h, 0, 0).unwrap();
        let series = MetricSeries::new("heart_rate", "bpm", MetricKind::Gauge)
            .point(ts(8), 60.0)
            .point(ts(12), 70.0)
            .point(ts(18), 80.0);

        let stats = series.daily_stats();
        let stat = stats[&d(2024, 1, 5)];
        assert_eq!(stat.value, 70.0);
        assert_eq!(stat.min, 60.0);
        assert_eq!(stat.max, 80.0);
        assert_eq!(stat.samples, 3);
    }

    #[test]
    fn test_is_weekend() {
        assert!(is_weekend(d(2024, 1, 6))); // Saturday
        assert!(is_weekend(d(2024, 1, 7))); // Sunday
        assert!(!is_weekend(d(2024, 1, 8))); // Monday
    }
}
