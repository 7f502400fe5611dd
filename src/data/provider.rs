//! Record providers
//!
//! The engine consumes three record streams whose CRUD lives elsewhere.
//! `RecordProvider` is the read-only seam; `InMemoryStore` is the bundled
//! implementation used by the CLI and tests.

use crate::model::records::{CycleRecord, DailyLog, MetricPoint, MetricSeries};
use crate::model::session::Timeframe;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors from a record provider
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Record validation failed: {0}")]
    Validation(#[from] crate::model::records::RecordError),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Read-only access to a user's records, filtered to a timeframe
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Cycle records overlapping the timeframe, plus the most recent one
    /// starting before it (it may govern dates early in the window)
    async fn cycles(&self, user_id: &str, timeframe: &Timeframe)
        -> Result<Vec<CycleRecord>, DataError>;

    /// Daily logs dated inside the timeframe
    async fn daily_logs(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
    ) -> Result<Vec<DailyLog>, DataError>;

    /// Metric series trimmed to points inside the timeframe
    async fn metric_series(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
    ) -> Result<Vec<MetricSeries>, DataError>;
}

#[derive(Default)]
struct UserRecords {
    cycles: Vec<CycleRecord>,
    // Keyed by date: one logical log per user per date.
    logs: HashMap<chrono::NaiveDate, DailyLog>,
    series: HashMap<String, MetricSeries>,
}

/// In-memory record store
///
/// Enforces the one-log-per-date invariant: inserting a log for an
/// existing date replaces the earlier log.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserRecords>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cycle record after validation
    pub fn add_cycle(&self, user_id: &str, cycle: CycleRecord) -> Result<(), DataError> {
        cycle.validate()?;
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users
            .entry(user_id.to_string())
            .or_default()
            .cycles
            .push(cycle);
        Ok(())
    }

    /// Insert or replace the log for its date
    pub fn upsert_log(&self, user_id: &str, log: DailyLog) -> Result<(), DataError> {
        log.validate()?;
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users
            .entry(user_id.to_string())
            .or_default()
            .logs
            .insert(log.date, log);
        Ok(())
    }

    /// Append points to a named metric series, creating it on first use
    pub fn add_metric_points(
        &self,
        user_id: &str,
        template: &MetricSeries,
        points: Vec<MetricPoint>,
    ) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let series = users
            .entry(user_id.to_string())
            .or_default()
            .series
            .entry(template.name.clone())
            .or_insert_with(|| {
                MetricSeries::new(template.name.clone(), template.unit.clone(), template.kind)
            });
        series.points.extend(points);
        series.points.sort_by_key(|p| p.timestamp);
    }

    /// Number of daily logs stored for a user
    pub fn log_count(&self, user_id: &str) -> usize {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(user_id).map(|u| u.logs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RecordProvider for InMemoryStore {
    async fn cycles(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
    ) -> Result<Vec<CycleRecord>, DataError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let Some(records) = users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut cycles: Vec<CycleRecord> = records
            .cycles
            .iter()
            .filter(|c| c.start <= timeframe.end && c.covers(timeframe.start.max(c.start)))
            .cloned()
            .collect();

        // The newest cycle starting before the window still governs its
        // early dates even if its interval ended; keep it available.
        if let Some(prior) = records
            .cycles
            .iter()
            .filter(|c| c.start < timeframe.start)
            .max_by_key(|c| c.start)
        {
            if !cycles.iter().any(|c| c.start == prior.start) {
                cycles.push(prior.clone());
            }
        }

        cycles.sort_by_key(|c| c.start);
        Ok(cycles)
    }

    async fn daily_logs(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
    ) -> Result<Vec<DailyLog>, DataError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let Some(records) = users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut logs: Vec<DailyLog> = records
            .logs
            .values()
            .filter(|l| timeframe.contains(l.date))
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    async fn metric_series(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
    ) -> Result<Vec<MetricSeries>, DataError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let Some(records) = users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut series: Vec<MetricSeries> = records
            .series
            .values()
            .map(|s| {
                let mut trimmed = MetricSeries::new(s.name.clone(), s.unit.clone(), s.kind);
                trimmed.points = s
                    .points
                    .iter()
                    .filter(|p| timeframe.contains(p.timestamp.date_naive()))
                    .copied()
                    .collect();
                trimmed
            })
            .filter(|s| !s.points.is_empty())
            .collect();
        series.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::records::MetricKind;
    use crate::model::session::Granularity;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn timeframe() -> Timeframe {
        Timeframe {
            start: d(2024, 1, 1),
            end: d(2024, 1, 31),
            granularity: Granularity::Month,
        }
    }

    #[tokio::test]
    async fn test_same_date_log_replaces() {
        let store = InMemoryStore::new();
        store
            .upsert_log("u1", DailyLog::new(d(2024, 1, 5)).mood(4))
            .unwrap();
        store
            .upsert_log("u1", DailyLog::new(d(2024, 1, 5)).mood(8))
            .unwrap();

        let logs = store.daily_logs("u1", &timeframe()).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].mood, Some(8));
    }

    #[tokio::test]
    async fn test_logs_filtered_and_ordered() {
        let store = InMemoryStore::new();
        store.upsert_log("u1", DailyLog::new(d(2024, 2, 1))).unwrap();
        store.upsert_log("u1", DailyLog::new(d(2024, 1, 20))).unwrap();
        store.upsert_log("u1", DailyLog::new(d(2024, 1, 5))).unwrap();

        let logs = store.daily_logs("u1", &timeframe()).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].date, d(2024, 1, 5));
        assert_eq!(logs[1].date, d(2024, 1, 20));
    }

    #[tokio::test]
    async fn test_invalid_log_rejected() {
        let store = InMemoryStore::new();
        let result = store.upsert_log("u1", DailyLog::new(d(2024, 1, 5)).mood(11));
        assert!(matches!(result, Err(DataError::Validation(_))));
    }

    #[tokio::test]
    async fn test_prior_cycle_included_for_window_start() {
        let store = InMemoryStore::new();
        store
            .add_cycle("u1", CycleRecord::new(d(2023, 12, 20)))
            .unwrap();

        let cycles = store.cycles("u1", &timeframe()).await.unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].start, d(2023, 12, 20));
    }

    #[tokio::test]
    async fn test_metric_series_trimmed_to_window() {
        let store = InMemoryStore::new();
        let template = MetricSeries::new("steps", "count", MetricKind::Counter);
        store.add_metric_points(
            "u1",
            &template,
            vec![
                MetricPoint {
                    timestamp: Utc.with_ymd_and_hms(2023, 12, 30, 9, 0, 0).unwrap(),
                    value: 4000.0,
                },
                MetricPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
                    value: 6000.0,
                },
            ],
        );

        let series = store.metric_series("u1", &timeframe()).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].points.len(), 1);
        assert_eq!(series[0].points[0].value, 6000.0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_empty_not_error() {
        let store = InMemoryStore::new();
        assert!(store.cycles("nobody", &timeframe()).await.unwrap().is_empty());
        assert!(store
            .daily_logs("nobody", &timeframe())
            .await
            .unwrap()
            .is_empty());
    }
}
