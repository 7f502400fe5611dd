//! File import
//!
//! Loads the three record streams from files: daily logs and metric
//! points from CSV, cycle records from JSON. Row failures are collected
//! with their line numbers rather than aborting the whole import.
//!
//! Daily log CSV columns: `date,mood,energy,sleep_quality,stress,symptoms,notes`
//! (symptoms separated by `;`, empty cells allowed).
//! Metric CSV columns: `timestamp,metric,value,unit,kind`
//! (`kind` is `counter` or `gauge`, defaulting to gauge).

use crate::data::provider::InMemoryStore;
use crate::model::records::{
    CycleRecord, DailyLog, MetricKind, MetricPoint, MetricSeries,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Import failures that abort a file load
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One rejected row
#[derive(Debug, Clone)]
pub struct RowError {
    /// 1-indexed line in the source file, header included
    pub line: usize,
    pub error: String,
}

/// Outcome of one file import
#[derive(Debug, Default)]
pub struct ImportReport {
    pub rows_imported: usize,
    pub rows_failed: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    fn reject(&mut self, line: usize, error: impl Into<String>) {
        self.rows_failed += 1;
        self.errors.push(RowError {
            line,
            error: error.into(),
        });
    }
}

/// Load daily logs from CSV into the store
pub fn import_daily_logs_csv(
    store: &InMemoryStore,
    user_id: &str,
    path: &Path,
) -> Result<ImportReport, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ImportError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;

    let mut report = ImportReport::default();

    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2; // 1-indexed, after the header row
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                report.reject(line, e.to_string());
                continue;
            }
        };

        match parse_log_row(&record) {
            Ok(log) => match store.upsert_log(user_id, log) {
                Ok(()) => report.rows_imported += 1,
                Err(e) => report.reject(line, e.to_string()),
            },
            Err(e) => report.reject(line, e),
        }
    }

    tracing::info!(
        user = user_id,
        imported = report.rows_imported,
        failed = report.rows_failed,
        "Daily log import complete"
    );
    Ok(report)
}

fn parse_log_row(record: &csv::StringRecord) -> Result<DailyLog, String> {
    let date_str = record.get(0).ok_or("missing date column")?;
    let date = parse_date(date_str)?;

    let mut log = DailyLog::new(date);
    log.mood = parse_rating(record.get(1))?;
    log.energy = parse_rating(record.get(2))?;
    log.sleep_quality = parse_rating(record.get(3))?;
    log.stress = parse_rating(record.get(4))?;

    if let Some(symptoms) = record.get(5) {
        log.symptoms = symptoms
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(notes) = record.get(6) {
        if !notes.trim().is_empty() {
            log.notes = Some(notes.trim().to_string());
        }
    }

    Ok(log)
}

fn parse_rating(cell: Option<&str>) -> Result<Option<u8>, String> {
    match cell.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<u8>()
            .map(Some)
            .map_err(|_| format!("invalid rating '{}'", v)),
    }
}

/// Load metric points from CSV into the store
pub fn import_metrics_csv(
    store: &InMemoryStore,
    user_id: &str,
    path: &Path,
) -> Result<ImportReport, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ImportError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;

    let mut report = ImportReport::default();
    let mut batches: HashMap<String, (MetricSeries, Vec<MetricPoint>)> = HashMap::new();

    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                report.reject(line, e.to_string());
                continue;
            }
        };

        match parse_metric_row(&record) {
            Ok((series, point)) => {
                batches
                    .entry(series.name.clone())
                    .or_insert_with(|| (series, Vec::new()))
                    .1
                    .push(point);
                report.rows_imported += 1;
            }
            Err(e) => report.reject(line, e),
        }
    }

    for (template, points) in batches.into_values() {
        store.add_metric_points(user_id, &template, points);
    }

    tracing::info!(
        user = user_id,
        imported = report.rows_imported,
        failed = report.rows_failed,
        "Metric import complete"
    );
    Ok(report)
}

fn parse_metric_row(record: &csv::StringRecord) -> Result<(MetricSeries, MetricPoint), String> {
    let ts_str = record.get(0).ok_or("missing timestamp column")?;
    let timestamp = parse_timestamp(ts_str)?;
    let name = record
        .get(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing metric name")?;
    let value: f64 = record
        .get(2)
        .map(str::trim)
        .ok_or("missing value column")?
        .parse()
        .map_err(|_| format!("invalid value '{}'", record.get(2).unwrap_or("")))?;

    let unit = record.get(3).map(str::trim).unwrap_or("").to_string();
    let kind = match record.get(4).map(str::trim) {
        Some("counter") => MetricKind::Counter,
        Some("gauge") | Some("") | None => MetricKind::Gauge,
        Some(other) => return Err(format!("invalid metric kind '{}'", other)),
    };

    Ok((
        MetricSeries::new(name, unit, kind),
        MetricPoint { timestamp, value },
    ))
}

/// Load cycle records from a JSON array
pub fn import_cycles_json(
    store: &InMemoryStore,
    user_id: &str,
    path: &Path,
) -> Result<ImportReport, ImportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let cycles: Vec<CycleRecord> =
        serde_json::from_str(&content).map_err(|e| ImportError::Json {
            path: path.display().to_string(),
            source: e,
        })?;

    let mut report = ImportReport::default();
    for (idx, cycle) in cycles.into_iter().enumerate() {
        match store.add_cycle(user_id, cycle) {
            Ok(()) => report.rows_imported += 1,
            Err(e) => report.reject(idx + 1, e.to_string()),
        }
    }

    tracing::info!(
        user = user_id,
        imported = report.rows_imported,
        failed = report.rows_failed,
        "Cycle import complete"
    );
    Ok(report)
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(format!("invalid date '{}'", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        // Date-only rows land at noon UTC so they bucket to the right day.
        return Ok(date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc());
    }
    Err(format!("invalid timestamp '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::RecordProvider;
    use crate::model::session::{Granularity, Timeframe};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn timeframe() -> Timeframe {
        Timeframe {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            granularity: Granularity::Year,
        }
    }

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_import_daily_logs() {
        let csv = "date,mood,energy,sleep_quality,stress,symptoms,notes\n\
                   2024-01-05,7,6,8,3,headache;fatigue,long day\n\
                   2024-01-06,8,,,,,\n";
        let file = write_file(csv);
        let store = InMemoryStore::new();

        let report = import_daily_logs_csv(&store, "u1", file.path()).unwrap();
        assert_eq!(report.rows_imported, 2);
        assert_eq!(report.rows_failed, 0);

        let logs = store.daily_logs("u1", &timeframe()).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].mood, Some(7));
        assert_eq!(logs[0].symptoms, vec!["headache", "fatigue"]);
        assert_eq!(logs[0].notes.as_deref(), Some("long day"));
        assert_eq!(logs[1].energy, None);
    }

    #[tokio::test]
    async fn test_invalid_mood_reported_with_line_number() {
        let csv = "date,mood,energy,sleep_quality,stress,symptoms,notes\n\
                   2024-01-05,7,,,,,\n\
                   2024-01-06,15,,,,,\n";
        let file = write_file(csv);
        let store = InMemoryStore::new();

        let report = import_daily_logs_csv(&store, "u1", file.path()).unwrap();
        assert_eq!(report.rows_imported, 1);
        assert_eq!(report.rows_failed, 1);
        assert_eq!(report.errors[0].line, 3);

        let logs = store.daily_logs("u1", &timeframe()).await.unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_import_metrics_with_kinds() {
        let csv = "timestamp,metric,value,unit,kind\n\
                   2024-01-05T08:00:00Z,steps,4000,count,counter\n\
                   2024-01-05T20:00:00Z,steps,3000,count,counter\n\
                   2024-01-05,sleep_hours,7.5,hours,gauge\n";
        let file = write_file(csv);
        let store = InMemoryStore::new();

        let report = import_metrics_csv(&store, "u1", file.path()).unwrap();
        assert_eq!(report.rows_imported, 3);

        let series = store.metric_series("u1", &timeframe()).await.unwrap();
        assert_eq!(series.len(), 2);
        let steps = series.iter().find(|s| s.name == "steps").unwrap();
        assert_eq!(steps.kind, MetricKind::Counter);
        let daily = steps.daily_values();
        assert_eq!(daily[&NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()], 7000.0);
    }

    #[tokio::test]
    async fn test_import_cycles_json() {
        let json = r#"[
            {"start": "2024-01-01", "period_length": 5},
            {"start": "2024-01-29", "cycle_length": 30}
        ]"#;
        let file = write_file(json);
        let store = InMemoryStore::new();

        let report = import_cycles_json(&store, "u1", file.path()).unwrap();
        assert_eq!(report.rows_imported, 2);

        let cycles = store.cycles("u1", &timeframe()).await.unwrap();
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn test_bad_json_is_a_file_error() {
        let file = write_file("not json");
        let store = InMemoryStore::new();
        let result = import_cycles_json(&store, "u1", file.path());
        assert!(matches!(result, Err(ImportError::Json { .. })));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-01-05").is_ok());
        assert!(parse_date("01/05/2024").is_ok());
        assert!(parse_date("yesterday").is_err());
    }
}
