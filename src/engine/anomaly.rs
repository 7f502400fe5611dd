//! Anomaly detection
//!
//! Scores a metric's latest daily value against an expected baseline
//! built from the trailing window. The score is a relative deviation from
//! the baseline: 0 means exactly as expected, 1.0 means 100% off.

use crate::config::AnomalyConfig;
use crate::engine::advice::action_for_anomaly;
use crate::model::derived::{Anomaly, Severity, Urgency};
use crate::model::records::MetricSeries;
use chrono::NaiveDate;

/// Result of one anomaly detection pass
#[derive(Debug, Clone)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    /// Metrics that had enough baseline history to be scored
    pub metrics_scored: usize,
    /// Metrics skipped for insufficient baseline samples
    pub metrics_skipped: usize,
}

impl AnomalyReport {
    /// Confidence that scored metrics are within expectation, 0-1
    ///
    /// 1.0 when every scored metric sat on its baseline, decreasing as
    /// deviations grow.
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.metrics_scored == 0 {
            return None;
        }
        if self.anomalies.is_empty() {
            return Some(1.0);
        }
        let mean_score: f64 =
            self.anomalies.iter().map(|a| a.score).sum::<f64>() / self.anomalies.len() as f64;
        Some((1.0 - mean_score).clamp(0.0, 1.0))
    }
}

/// Expected baseline for a metric
#[derive(Debug, Clone, Copy)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub samples: usize,
}

/// Scores observations against trailing baselines
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    /// Create a detector with the given thresholds
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Score the latest daily value of every series against its own
    /// trailing baseline
    ///
    /// Metrics whose latest value sits below the medium-severity cutoff
    /// are considered in range and produce no anomaly. Metrics without
    /// enough baseline history are skipped, not scored.
    pub fn detect_all(&self, series: &[MetricSeries]) -> AnomalyReport {
        let mut anomalies = Vec::new();
        let mut metrics_scored = 0;
        let mut metrics_skipped = 0;

        for s in series {
            let daily: Vec<(NaiveDate, f64)> = s.daily_values().into_iter().collect();
            let Some((&(date, latest), history)) = daily.split_last() else {
                metrics_skipped += 1;
                continue;
            };

            // Baseline excludes the value under test.
            let window_start = history.len().saturating_sub(self.config.baseline_days);
            let window: Vec<f64> = history[window_start..].iter().map(|&(_, v)| v).collect();

            if window.len() < self.config.min_baseline_samples {
                metrics_skipped += 1;
                tracing::debug!(
                    metric = %s.name,
                    baseline_samples = window.len(),
                    min = self.config.min_baseline_samples,
                    "Skipping metric with insufficient baseline"
                );
                continue;
            }
            metrics_scored += 1;

            let baseline = compute_baseline(&window);
            if let Some(anomaly) = self.score(&s.name, latest, date, baseline) {
                anomalies.push(anomaly);
            }
        }

        anomalies.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        AnomalyReport {
            anomalies,
            metrics_scored,
            metrics_skipped,
        }
    }

    /// Score one observation against an expected baseline
    ///
    /// Returns `None` when the deviation stays below the medium cutoff
    /// (the reading is within expectation).
    pub fn score(
        &self,
        metric: &str,
        value: f64,
        date: NaiveDate,
        baseline: Baseline,
    ) -> Option<Anomaly> {
        let score = anomaly_score(value, baseline.mean);
        let severity = self.severity_for(score);

        if score < self.config.medium_score {
            return None;
        }

        tracing::debug!(
            metric,
            value,
            expected = baseline.mean,
            score,
            severity = %severity,
            "Anomalous reading"
        );

        Some(Anomaly {
            metric: metric.to_string(),
            detected_value: value,
            expected_value: baseline.mean,
            score,
            severity,
            urgency: Urgency::from_severity(severity),
            recommended_action: action_for_anomaly(metric, severity),
            detected_on: date,
            is_synthetic: false,
        })
    }

    /// Severity bucket for a deviation score
    pub fn severity_for(&self, score: f64) -> Severity {
        if score >= self.config.critical_score {
            Severity::Critical
        } else if score >= self.config.high_score {
            Severity::High
        } else if score >= self.config.medium_score {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Normalized deviation of a value from its expected baseline
///
/// Relative deviation `|value - expected| / |expected|`; falls back to the
/// absolute difference when the baseline is ~zero so a flat-zero history
/// still flags a sudden reading.
pub fn anomaly_score(value: f64, expected: f64) -> f64 {
    let diff = (value - expected).abs();
    if expected.abs() < f64::EPSILON {
        return diff;
    }
    diff / expected.abs()
}

/// Trailing mean and standard deviation of a window
pub fn compute_baseline(window: &[f64]) -> Baseline {
    let n = window.len();
    let mean = window.iter().sum::<f64>() / n as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    Baseline {
        mean,
        std_dev: variance.sqrt(),
        samples: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::records::MetricKind;
    use chrono::{TimeZone, Utc};

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(AnomalyConfig::default())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_value_on_baseline_scores_zero_low() {
        let baseline = Baseline {
            mean: 8000.0,
            std_dev: 500.0,
            samples: 14,
        };
        let score = anomaly_score(8000.0, baseline.mean);
        assert_eq!(score, 0.0);
        assert_eq!(detector().severity_for(score), Severity::Low);
        // In-range readings produce no anomaly record at all.
        assert!(detector().score("steps", 8000.0, date(), baseline).is_none());
    }

    #[test]
    fn test_severity_buckets() {
        let d = detector();
        assert_eq!(d.severity_for(0.1), Severity::Low);
        assert_eq!(d.severity_for(0.3), Severity::Medium);
        assert_eq!(d.severity_for(0.7), Severity::High);
        assert_eq!(d.severity_for(1.5), Severity::Critical);
    }

    #[test]
    fn test_large_deviation_is_flagged_with_urgency() {
        let baseline = Baseline {
            mean: 8000.0,
            std_dev: 500.0,
            samples: 14,
        };
        let anomaly = detector().score("steps", 900.0, date(), baseline).unwrap();
        assert!(anomaly.score > 0.5);
        assert_eq!(anomaly.urgency, Urgency::Immediate);
        assert_eq!(anomaly.expected_value, 8000.0);
        assert!(!anomaly.recommended_action.is_empty());
    }

    #[test]
    fn test_zero_baseline_uses_absolute_difference() {
        assert_eq!(anomaly_score(3.0, 0.0), 3.0);
    }

    #[test]
    fn test_detect_all_skips_short_history() {
        let ts = |i: i64| {
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::days(i)
        };
        let mut series = MetricSeries::new("heart_rate", "bpm", MetricKind::Gauge);
        for i in 0..4 {
            series = series.point(ts(i), 60.0);
        }

        let report = detector().detect_all(&[series]);
        assert_eq!(report.metrics_scored, 0);
        assert_eq!(report.metrics_skipped, 1);
        assert!(report.mean_confidence().is_none());
    }

    #[test]
    fn test_detect_all_flags_spike_in_latest_day() {
        let ts = |i: i64| {
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::days(i)
        };
        let mut series = MetricSeries::new("heart_rate", "bpm", MetricKind::Gauge);
        for i in 0..14 {
            series = series.point(ts(i), 60.0);
        }
        series = series.point(ts(14), 95.0);

        let report = detector().detect_all(&[series]);
        assert_eq!(report.metrics_scored, 1);
        assert_eq!(report.anomalies.len(), 1);
        let anomaly = &report.anomalies[0];
        assert_eq!(anomaly.metric, "heart_rate");
        assert_eq!(anomaly.expected_value, 60.0);
        assert!((anomaly.score - 35.0 / 60.0).abs() < 1e-9);
        assert_eq!(anomaly.severity, Severity::High);
    }

    #[test]
    fn test_steady_metric_reports_full_confidence() {
        let ts = |i: i64| {
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::days(i)
        };
        let mut series = MetricSeries::new("sleep_hours", "hours", MetricKind::Gauge);
        for i in 0..14 {
            series = series.point(ts(i), 7.5);
        }

        let report = detector().detect_all(&[series]);
        assert!(report.anomalies.is_empty());
        assert_eq!(report.mean_confidence(), Some(1.0));
    }

    #[test]
    fn test_compute_baseline() {
        let baseline = compute_baseline(&[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(baseline.mean, 5.0);
        assert_eq!(baseline.samples, 4);
        assert!((baseline.std_dev - 5.0_f64.sqrt()).abs() < 1e-9);
    }
}
