//! Pattern detection
//!
//! Aggregates symptom occurrences by cycle day to find recurring
//! symptom/cycle-window associations. A pure function of (logs, cycles,
//! config): patterns are fully recomputed each run, never incrementally
//! patched.

use crate::config::PatternConfig;
use crate::cycle::CycleContextResolver;
use crate::engine::advice::advice_for_symptom;
use crate::model::derived::{Pattern, Severity};
use crate::model::records::{CycleRecord, DailyLog};
use chrono::Duration;
use std::collections::BTreeSet;

/// Result of one pattern detection pass
///
/// An empty `patterns` list with `sample_size < min_required` means
/// insufficient data, which is a normal outcome and not an error.
#[derive(Debug, Clone)]
pub struct PatternReport {
    pub patterns: Vec<Pattern>,
    /// Distinct logged days seen
    pub sample_size: usize,
    /// The configured minimum before detection runs
    pub min_required: usize,
}

impl PatternReport {
    /// Whether enough data was available to attempt detection
    pub fn sufficient(&self) -> bool {
        self.sample_size >= self.min_required
    }

    /// Mean confidence of reported patterns, 0-1
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.patterns.is_empty() {
            return None;
        }
        let sum: f64 = self.patterns.iter().map(|p| p.confidence).sum();
        Some(sum / self.patterns.len() as f64 / 100.0)
    }
}

/// Detects recurring symptom patterns against cycle days
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    /// Create a detector with the given thresholds
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    /// Detect recurring symptom patterns
    ///
    /// For each vocabulary symptom, collects the cycle day of every log
    /// mentioning it. Probability is relative to days actually logged,
    /// not calendar days. Results are sorted by probability descending
    /// and truncated to the configured maximum.
    pub fn detect(&self, logs: &[DailyLog], cycles: &[CycleRecord]) -> PatternReport {
        let distinct_days: BTreeSet<_> = logs.iter().map(|l| l.date).collect();
        let sample_size = distinct_days.len();

        if sample_size < self.config.min_logs {
            tracing::debug!(
                logs = sample_size,
                min = self.config.min_logs,
                "Insufficient logs for pattern detection"
            );
            return PatternReport {
                patterns: Vec::new(),
                sample_size,
                min_required: self.config.min_logs,
            };
        }

        let latest_start = CycleContextResolver::latest_cycle(cycles).map(|c| c.start);
        let mut patterns = Vec::new();

        for symptom in &self.config.symptom_vocabulary {
            let cycle_days: Vec<u32> = logs
                .iter()
                .filter(|log| log.has_symptom(symptom))
                .filter_map(|log| CycleContextResolver::resolve(log.date, cycles).cycle_day)
                .collect();

            let occurrences = cycle_days.len();
            if occurrences < self.config.min_occurrences {
                continue;
            }

            // Plain arithmetic mean of cycle days. Occurrences straddling a
            // cycle boundary (say days 27 and 2) average to mid-cycle, which
            // is a known limitation of this heuristic.
            let mean_day =
                cycle_days.iter().map(|&d| d as f64).sum::<f64>() / occurrences as f64;

            let probability = occurrences as f64 / sample_size as f64 * 100.0;
            let confidence = (occurrences as f64 * self.config.confidence_per_occurrence)
                .min(self.config.confidence_cap);

            let severity = if probability > self.config.high_probability {
                Severity::High
            } else if probability > self.config.medium_probability {
                Severity::Medium
            } else {
                Severity::Low
            };

            // Predicted next occurrence is anchored only to the latest cycle.
            let predicted_next = latest_start
                .map(|start| start + Duration::days(mean_day.round() as i64 - 1));

            let advice = advice_for_symptom(symptom);

            patterns.push(Pattern {
                symptom: symptom.clone(),
                mean_cycle_day: mean_day,
                cycle_days,
                occurrences,
                probability,
                confidence,
                predicted_next,
                severity,
                trigger_factors: advice.trigger_factors,
                prevention_tips: advice.prevention_tips,
                is_synthetic: false,
            });
        }

        patterns.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        patterns.truncate(self.config.max_patterns);

        tracing::debug!(
            patterns = patterns.len(),
            logged_days = sample_size,
            "Pattern detection complete"
        );

        PatternReport {
            patterns,
            sample_size,
            min_required: self.config.min_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn detector() -> PatternDetector {
        PatternDetector::new(PatternConfig::default())
    }

    #[test]
    fn test_fewer_than_min_logs_returns_empty() {
        let cycles = vec![CycleRecord::new(d(2024, 1, 1))];
        let logs: Vec<DailyLog> = (1..=9)
            .map(|i| DailyLog::new(d(2024, 1, i)).symptom("headache"))
            .collect();

        let report = detector().detect(&logs, &cycles);
        assert!(report.patterns.is_empty());
        assert!(!report.sufficient());
        assert_eq!(report.sample_size, 9);
        assert_eq!(report.min_required, 10);
    }

    #[test]
    fn test_headache_pattern_matches_worked_example() {
        // 12 distinct logs, headache on cycle days 3, 4, 17, 18.
        let cycles = vec![CycleRecord::new(d(2024, 1, 1))];
        let mut logs = Vec::new();
        for day in 1..=12u32 {
            let mut log = DailyLog::new(d(2024, 1, day));
            if matches!(day, 3 | 4) {
                log = log.symptom("headache");
            }
            logs.push(log);
        }
        // Shift the day-17/18 occurrences onto real dates inside the cycle.
        logs[10] = DailyLog::new(d(2024, 1, 17)).symptom("headache");
        logs[11] = DailyLog::new(d(2024, 1, 18)).symptom("headache");

        let report = detector().detect(&logs, &cycles);
        assert_eq!(report.patterns.len(), 1);
        let p = &report.patterns[0];
        assert_eq!(p.symptom, "headache");
        assert_eq!(p.occurrences, 4);
        assert!((p.probability - 4.0 / 12.0 * 100.0).abs() < 1e-9);
        assert_eq!(p.confidence, 80.0);
        assert_eq!(p.severity, Severity::Low);
        // mean(3,4,17,18) = 10.5, rounds to 11 -> Jan 1 + 10 days.
        assert_eq!(p.predicted_next, Some(d(2024, 1, 11)));
        assert!(!p.is_synthetic);
    }

    #[test]
    fn test_single_occurrence_is_not_a_pattern() {
        let cycles = vec![CycleRecord::new(d(2024, 1, 1))];
        let mut logs: Vec<DailyLog> =
            (1..=11).map(|i| DailyLog::new(d(2024, 1, i))).collect();
        logs.push(DailyLog::new(d(2024, 1, 12)).symptom("nausea"));

        let report = detector().detect(&logs, &cycles);
        assert!(report.patterns.is_empty());
        assert!(report.sufficient());
    }

    #[test]
    fn test_severity_buckets_from_probability() {
        let mut config = PatternConfig::default();
        config.min_logs = 4;
        let detector = PatternDetector::new(config);
        let cycles = vec![CycleRecord::new(d(2024, 1, 1))];

        // 4 logs, cramps on 3 of them: probability 75 -> high.
        let logs = vec![
            DailyLog::new(d(2024, 1, 2)).symptom("cramps"),
            DailyLog::new(d(2024, 1, 3)).symptom("cramps"),
            DailyLog::new(d(2024, 1, 4)).symptom("cramps"),
            DailyLog::new(d(2024, 1, 5)),
        ];
        let report = detector.detect(&logs, &cycles);
        assert_eq!(report.patterns[0].severity, Severity::High);

        // Cramps on 2 of 4: probability 50 -> medium.
        let logs = vec![
            DailyLog::new(d(2024, 1, 2)).symptom("cramps"),
            DailyLog::new(d(2024, 1, 3)).symptom("cramps"),
            DailyLog::new(d(2024, 1, 4)),
            DailyLog::new(d(2024, 1, 5)),
        ];
        let report = detector.detect(&logs, &cycles);
        assert_eq!(report.patterns[0].severity, Severity::Medium);
    }

    #[test]
    fn test_results_sorted_and_truncated() {
        let mut config = PatternConfig::default();
        config.max_patterns = 2;
        let detector = PatternDetector::new(config);
        let cycles = vec![CycleRecord::new(d(2024, 1, 1))];

        let mut logs = Vec::new();
        for day in 1..=12u32 {
            let mut log = DailyLog::new(d(2024, 1, day));
            if day <= 6 {
                log = log.symptom("fatigue");
            }
            if day <= 4 {
                log = log.symptom("headache");
            }
            if day <= 2 {
                log = log.symptom("bloating");
            }
            logs.push(log);
        }

        let report = detector.detect(&logs, &cycles);
        assert_eq!(report.patterns.len(), 2);
        assert_eq!(report.patterns[0].symptom, "fatigue");
        assert_eq!(report.patterns[1].symptom, "headache");
    }

    #[test]
    fn test_occurrences_outside_cycles_are_skipped() {
        // Logs dated before any cycle resolve no cycle day and don't count.
        let cycles = vec![CycleRecord::new(d(2024, 2, 1))];
        let mut logs: Vec<DailyLog> = (1..=10)
            .map(|i| DailyLog::new(d(2024, 1, i)).symptom("headache"))
            .collect();
        logs.push(DailyLog::new(d(2024, 2, 3)).symptom("headache"));

        let report = detector().detect(&logs, &cycles);
        // Only one occurrence resolves to a cycle day, below min_occurrences.
        assert!(report.patterns.is_empty());
    }

    #[test]
    fn test_unknown_vocabulary_symptom_gets_fallback_advice() {
        let mut config = PatternConfig::default();
        config.min_logs = 2;
        config.symptom_vocabulary = vec!["dizziness".to_string()];
        let detector = PatternDetector::new(config);
        let cycles = vec![CycleRecord::new(d(2024, 1, 1))];
        let logs = vec![
            DailyLog::new(d(2024, 1, 2)).symptom("dizziness"),
            DailyLog::new(d(2024, 1, 3)).symptom("dizziness"),
        ];

        let report = detector.detect(&logs, &cycles);
        assert_eq!(report.patterns.len(), 1);
        assert!(!report.patterns[0].prevention_tips.is_empty());
    }
}
