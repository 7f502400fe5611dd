//! Correlation engine
//!
//! Computes Pearson correlation coefficients between all pairs of
//! daily-aggregated metric series. Pairs are aligned pairwise-complete by
//! date (days missing either value are dropped) and omitted entirely when
//! below the configured sample-size minimum, rather than reported as a
//! spurious correlation.

use crate::config::CorrelationConfig;
use crate::model::derived::{
    ClinicalMeaning, Correlation, CorrelationDirection, CorrelationStrength,
};
use crate::model::records::MetricSeries;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Result of one correlation pass
#[derive(Debug, Clone)]
pub struct CorrelationReport {
    pub correlations: Vec<Correlation>,
    /// Number of metric pairs that met the sample-size minimum
    pub pairs_tested: usize,
    /// Number of metric pairs skipped for insufficient paired days
    pub pairs_skipped: usize,
}

impl CorrelationReport {
    /// Mean |r| of reported correlations, 0-1
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.correlations.is_empty() {
            return None;
        }
        let sum: f64 = self.correlations.iter().map(|c| c.coefficient.abs()).sum();
        Some(sum / self.correlations.len() as f64)
    }
}

/// Computes pairwise statistical relationships between metric series
pub struct CorrelationEngine {
    config: CorrelationConfig,
}

impl CorrelationEngine {
    /// Create an engine with the given thresholds
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config }
    }

    /// Correlate every unordered pair of series
    ///
    /// Returns correlations sorted by absolute coefficient, strongest
    /// first.
    pub fn correlate_all(&self, series: &[MetricSeries]) -> CorrelationReport {
        let daily: Vec<(&str, BTreeMap<NaiveDate, f64>)> = series
            .iter()
            .map(|s| (s.name.as_str(), s.daily_values()))
            .collect();

        let mut correlations = Vec::new();
        let mut pairs_tested = 0;
        let mut pairs_skipped = 0;

        for i in 0..daily.len() {
            for j in (i + 1)..daily.len() {
                let (a_name, a_days) = &daily[i];
                let (b_name, b_days) = &daily[j];

                let (a_vals, b_vals) = align_by_date(a_days, b_days);
                if a_vals.len() < self.config.min_paired_days {
                    pairs_skipped += 1;
                    tracing::debug!(
                        metric_a = a_name,
                        metric_b = b_name,
                        paired_days = a_vals.len(),
                        min = self.config.min_paired_days,
                        "Skipping pair below sample-size minimum"
                    );
                    continue;
                }
                pairs_tested += 1;

                let r = pearson_correlation(&a_vals, &b_vals);
                if r.is_nan() {
                    // Zero variance on one side; no relationship to report.
                    continue;
                }

                correlations.push(self.classify(a_name, b_name, r, a_vals.len()));
            }
        }

        correlations.sort_by(|a, b| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        CorrelationReport {
            correlations,
            pairs_tested,
            pairs_skipped,
        }
    }

    /// Correlate one aligned pair of series
    pub fn correlate_pair(&self, a: &MetricSeries, b: &MetricSeries) -> Option<Correlation> {
        let (a_vals, b_vals) = align_by_date(&a.daily_values(), &b.daily_values());
        if a_vals.len() < self.config.min_paired_days {
            return None;
        }
        let r = pearson_correlation(&a_vals, &b_vals);
        if r.is_nan() {
            return None;
        }
        Some(self.classify(&a.name, &b.name, r, a_vals.len()))
    }

    fn classify(&self, a_name: &str, b_name: &str, r: f64, n: usize) -> Correlation {
        let coefficient = (r * 100.0).round() / 100.0;
        let strength = if r.abs() >= self.config.strong_threshold {
            CorrelationStrength::Strong
        } else if r.abs() >= self.config.moderate_threshold {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Weak
        };
        let direction = if r >= 0.0 {
            CorrelationDirection::Positive
        } else {
            CorrelationDirection::Negative
        };
        let clinical_meaning = match strength {
            CorrelationStrength::Strong => ClinicalMeaning::Notable,
            CorrelationStrength::Moderate => ClinicalMeaning::Monitor,
            CorrelationStrength::Weak => ClinicalMeaning::NotMeaningful,
        };

        let insight = format!(
            "{} {} with {} (r={:.2}, {} correlation over {} days)",
            a_name,
            match direction {
                CorrelationDirection::Positive => "rises",
                CorrelationDirection::Negative => "falls",
            },
            b_name,
            coefficient,
            strength,
            n
        );

        Correlation {
            metric_a: a_name.to_string(),
            metric_b: b_name.to_string(),
            coefficient,
            significance: significance_estimate(r, n),
            strength,
            direction,
            sample_size: n,
            insight,
            clinical_meaning,
            is_synthetic: false,
        }
    }
}

/// Keep only dates present in both daily maps
fn align_by_date(
    a: &BTreeMap<NaiveDate, f64>,
    b: &BTreeMap<NaiveDate, f64>,
) -> (Vec<f64>, Vec<f64>) {
    let mut a_vals = Vec::new();
    let mut b_vals = Vec::new();
    for (date, &a_val) in a {
        if let Some(&b_val) = b.get(date) {
            a_vals.push(a_val);
            b_vals.push(b_val);
        }
    }
    (a_vals, b_vals)
}

/// Calculate Pearson correlation coefficient
///
/// Returns a value between -1 and 1, or NaN when either side has zero
/// variance.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return f64::NAN;
    }

    let n = x.len() as f64;

    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|b| b * b).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x.powi(2)) * (n * sum_y2 - sum_y.powi(2))).sqrt();

    if denominator == 0.0 {
        f64::NAN
    } else {
        (numerator / denominator).clamp(-1.0, 1.0)
    }
}

/// Approximate two-sided p-value for a correlation via the Fisher z
/// transform and a normal approximation
///
/// An estimate for ranking and gating findings, not an exact test.
pub fn significance_estimate(r: f64, n: usize) -> f64 {
    if n < 4 {
        return 1.0;
    }
    let r = r.clamp(-0.999_999, 0.999_999);
    let z = r.atanh() * ((n - 3) as f64).sqrt();
    let p = 2.0 * (1.0 - normal_cdf(z.abs()));
    p.clamp(0.0, 1.0)
}

/// Standard normal CDF via the Abramowitz-Stegun erf approximation
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    // Abramowitz & Stegun 7.1.26, max error ~1.5e-7.
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::model::records::MetricKind;

    fn series_from(name: &str, values: &[f64]) -> MetricSeries {
        let mut s = MetricSeries::new(name, "", MetricKind::Gauge);
        for (i, &v) in values.iter().enumerate() {
            let ts = Utc
                .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
                .unwrap()
                + chrono::Duration::days(i as i64);
            s = s.point(ts, v);
        }
        s
    }

    #[test]
    fn test_pearson_perfect_positive() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let r = pearson_correlation(&x, &y);
        assert!((r - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_pearson_perfect_negative() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![10.0, 8.0, 6.0, 4.0, 2.0];
        let r = pearson_correlation(&x, &y);
        assert!((r + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_pearson_zero_variance_is_nan() {
        let x = vec![5.0, 5.0, 5.0];
        let y = vec![1.0, 2.0, 3.0];
        assert!(pearson_correlation(&x, &y).is_nan());
    }

    #[test]
    fn test_identical_series_is_strong_positive() {
        let values: Vec<f64> = (0..20).map(|i| 3.0 + (i as f64 * 0.7).sin()).collect();
        let a = series_from("mood", &values);
        let b = series_from("energy", &values);

        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let corr = engine.correlate_pair(&a, &b).unwrap();
        assert_eq!(corr.coefficient, 1.0);
        assert_eq!(corr.direction, CorrelationDirection::Positive);
        assert_eq!(corr.strength, CorrelationStrength::Strong);
        assert_eq!(corr.clinical_meaning, ClinicalMeaning::Notable);
        assert!(corr.significance < 0.01);
    }

    #[test]
    fn test_pair_below_minimum_is_omitted() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let a = series_from("steps", &values);
        let b = series_from("sleep_hours", &values);

        let engine = CorrelationEngine::new(CorrelationConfig::default());
        assert!(engine.correlate_pair(&a, &b).is_none());

        let report = engine.correlate_all(&[a, b]);
        assert!(report.correlations.is_empty());
        assert_eq!(report.pairs_skipped, 1);
        assert_eq!(report.pairs_tested, 0);
    }

    #[test]
    fn test_pairwise_complete_alignment_drops_missing_days() {
        // b misses days 5..9; only the 15 shared days should be used.
        let a_values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let a = series_from("steps", &a_values);
        let mut b = MetricSeries::new("sleep_hours", "hours", MetricKind::Gauge);
        for i in 0..20 {
            if (5..10).contains(&i) {
                continue;
            }
            let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
                + chrono::Duration::days(i as i64);
            b = b.point(ts, i as f64 * 2.0);
        }

        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let corr = engine.correlate_pair(&a, &b).unwrap();
        assert_eq!(corr.sample_size, 15);
        assert_eq!(corr.coefficient, 1.0);
    }

    #[test]
    fn test_strength_classification_boundaries() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let c = engine.classify("a", "b", 0.75, 20);
        assert_eq!(c.strength, CorrelationStrength::Strong);
        let c = engine.classify("a", "b", -0.5, 20);
        assert_eq!(c.strength, CorrelationStrength::Moderate);
        assert_eq!(c.direction, CorrelationDirection::Negative);
        let c = engine.classify("a", "b", 0.2, 20);
        assert_eq!(c.strength, CorrelationStrength::Weak);
        assert_eq!(c.clinical_meaning, ClinicalMeaning::NotMeaningful);
    }

    #[test]
    fn test_insight_mentions_both_metrics() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let c = engine.classify("sleep_hours", "mood", 0.8, 30);
        assert!(c.insight.contains("sleep_hours"));
        assert!(c.insight.contains("mood"));
        assert!(c.insight.contains("strong"));
    }

    #[test]
    fn test_significance_grows_with_sample_size() {
        let weak_n = significance_estimate(0.5, 10);
        let strong_n = significance_estimate(0.5, 100);
        assert!(strong_n < weak_n);
    }
}
