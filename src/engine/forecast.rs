//! Mood forecasting
//!
//! Projects a short-horizon mood series from recent ratings with decaying
//! confidence. The day-of-week and cycle-window adjustments are explicit,
//! documented heuristics, not clinical claims.

use crate::config::ForecastConfig;
use crate::cycle::CycleContextResolver;
use crate::model::derived::ForecastPoint;
use crate::model::records::{is_weekend, CycleRecord, DailyLog};
use chrono::{Duration, NaiveDate};

/// Result of one forecast pass
///
/// An empty `points` list with `rated_recent < min_required` means
/// insufficient data, which is a normal outcome and not an error.
#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub points: Vec<ForecastPoint>,
    /// Mood-rated days found in the trailing week
    pub rated_recent: usize,
    /// The configured minimum before forecasting runs
    pub min_required: usize,
    /// Mean of the recent ratings the forecast is anchored to
    pub baseline: Option<f64>,
}

impl ForecastReport {
    /// Whether enough recent ratings were available to forecast
    pub fn sufficient(&self) -> bool {
        self.rated_recent >= self.min_required
    }
}

/// Projects near-term mood from recent logs and cycle position
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    /// Create an engine with the given parameters
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Forecast mood for the days following `today`
    ///
    /// Guard: fewer than the configured minimum of mood-rated days in the
    /// trailing 7 yields an empty report. Otherwise produces exactly
    /// `horizon_days` points with strictly non-increasing confidence.
    pub fn forecast(
        &self,
        today: NaiveDate,
        logs: &[DailyLog],
        cycles: &[CycleRecord],
    ) -> ForecastReport {
        let week_start = today - Duration::days(6);
        let rated_recent = logs
            .iter()
            .filter(|l| l.date >= week_start && l.date <= today && l.mood.is_some())
            .count();

        if rated_recent < self.config.min_rated_recent {
            tracing::debug!(
                rated_recent,
                min = self.config.min_rated_recent,
                "Insufficient recent mood ratings for forecast"
            );
            return ForecastReport {
                points: Vec::new(),
                rated_recent,
                min_required: self.config.min_rated_recent,
                baseline: None,
            };
        }

        // Baseline: mean of the most recent rated days, up to the lookback.
        let mut rated: Vec<(NaiveDate, u8)> = logs
            .iter()
            .filter(|l| l.date <= today)
            .filter_map(|l| l.mood.map(|m| (l.date, m)))
            .collect();
        rated.sort_by_key(|&(date, _)| date);
        let recent: Vec<f64> = rated
            .iter()
            .rev()
            .take(self.config.lookback_days)
            .map(|&(_, m)| m as f64)
            .collect();
        let baseline = recent.iter().sum::<f64>() / recent.len() as f64;

        let mut points = Vec::with_capacity(self.config.horizon_days as usize);
        for i in 1..=self.config.horizon_days {
            let date = today + Duration::days(i as i64);
            let mut factors = vec!["historical mood data".to_string()];

            let dow_adj = if is_weekend(date) {
                factors.push("weekend".to_string());
                self.config.weekend_adjustment
            } else {
                factors.push("weekday".to_string());
                0.0
            };

            // PMS wins when the configured windows overlap.
            let cycle_adj = match CycleContextResolver::projected_cycle_day(date, cycles) {
                Some(day)
                    if (self.config.pms_window_start..=self.config.pms_window_end)
                        .contains(&day) =>
                {
                    factors.push(format!("premenstrual window (cycle day {})", day));
                    self.config.pms_adjustment
                }
                Some(day)
                    if (self.config.ovulatory_window_start
                        ..=self.config.ovulatory_window_end)
                        .contains(&day) =>
                {
                    factors.push(format!("ovulatory window (cycle day {})", day));
                    self.config.ovulatory_adjustment
                }
                _ => 0.0,
            };

            let predicted = (baseline + dow_adj + cycle_adj).clamp(1.0, 10.0);
            let confidence = (self.config.base_confidence
                - self.config.confidence_decay * i as f64)
                .max(self.config.confidence_floor);

            points.push(ForecastPoint {
                date,
                predicted_value: predicted,
                confidence,
                contributing_factors: factors,
                is_synthetic: false,
            });
        }

        tracing::debug!(
            points = points.len(),
            baseline,
            "Mood forecast complete"
        );

        ForecastReport {
            points,
            rated_recent,
            min_required: self.config.min_rated_recent,
            baseline: Some(baseline),
        }
    }
}
