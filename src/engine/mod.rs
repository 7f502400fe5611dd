//! Analysis engines
//!
//! Each engine is a pure function of (records, config) returning a report
//! value. Insufficient input yields an empty report with its sample size
//! recorded; it is never an error.

pub mod advice;
pub mod anomaly;
pub mod correlation;
pub mod forecast;
pub mod pattern;

pub use advice::{action_for_anomaly, advice_for_symptom, SymptomAdvice};
pub use anomaly::{anomaly_score, compute_baseline, AnomalyDetector, AnomalyReport, Baseline};
pub use correlation::{
    pearson_correlation, significance_estimate, CorrelationEngine, CorrelationReport,
};
pub use forecast::{ForecastEngine, ForecastReport};
pub use pattern::{PatternDetector, PatternReport};
