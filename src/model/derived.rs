//! Derived finding types
//!
//! Everything in this module is computed fresh on each analysis run and
//! never incrementally patched: `Pattern`, `Correlation`, `Anomaly`,
//! `ForecastPoint` and `Notification`.
//!
//! Each finding carries an `is_synthetic` flag. Real computations leave it
//! false; any code path that substitutes generated/demo findings must set
//! it so synthetic output is never indistinguishable from a genuine one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Severity bucket for patterns and anomalies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// How soon an anomaly warrants attention
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    WithinWeek,
    Immediate,
}

impl Urgency {
    /// Derive urgency from an anomaly's severity
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Low => Urgency::Routine,
            Severity::Medium => Urgency::WithinWeek,
            Severity::High | Severity::Critical => Urgency::Immediate,
        }
    }
}

/// A recurring symptom association with a cycle-day window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    /// Symptom name as tested from the vocabulary
    pub symptom: String,
    /// Mean cycle day of the occurrences (plain arithmetic mean; can be
    /// misleading when occurrences straddle a cycle boundary)
    pub mean_cycle_day: f64,
    /// Cycle days on which the symptom was logged
    pub cycle_days: Vec<u32>,
    /// Number of logs mentioning the symptom
    pub occurrences: usize,
    /// occurrences / distinct logged days, as a percentage
    pub probability: f64,
    /// Linear in occurrence count, capped
    pub confidence: f64,
    /// Next expected occurrence, anchored to the latest cycle start
    pub predicted_next: Option<NaiveDate>,
    pub severity: Severity,
    /// Common trigger factors for this symptom
    pub trigger_factors: Vec<String>,
    /// Prevention tips for this symptom
    pub prevention_tips: Vec<String>,
    #[serde(default)]
    pub is_synthetic: bool,
}

/// Strength classification of a correlation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

impl std::fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationStrength::Weak => write!(f, "weak"),
            CorrelationStrength::Moderate => write!(f, "moderate"),
            CorrelationStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Direction of a correlation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationDirection {
    Positive,
    Negative,
}

/// Whether a correlation is worth acting on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalMeaning {
    /// Strong association worth discussing with a provider
    Notable,
    /// Keep an eye on it
    Monitor,
    /// Statistical curiosity only
    NotMeaningful,
}

/// A pairwise statistical relationship between two metric series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Correlation {
    pub metric_a: String,
    pub metric_b: String,
    /// Pearson correlation coefficient (-1 to 1)
    pub coefficient: f64,
    /// Approximate significance (p-value estimate from a Fisher z
    /// transform; an estimate, not an exact test)
    pub significance: f64,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    /// Number of paired days used
    pub sample_size: usize,
    /// Human-readable one-sentence summary
    pub insight: String,
    pub clinical_meaning: ClinicalMeaning,
    #[serde(default)]
    pub is_synthetic: bool,
}

/// A single observation deviating from its expected baseline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    pub metric: String,
    /// The observed value that was scored
    pub detected_value: f64,
    /// Expected value from the trailing baseline
    pub expected_value: f64,
    /// Normalized deviation from the baseline (0 = exactly expected)
    pub score: f64,
    pub severity: Severity,
    pub urgency: Urgency,
    /// Action text keyed by (metric, severity)
    pub recommended_action: String,
    pub detected_on: NaiveDate,
    #[serde(default)]
    pub is_synthetic: bool,
}

/// One day of a mood forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    /// Predicted mood on the 1-10 scale
    pub predicted_value: f64,
    /// 0-100, strictly non-increasing with forecast distance
    pub confidence: f64,
    /// Labels for what fed the prediction (weekday type, cycle window, ...)
    pub contributing_factors: Vec<String>,
    #[serde(default)]
    pub is_synthetic: bool,
}

/// Notification priority, ordered so `Critical > High > Medium > Low`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Notification grouping for display surfaces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Mood,
    Stress,
    Sleep,
    Activity,
    CyclePhase,
    Pattern,
    Anomaly,
    Forecast,
}

/// A prioritized advisory derived from analysis state
///
/// Generated fresh on every evaluation. Deduplication and snoozing across
/// refreshes belong to the consumer, which matches repeats by `kind` and
/// may shift `scheduled_for` or drop the notification without this
/// engine's involvement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Stable identity of the emitting rule, for consumer-side matching
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub category: NotificationCategory,
    pub scheduled_for: DateTime<Utc>,
    /// Whether the message text was built from this user's own data
    pub personalized: bool,
    /// Optional reference for the consumer to act on (screen, symptom, metric)
    #[serde(default)]
    pub action_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_urgency_from_severity() {
        assert_eq!(Urgency::from_severity(Severity::Low), Urgency::Routine);
        assert_eq!(Urgency::from_severity(Severity::Medium), Urgency::WithinWeek);
        assert_eq!(Urgency::from_severity(Severity::High), Urgency::Immediate);
        assert_eq!(Urgency::from_severity(Severity::Critical), Urgency::Immediate);
    }

    #[test]
    fn test_is_synthetic_defaults_false_on_deserialize() {
        let json = r#"{
            "metric": "steps",
            "detected_value": 900.0,
            "expected_value": 8000.0,
            "score": 0.89,
            "severity": "high",
            "urgency": "immediate",
            "recommended_action": "check in",
            "detected_on": "2024-03-01"
        }"#;
        let anomaly: Anomaly = serde_json::from_str(json).unwrap();
        assert!(!anomaly.is_synthetic);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
