//! Analysis session, request and result types
//!
//! An `AnalysisSession` is the unit of work: created in `Processing`
//! before any computation, updated exactly once on success or failure, and
//! immutable thereafter. All derived findings from a run are owned by the
//! session through its id.

use crate::model::derived::{Anomaly, Correlation, Pattern};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of analysis was requested
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    FullAnalysis,
    TargetedAnalysis,
    PatternDetection,
}

/// Which record streams to include in a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisScope {
    pub include_wearable: bool,
    pub include_lab: bool,
    pub include_cycle: bool,
    pub include_symptoms: bool,
    pub include_medications: bool,
}

impl Default for AnalysisScope {
    fn default() -> Self {
        Self {
            include_wearable: true,
            include_lab: false,
            include_cycle: true,
            include_symptoms: true,
            include_medications: false,
        }
    }
}

/// Reporting granularity of a requested timeframe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
    Quarter,
    Year,
}

/// The date window a run analyzes, inclusive on both ends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timeframe {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
}

impl Timeframe {
    /// The trailing `days`-day window ending today (UTC)
    pub fn last_days(days: i64, granularity: Granularity) -> Self {
        let end = Utc::now().date_naive();
        Self {
            start: end - chrono::Duration::days(days.max(1) - 1),
            end,
            granularity,
        }
    }

    /// Number of calendar days covered, at least 1
    pub fn num_days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(1)
    }

    /// Whether a date falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// An analysis run request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub user_id: String,
    pub session_type: SessionType,
    pub scope: AnalysisScope,
    pub timeframe: Timeframe,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    /// Some subsystems completed, others failed; completed results retained
    CompletedWithErrors,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Processing => write!(f, "processing"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A recoverable failure in one subsystem of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubsystemFailure {
    /// Subsystem name: "patterns", "correlations" or "anomalies"
    pub subsystem: String,
    pub error: String,
}

/// One bounded execution of the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: Uuid,
    pub user_id: String,
    pub session_type: SessionType,
    pub scope: AnalysisScope,
    pub timeframe: Timeframe,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Ordered human-readable findings summary
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Aggregate of sub-confidences, 0-1
    #[serde(default)]
    pub confidence_score: f64,
    /// Fraction of the requested scope actually covered by data, 0-1
    #[serde(default)]
    pub data_completeness: f64,
    #[serde(default)]
    pub processing_time_ms: u64,
    /// Per-subsystem recoverable failures (partial success)
    #[serde(default)]
    pub subsystem_failures: Vec<SubsystemFailure>,
    /// Fatal error detail when status is `Failed`
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalysisSession {
    /// Create a new session in `Processing` status
    pub fn start(request: &AnalysisRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            session_type: request.session_type,
            scope: request.scope,
            timeframe: request.timeframe,
            status: SessionStatus::Processing,
            created_at: Utc::now(),
            key_findings: Vec::new(),
            confidence_score: 0.0,
            data_completeness: 0.0,
            processing_time_ms: 0,
            subsystem_failures: Vec::new(),
            error: None,
        }
    }
}

/// The aggregated output of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub key_findings: Vec<String>,
    pub patterns: Vec<Pattern>,
    pub correlations: Vec<Correlation>,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
    pub data_completeness: f64,
    pub processing_time_ms: u64,
    /// Recoverable per-subsystem failures from this run
    #[serde(default)]
    pub subsystem_failures: Vec<SubsystemFailure>,
}
