//! Data model: input records, derived findings and session types

pub mod derived;
pub mod records;
pub mod session;

pub use derived::{
    Anomaly, ClinicalMeaning, Correlation, CorrelationDirection, CorrelationStrength,
    ForecastPoint, Notification, NotificationCategory, Pattern, Priority, Severity, Urgency,
};
pub use records::{
    is_weekend, CycleRecord, DailyLog, DailyStat, FlowIntensity, MetricKind, MetricPoint,
    MetricSeries, RecordError, DEFAULT_CYCLE_LENGTH, DEFAULT_PERIOD_LENGTH,
};
pub use session::{
    AnalysisRequest, AnalysisResults, AnalysisScope, AnalysisSession, Granularity, SessionStatus,
    SessionType, SubsystemFailure, Timeframe,
};
