//! Analysis session orchestration
//!
//! Runs one bounded pipeline execution: creates the session record before
//! any computation, fans the independent engines out concurrently with a
//! per-subsystem timeout, and finalizes exactly once: the session's
//! terminal state and its findings land in one atomic store write.
//!
//! A failing or timed-out subsystem is recoverable: its failure is
//! recorded on the session and the other subsystems' results are kept
//! (partial success). Session-creation failure and store write failures
//! are fatal; a failed run persists no child records.

use crate::config::Config;
use crate::cycle::CycleContextResolver;
use crate::data::provider::{DataError, RecordProvider};
use crate::engine::anomaly::{AnomalyDetector, AnomalyReport};
use crate::engine::correlation::{CorrelationEngine, CorrelationReport};
use crate::engine::forecast::{ForecastEngine, ForecastReport};
use crate::engine::pattern::{PatternDetector, PatternReport};
use crate::model::derived::Notification;
use crate::model::records::{CycleRecord, DailyLog, MetricSeries};
use crate::model::session::{
    AnalysisRequest, AnalysisResults, AnalysisSession, SessionStatus, SessionType,
    SubsystemFailure, Timeframe,
};
use crate::notify::{NotificationContext, NotificationRuleEngine};
use crate::session::store::{SessionChildren, SessionStore, SessionWithChildren, StoreError};
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Fatal orchestration errors
///
/// Recoverable per-subsystem failures never surface here; they are
/// reported on the session instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session record could be created; the run never starts
    #[error("Session creation failed: {0}")]
    Create(#[source] StoreError),

    #[error("Record load failed: {0}")]
    Data(#[from] DataError),

    #[error("Session store failed: {0}")]
    Store(#[from] StoreError),

    #[error("All analysis subsystems failed: {0}")]
    AllSubsystemsFailed(String),
}

/// Coordinates engines, record access and session persistence
pub struct AnalysisSessionOrchestrator {
    provider: Arc<dyn RecordProvider>,
    store: Arc<dyn SessionStore>,
    config: Config,
    /// Test-only fault injection: the named subsystem fails instead of
    /// running its engine
    #[cfg(test)]
    subsystem_fault: Option<&'static str>,
}

impl AnalysisSessionOrchestrator {
    /// Create an orchestrator over a record provider and session store
    pub fn new(
        provider: Arc<dyn RecordProvider>,
        store: Arc<dyn SessionStore>,
        config: Config,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            #[cfg(test)]
            subsystem_fault: None,
        }
    }

    /// Run one engine pass under the subsystem timeout, honoring any
    /// injected fault
    async fn exec_subsystem<T, F>(
        &self,
        name: &'static str,
        timeout: Duration,
        f: F,
    ) -> Result<T, SubsystemFailure>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        #[cfg(test)]
        if self.subsystem_fault == Some(name) {
            return Err(SubsystemFailure {
                subsystem: name.to_string(),
                error: "injected subsystem fault".to_string(),
            });
        }
        run_subsystem(name, timeout, f).await
    }

    /// Execute one analysis run
    ///
    /// Pattern, correlation and anomaly detection execute concurrently,
    /// each bounded by the configured timeout. The session transitions to
    /// `Completed`, `CompletedWithErrors` or `Failed` exactly once.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisResults, SessionError> {
        let started = Instant::now();
        let mut session = AnalysisSession::start(&request);

        // No session id, no run.
        self.store
            .create_session(&session)
            .map_err(SessionError::Create)?;
        tracing::info!(
            session_id = %session.id,
            user = %request.user_id,
            session_type = ?request.session_type,
            "Analysis session started"
        );

        let (cycles, logs, series) = match self.load_records(&request).await {
            Ok(data) => data,
            Err(e) => {
                self.fail_session(&mut session, started, e.to_string());
                return Err(e.into());
            }
        };

        let timeout = Duration::from_millis(self.config.session.subsystem_timeout_ms);
        let pattern_only = request.session_type == SessionType::PatternDetection;

        let pattern_task = {
            let detector = PatternDetector::new(self.config.pattern.clone());
            let logs = logs.clone();
            let cycles = cycles.clone();
            self.exec_subsystem("patterns", timeout, move || detector.detect(&logs, &cycles))
        };
        let correlation_task = {
            let engine = CorrelationEngine::new(self.config.correlation.clone());
            let series = series.clone();
            let skip = pattern_only;
            async move {
                if skip {
                    Ok(CorrelationReport {
                        correlations: Vec::new(),
                        pairs_tested: 0,
                        pairs_skipped: 0,
                    })
                } else {
                    self.exec_subsystem("correlations", timeout, move || {
                        engine.correlate_all(&series)
                    })
                    .await
                }
            }
        };
        let anomaly_task = {
            let detector = AnomalyDetector::new(self.config.anomaly.clone());
            let series = series.clone();
            let skip = pattern_only;
            async move {
                if skip {
                    Ok(AnomalyReport {
                        anomalies: Vec::new(),
                        metrics_scored: 0,
                        metrics_skipped: 0,
                    })
                } else {
                    self.exec_subsystem("anomalies", timeout, move || detector.detect_all(&series))
                        .await
                }
            }
        };

        let (pattern_result, correlation_result, anomaly_result) =
            tokio::join!(pattern_task, correlation_task, anomaly_task);

        let mut failures = Vec::new();
        let pattern_report = unpack(pattern_result, &mut failures);
        let correlation_report = unpack(correlation_result, &mut failures);
        let anomaly_report = unpack(anomaly_result, &mut failures);

        if pattern_report.is_none() && correlation_report.is_none() && anomaly_report.is_none() {
            let detail = failures
                .iter()
                .map(|f| format!("{}: {}", f.subsystem, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            self.fail_session(&mut session, started, detail.clone());
            return Err(SessionError::AllSubsystemsFailed(detail));
        }

        let children = SessionChildren {
            patterns: pattern_report
                .as_ref()
                .map(|r| r.patterns.clone())
                .unwrap_or_default(),
            correlations: correlation_report
                .as_ref()
                .map(|r| r.correlations.clone())
                .unwrap_or_default(),
            anomalies: anomaly_report
                .as_ref()
                .map(|r| r.anomalies.clone())
                .unwrap_or_default(),
        };

        session.confidence_score = aggregate_confidence(
            pattern_report.as_ref(),
            correlation_report.as_ref(),
            anomaly_report.as_ref(),
        );
        session.data_completeness = data_completeness(&request.timeframe, &logs, &series);
        session.key_findings = key_findings(
            pattern_report.as_ref(),
            correlation_report.as_ref(),
            anomaly_report.as_ref(),
        );
        session.subsystem_failures = failures.clone();
        session.status = if failures.is_empty() {
            SessionStatus::Completed
        } else {
            SessionStatus::CompletedWithErrors
        };
        session.processing_time_ms = started.elapsed().as_millis() as u64;

        // One atomic write: final session state plus its findings. A
        // failed finalize persists neither.
        if let Err(e) = self.store.finalize(&session, &children) {
            self.fail_session(&mut session, started, e.to_string());
            return Err(e.into());
        }

        tracing::info!(
            session_id = %session.id,
            status = %session.status,
            patterns = children.patterns.len(),
            correlations = children.correlations.len(),
            anomalies = children.anomalies.len(),
            duration_ms = session.processing_time_ms,
            "Analysis session finished"
        );

        Ok(AnalysisResults {
            session_id: session.id,
            status: session.status,
            key_findings: session.key_findings.clone(),
            recommendations: recommendations(&children),
            patterns: children.patterns,
            correlations: children.correlations,
            anomalies: children.anomalies,
            confidence_score: session.confidence_score,
            data_completeness: session.data_completeness,
            processing_time_ms: session.processing_time_ms,
            subsystem_failures: failures,
        })
    }

    /// Forecast mood for a user from their recent logs
    pub async fn forecast(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
        today: NaiveDate,
    ) -> Result<ForecastReport, SessionError> {
        let cycles = self.provider.cycles(user_id, timeframe).await?;
        let logs = self.provider.daily_logs(user_id, timeframe).await?;
        let engine = ForecastEngine::new(self.config.forecast.clone());
        Ok(engine.forecast(today, &logs, &cycles))
    }

    /// Evaluate the notification rules against the user's current state
    pub async fn notifications(
        &self,
        user_id: &str,
        timeframe: &Timeframe,
        today: NaiveDate,
    ) -> Result<Vec<Notification>, SessionError> {
        let cycles = self.provider.cycles(user_id, timeframe).await?;
        let logs = self.provider.daily_logs(user_id, timeframe).await?;
        let series = self.provider.metric_series(user_id, timeframe).await?;

        let week_start = today - ChronoDuration::days(6);
        let recent: Vec<&DailyLog> = logs
            .iter()
            .filter(|l| l.date >= week_start && l.date <= today)
            .collect();
        let avg_of = |f: fn(&DailyLog) -> Option<u8>| {
            let rated: Vec<f64> = recent.iter().filter_map(|l| f(l).map(f64::from)).collect();
            if rated.is_empty() {
                None
            } else {
                Some(rated.iter().sum::<f64>() / rated.len() as f64)
            }
        };

        let latest_of = |name: &str| {
            series
                .iter()
                .find(|s| s.name == name)
                .and_then(|s| s.latest_daily_value())
                .map(|(_, v)| v)
        };

        let patterns = PatternDetector::new(self.config.pattern.clone())
            .detect(&logs, &cycles)
            .patterns;
        let anomalies = AnomalyDetector::new(self.config.anomaly.clone())
            .detect_all(&series)
            .anomalies;
        let forecasts = ForecastEngine::new(self.config.forecast.clone())
            .forecast(today, &logs, &cycles)
            .points;

        let ctx = NotificationContext {
            phase: Some(CycleContextResolver::resolve(today, &cycles).phase),
            avg_mood_7d: avg_of(|l| l.mood),
            avg_stress_7d: avg_of(|l| l.stress),
            latest_steps: latest_of("steps"),
            latest_sleep_hours: latest_of("sleep_hours"),
            patterns,
            anomalies,
            forecasts,
            today: Some(today),
        };

        Ok(NotificationRuleEngine::new(self.config.notify.clone()).evaluate(&ctx))
    }

    /// Fetch a session with the findings it owns
    pub fn fetch_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionWithChildren>, SessionError> {
        Ok(self.store.fetch_session(session_id)?)
    }

    /// All sessions for a user, newest first
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<AnalysisSession>, SessionError> {
        Ok(self.store.list_sessions(user_id)?)
    }

    async fn load_records(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(Vec<CycleRecord>, Vec<DailyLog>, Vec<MetricSeries>), DataError> {
        let cycles = if request.scope.include_cycle {
            self.provider
                .cycles(&request.user_id, &request.timeframe)
                .await?
        } else {
            Vec::new()
        };
        let logs = if request.scope.include_symptoms {
            self.provider
                .daily_logs(&request.user_id, &request.timeframe)
                .await?
        } else {
            Vec::new()
        };
        let series = if request.scope.include_wearable {
            self.provider
                .metric_series(&request.user_id, &request.timeframe)
                .await?
        } else {
            Vec::new()
        };
        Ok((cycles, logs, series))
    }

    /// Mark the session failed with no child records for this run
    fn fail_session(&self, session: &mut AnalysisSession, started: Instant, detail: String) {
        session.status = SessionStatus::Failed;
        session.error = Some(detail.clone());
        session.processing_time_ms = started.elapsed().as_millis() as u64;
        tracing::error!(session_id = %session.id, error = %detail, "Analysis session failed");
        if let Err(e) = self.store.update_session(session) {
            tracing::error!(session_id = %session.id, error = %e, "Failed to record session failure");
        }
    }
}

/// Run one engine pass on the blocking pool under a timeout
///
/// Timeouts and panics are recoverable subsystem failures, not fatal
/// session errors.
async fn run_subsystem<T, F>(
    name: &'static str,
    timeout: Duration,
    f: F,
) -> Result<T, SubsystemFailure>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(SubsystemFailure {
            subsystem: name.to_string(),
            error: format!("subsystem panicked: {}", join_err),
        }),
        Err(_) => Err(SubsystemFailure {
            subsystem: name.to_string(),
            error: format!("timed out after {}ms", timeout.as_millis()),
        }),
    }
}

fn unpack<T>(result: Result<T, SubsystemFailure>, failures: &mut Vec<SubsystemFailure>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(failure) => {
            tracing::warn!(
                subsystem = %failure.subsystem,
                error = %failure.error,
                "Subsystem failed; continuing with partial results"
            );
            failures.push(failure);
            None
        }
    }
}

/// Mean of the per-subsystem confidences that produced one
fn aggregate_confidence(
    patterns: Option<&PatternReport>,
    correlations: Option<&CorrelationReport>,
    anomalies: Option<&AnomalyReport>,
) -> f64 {
    let mut parts = Vec::new();
    if let Some(c) = patterns.and_then(|r| r.mean_confidence()) {
        parts.push(c);
    }
    if let Some(c) = correlations.and_then(|r| r.mean_confidence()) {
        parts.push(c);
    }
    if let Some(c) = anomalies.and_then(|r| r.mean_confidence()) {
        parts.push(c);
    }
    if parts.is_empty() {
        0.0
    } else {
        parts.iter().sum::<f64>() / parts.len() as f64
    }
}

/// Fraction of requested days with any log or metric data
fn data_completeness(timeframe: &Timeframe, logs: &[DailyLog], series: &[MetricSeries]) -> f64 {
    let mut covered: BTreeSet<NaiveDate> = logs.iter().map(|l| l.date).collect();
    for s in series {
        covered.extend(s.daily_values().keys().copied());
    }
    covered.retain(|d| timeframe.contains(*d));
    (covered.len() as f64 / timeframe.num_days() as f64).clamp(0.0, 1.0)
}

fn key_findings(
    patterns: Option<&PatternReport>,
    correlations: Option<&CorrelationReport>,
    anomalies: Option<&AnomalyReport>,
) -> Vec<String> {
    let mut findings = Vec::new();

    if let Some(report) = patterns {
        if !report.sufficient() {
            findings.push(format!(
                "Not enough daily logs for pattern detection yet ({} of {} needed).",
                report.sample_size, report.min_required
            ));
        } else if let Some(top) = report.patterns.first() {
            findings.push(format!(
                "{} recurs around cycle day {:.0} ({} occurrences, {:.0}% of logged days).",
                top.symptom,
                top.mean_cycle_day.round(),
                top.occurrences,
                top.probability
            ));
        }
    }

    if let Some(report) = correlations {
        if let Some(strongest) = report.correlations.first() {
            findings.push(strongest.insight.clone());
        }
    }

    if let Some(report) = anomalies {
        if let Some(worst) = report.anomalies.first() {
            findings.push(format!(
                "{} reading of {:.1} deviates from its {:.1} baseline ({} severity).",
                worst.metric, worst.detected_value, worst.expected_value, worst.severity
            ));
        }
    }

    findings
}

fn recommendations(children: &SessionChildren) -> Vec<String> {
    let mut recs = Vec::new();
    for pattern in &children.patterns {
        if let Some(tip) = pattern.prevention_tips.first() {
            if !recs.contains(tip) {
                recs.push(tip.clone());
            }
        }
    }
    for anomaly in &children.anomalies {
        if !recs.contains(&anomaly.recommended_action) {
            recs.push(anomaly.recommended_action.clone());
        }
    }
    recs
}
