//! Notification rules
//!
//! Turns phase, trailing aggregates and engine outputs into prioritized
//! advisories. Rules are ordered, independent and stateless: each inspects
//! the context and emits zero or one notification, so re-running on every
//! refresh is safe and always produces a fresh set. Deduplication and
//! snoozing across refreshes belong to the consumer, which matches repeats
//! by the notification `kind`.

use crate::config::NotifyConfig;
use crate::cycle::CyclePhase;
use crate::model::derived::{
    Anomaly, ForecastPoint, Notification, NotificationCategory, Pattern, Priority, Severity,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Everything the rules are allowed to look at
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub phase: Option<CyclePhase>,
    /// Average mood over the last 7 rated days
    pub avg_mood_7d: Option<f64>,
    /// Average stress over the last 7 rated days
    pub avg_stress_7d: Option<f64>,
    /// Latest daily step total
    pub latest_steps: Option<f64>,
    /// Latest daily sleep hours
    pub latest_sleep_hours: Option<f64>,
    pub patterns: Vec<Pattern>,
    pub anomalies: Vec<Anomaly>,
    pub forecasts: Vec<ForecastPoint>,
    /// "Today" for date arithmetic; defaults to the current UTC date
    pub today: Option<NaiveDate>,
}

/// Evaluates the ordered rule set against a context
pub struct NotificationRuleEngine {
    config: NotifyConfig,
}

type Rule = fn(&NotificationRuleEngine, &NotificationContext, DateTime<Utc>) -> Option<Notification>;

impl NotificationRuleEngine {
    /// Create an engine with the given thresholds
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    /// Evaluate all rules and return advisories sorted by priority
    /// descending
    pub fn evaluate(&self, ctx: &NotificationContext) -> Vec<Notification> {
        let now = Utc::now();
        let rules: &[Rule] = &[
            Self::rule_mood_decline,
            Self::rule_high_stress,
            Self::rule_low_sleep,
            Self::rule_low_activity,
            Self::rule_menstrual_self_care,
            Self::rule_upcoming_pattern,
            Self::rule_anomaly_alert,
            Self::rule_forecast_dip,
        ];

        let mut notifications: Vec<Notification> =
            rules.iter().filter_map(|rule| rule(self, ctx, now)).collect();

        notifications.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::debug!(count = notifications.len(), "Notification rules evaluated");
        notifications
    }

    fn rule_mood_decline(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let avg = ctx.avg_mood_7d?;
        if avg >= self.config.low_mood_threshold {
            return None;
        }
        Some(Notification {
            kind: "mood-decline".to_string(),
            title: "Your mood has been low this week".to_string(),
            message: format!(
                "Average mood over the last 7 rated days is {:.1}. Consider what has helped before, and reach out to someone you trust if this continues.",
                avg
            ),
            priority: Priority::High,
            category: NotificationCategory::Mood,
            scheduled_for: now,
            personalized: true,
            action_ref: Some("mood".to_string()),
        })
    }

    fn rule_high_stress(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let avg = ctx.avg_stress_7d?;
        if avg <= self.config.high_stress_threshold {
            return None;
        }
        Some(Notification {
            kind: "stress-elevated".to_string(),
            title: "Stress has been running high".to_string(),
            message: format!(
                "Average stress over the last 7 rated days is {:.1}. Short breaks and breathing exercises can take the edge off.",
                avg
            ),
            priority: Priority::Medium,
            category: NotificationCategory::Stress,
            scheduled_for: now,
            personalized: true,
            action_ref: Some("stress".to_string()),
        })
    }

    fn rule_low_sleep(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let sleep = ctx.latest_sleep_hours?;
        if sleep >= self.config.low_sleep_hours {
            return None;
        }
        Some(Notification {
            kind: "sleep-short".to_string(),
            title: "Last night's sleep was short".to_string(),
            message: format!(
                "You slept {:.1} hours. Protect tonight's sleep window if you can.",
                sleep
            ),
            priority: Priority::Medium,
            category: NotificationCategory::Sleep,
            scheduled_for: now,
            personalized: true,
            action_ref: Some("sleep_hours".to_string()),
        })
    }

    fn rule_low_activity(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let steps = ctx.latest_steps?;
        if steps >= self.config.low_steps {
            return None;
        }
        Some(Notification {
            kind: "activity-low".to_string(),
            title: "Movement has been light today".to_string(),
            message: format!(
                "{:.0} steps so far. A short walk still counts.",
                steps
            ),
            priority: Priority::Low,
            category: NotificationCategory::Activity,
            scheduled_for: now,
            personalized: true,
            action_ref: Some("steps".to_string()),
        })
    }

    fn rule_menstrual_self_care(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        if ctx.phase != Some(CyclePhase::Menstrual) {
            return None;
        }
        Some(Notification {
            kind: "phase-menstrual".to_string(),
            title: "Menstrual phase".to_string(),
            message: "Energy can dip during your period. Lighter plans, warmth and iron-rich food help.".to_string(),
            priority: Priority::Low,
            category: NotificationCategory::CyclePhase,
            scheduled_for: now,
            personalized: false,
            action_ref: None,
        })
    }

    fn rule_upcoming_pattern(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let today = ctx.today.unwrap_or_else(|| now.date_naive());
        let horizon = today + Duration::days(self.config.pattern_lead_days);
        let upcoming = ctx.patterns.iter().find(|p| {
            p.predicted_next
                .map(|d| d >= today && d <= horizon)
                .unwrap_or(false)
        })?;
        let date = upcoming.predicted_next?;
        Some(Notification {
            kind: format!("pattern-upcoming-{}", upcoming.symptom.replace(' ', "-")),
            title: format!("{} may be coming up", upcoming.symptom),
            message: format!(
                "Based on your history, {} tends to occur around cycle day {:.0} (next expected {}). {}",
                upcoming.symptom,
                upcoming.mean_cycle_day.round(),
                date,
                upcoming
                    .prevention_tips
                    .first()
                    .cloned()
                    .unwrap_or_default()
            ),
            priority: Priority::Medium,
            category: NotificationCategory::Pattern,
            scheduled_for: now,
            personalized: true,
            action_ref: Some(upcoming.symptom.clone()),
        })
    }

    fn rule_anomaly_alert(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let worst = ctx
            .anomalies
            .iter()
            .filter(|a| a.severity >= Severity::High)
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
        let priority = if worst.severity == Severity::Critical {
            Priority::Critical
        } else {
            Priority::High
        };
        Some(Notification {
            kind: format!("anomaly-{}", worst.metric),
            title: format!("Unusual {} reading", worst.metric),
            message: format!(
                "{} was {:.1} against an expected {:.1}. {}",
                worst.metric, worst.detected_value, worst.expected_value, worst.recommended_action
            ),
            priority,
            category: NotificationCategory::Anomaly,
            scheduled_for: now,
            personalized: true,
            action_ref: Some(worst.metric.clone()),
        })
    }

    fn rule_forecast_dip(
        &self,
        ctx: &NotificationContext,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let dip = ctx
            .forecasts
            .iter()
            .find(|p| p.predicted_value < self.config.forecast_dip_threshold)?;
        Some(Notification {
            kind: "forecast-dip".to_string(),
            title: "A lower-mood day may be ahead".to_string(),
            message: format!(
                "Mood is forecast around {:.1} on {}. Planning something restorative that day can help.",
                dip.predicted_value, dip.date
            ),
            priority: Priority::Medium,
            category: NotificationCategory::Forecast,
            scheduled_for: now,
            personalized: true,
            action_ref: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::derived::Urgency;

    fn engine() -> NotificationRuleEngine {
        NotificationRuleEngine::new(NotifyConfig::default())
    }

    #[test]
    fn test_low_mood_emits_exactly_one_high_priority() {
        let ctx = NotificationContext {
            avg_mood_7d: Some(2.5),
            ..Default::default()
        };
        let notifications = engine().evaluate(&ctx);
        let mood: Vec<_> = notifications
            .iter()
            .filter(|n| n.category == NotificationCategory::Mood)
            .collect();
        assert_eq!(mood.len(), 1);
        assert_eq!(mood[0].priority, Priority::High);
        assert_eq!(mood[0].kind, "mood-decline");
    }

    #[test]
    fn test_ok_mood_emits_nothing() {
        let ctx = NotificationContext {
            avg_mood_7d: Some(3.0),
            ..Default::default()
        };
        let notifications = engine().evaluate(&ctx);
        assert!(notifications
            .iter()
            .all(|n| n.category != NotificationCategory::Mood));
    }

    #[test]
    fn test_missing_aggregates_emit_nothing() {
        let notifications = engine().evaluate(&NotificationContext::default());
        assert!(notifications.is_empty());
    }

    #[test]
    fn test_sorted_by_priority_descending() {
        let ctx = NotificationContext {
            phase: Some(CyclePhase::Menstrual),
            avg_mood_7d: Some(2.0),
            latest_steps: Some(500.0),
            anomalies: vec![Anomaly {
                metric: "heart_rate".to_string(),
                detected_value: 130.0,
                expected_value: 60.0,
                score: 1.2,
                severity: Severity::Critical,
                urgency: Urgency::Immediate,
                recommended_action: "Rest".to_string(),
                detected_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                is_synthetic: false,
            }],
            ..Default::default()
        };
        let notifications = engine().evaluate(&ctx);
        assert!(notifications.len() >= 3);
        for pair in notifications.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }
        assert_eq!(notifications[0].priority, Priority::Critical);
    }

    #[test]
    fn test_reevaluation_is_stateless() {
        let ctx = NotificationContext {
            avg_mood_7d: Some(2.0),
            ..Default::default()
        };
        let e = engine();
        let first = e.evaluate(&ctx);
        let second = e.evaluate(&ctx);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].kind, second[0].kind);
    }

    #[test]
    fn test_upcoming_pattern_heads_up() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let ctx = NotificationContext {
            today: Some(today),
            patterns: vec![Pattern {
                symptom: "headache".to_string(),
                mean_cycle_day: 22.0,
                cycle_days: vec![21, 23],
                occurrences: 2,
                probability: 20.0,
                confidence: 40.0,
                predicted_next: Some(today + Duration::days(2)),
                severity: Severity::Low,
                trigger_factors: vec![],
                prevention_tips: vec!["Stay hydrated".to_string()],
                is_synthetic: false,
            }],
            ..Default::default()
        };
        let notifications = engine().evaluate(&ctx);
        let pattern: Vec<_> = notifications
            .iter()
            .filter(|n| n.category == NotificationCategory::Pattern)
            .collect();
        assert_eq!(pattern.len(), 1);
        assert!(pattern[0].message.contains("headache"));
    }

    #[test]
    fn test_pattern_outside_lead_window_is_quiet() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let ctx = NotificationContext {
            today: Some(today),
            patterns: vec![Pattern {
                symptom: "headache".to_string(),
                mean_cycle_day: 22.0,
                cycle_days: vec![21, 23],
                occurrences: 2,
                probability: 20.0,
                confidence: 40.0,
                predicted_next: Some(today + Duration::days(10)),
                severity: Severity::Low,
                trigger_factors: vec![],
                prevention_tips: vec![],
                is_synthetic: false,
            }],
            ..Default::default()
        };
        assert!(engine().evaluate(&ctx).is_empty());
    }

    #[test]
    fn test_forecast_dip_rule() {
        let ctx = NotificationContext {
            forecasts: vec![ForecastPoint {
                date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
                predicted_value: 3.2,
                confidence: 70.0,
                contributing_factors: vec![],
                is_synthetic: false,
            }],
            ..Default::default()
        };
        let notifications = engine().evaluate(&ctx);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "forecast-dip");
    }
}
