//! Static advice lookups
//!
//! Trigger-factor and prevention-tip text keyed by symptom name, and
//! recommended-action text keyed by (metric, severity). Symptoms or
//! metrics absent from the tables get a generic fallback so every finding
//! carries usable text.

use crate::model::derived::Severity;

/// Advice attached to a detected symptom pattern
#[derive(Debug, Clone)]
pub struct SymptomAdvice {
    pub trigger_factors: Vec<String>,
    pub prevention_tips: Vec<String>,
}

/// Look up advice for a symptom, falling back to generic text
pub fn advice_for_symptom(symptom: &str) -> SymptomAdvice {
    let (triggers, tips): (&[&str], &[&str]) = match symptom.to_lowercase().as_str() {
        "headache" => (
            &["hormonal shifts", "dehydration", "poor sleep"],
            &[
                "Stay hydrated through the day",
                "Keep a regular sleep schedule",
                "Limit caffeine in the luteal phase",
            ],
        ),
        "cramps" => (
            &["prostaglandin release", "low magnesium"],
            &[
                "Apply a heating pad to the lower abdomen",
                "Gentle stretching or yoga",
                "Consider magnesium-rich foods",
            ],
        ),
        "bloating" => (
            &["water retention", "high sodium intake", "hormonal shifts"],
            &[
                "Reduce salty foods in the days before your period",
                "Stay hydrated",
                "Light walks after meals",
            ],
        ),
        "fatigue" => (
            &["low iron during menstruation", "disrupted sleep", "hormonal shifts"],
            &[
                "Prioritize 7-8 hours of sleep",
                "Include iron-rich foods",
                "Schedule lighter activity on heavy-flow days",
            ],
        ),
        "mood swings" => (
            &["estrogen and progesterone fluctuation", "stress", "poor sleep"],
            &[
                "Regular exercise helps stabilize mood",
                "Practice brief relaxation exercises",
                "Track triggers alongside your cycle",
            ],
        ),
        "breast tenderness" => (
            &["hormonal shifts", "caffeine"],
            &[
                "Wear a supportive bra",
                "Reduce caffeine in the luteal phase",
            ],
        ),
        "acne" => (
            &["androgen fluctuation", "stress"],
            &[
                "Keep a consistent gentle skincare routine",
                "Avoid touching your face",
            ],
        ),
        "insomnia" => (
            &["progesterone drop before menstruation", "evening screen time"],
            &[
                "Keep a consistent bedtime",
                "Avoid screens in the last hour before sleep",
            ],
        ),
        "anxiety" => (
            &["hormonal shifts", "elevated stress", "caffeine"],
            &[
                "Breathing exercises or short meditation",
                "Limit caffeine late in the day",
            ],
        ),
        _ => (
            &["hormonal shifts across the cycle"],
            &[
                "Track this symptom alongside sleep, stress and activity",
                "Discuss persistent symptoms with a healthcare provider",
            ],
        ),
    };

    SymptomAdvice {
        trigger_factors: triggers.iter().map(|s| s.to_string()).collect(),
        prevention_tips: tips.iter().map(|s| s.to_string()).collect(),
    }
}

/// Recommended action for an anomalous reading, keyed by (metric, severity)
pub fn action_for_anomaly(metric: &str, severity: Severity) -> String {
    let metric_key = metric.to_lowercase();
    match (metric_key.as_str(), severity) {
        ("heart_rate", Severity::High | Severity::Critical) => {
            "Resting heart rate is well outside your usual range. Rest today and consult a provider if it persists.".to_string()
        }
        ("heart_rate", _) => {
            "Heart rate is a little off baseline. Worth noting alongside sleep and stress.".to_string()
        }
        ("sleep_hours", Severity::High | Severity::Critical) => {
            "Sleep is far from your usual. Protect tonight's sleep window and avoid late stimulants.".to_string()
        }
        ("sleep_hours", _) => {
            "Sleep drifted from baseline. Aim for your regular bedtime tonight.".to_string()
        }
        ("steps", Severity::High | Severity::Critical) => {
            "Activity is far from your usual level. If you're feeling unwell, rest; otherwise a short walk can help.".to_string()
        }
        ("steps", _) => {
            "Activity is a bit off baseline. A light walk keeps the routine going.".to_string()
        }
        (_, Severity::High | Severity::Critical) => format!(
            "{} deviated strongly from your baseline. Keep an eye on it and consult a provider if it persists.",
            metric
        ),
        (_, _) => format!("{} drifted from your baseline. Worth watching over the next few days.", metric),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_symptom_has_specific_advice() {
        let advice = advice_for_symptom("Headache");
        assert!(advice
            .trigger_factors
            .iter()
            .any(|t| t.contains("dehydration")));
        assert!(!advice.prevention_tips.is_empty());
    }

    #[test]
    fn test_unknown_symptom_gets_fallback() {
        let advice = advice_for_symptom("mystery symptom");
        assert!(!advice.trigger_factors.is_empty());
        assert!(!advice.prevention_tips.is_empty());
    }

    #[test]
    fn test_anomaly_action_varies_by_severity() {
        let routine = action_for_anomaly("heart_rate", Severity::Low);
        let urgent = action_for_anomaly("heart_rate", Severity::Critical);
        assert_ne!(routine, urgent);
        assert!(urgent.contains("consult"));
    }

    #[test]
    fn test_unknown_metric_action_names_the_metric() {
        let action = action_for_anomaly("skin_temp", Severity::Medium);
        assert!(action.contains("skin_temp"));
    }
}
