//! Demo dataset generator
//!
//! Builds a deterministic 90-day dataset for trying the engine without
//! real records. The data is synthetic input: everything computed from it
//! flows through the real engines, and callers are expected to mark the
//! resulting findings with `is_synthetic` before surfacing them.

use crate::data::provider::InMemoryStore;
use crate::model::records::{
    CycleRecord, DailyLog, MetricKind, MetricPoint, MetricSeries,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

/// Deterministic linear congruential generator, 0.0..1.0
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as f64 / (1u64 << 31) as f64
    }
}

/// Populate a store with 90 days of plausible demo records ending at
/// `today`
pub fn generate_demo_data(store: &InMemoryStore, user_id: &str, today: NaiveDate) {
    let mut rng = Lcg(0x5eed_cafe);
    let start = today - Duration::days(89);

    // Three 28-day cycles, the last one still open.
    let mut cycle_start = start;
    while cycle_start <= today {
        let mut cycle = CycleRecord::new(cycle_start)
            .cycle_length(28)
            .period_length(5);
        if cycle_start + Duration::days(27) < today {
            cycle = cycle.end(cycle_start + Duration::days(27));
        }
        // Demo records are always valid; drop silently if not.
        let _ = store.add_cycle(user_id, cycle);
        cycle_start += Duration::days(28);
    }

    let mut steps = MetricSeries::new("steps", "count", MetricKind::Counter);
    let mut sleep = MetricSeries::new("sleep_hours", "hours", MetricKind::Gauge);
    let mut heart = MetricSeries::new("heart_rate", "bpm", MetricKind::Gauge);

    for offset in 0..90i64 {
        let date = start + Duration::days(offset);
        let cycle_day = (offset % 28) + 1;

        // Mood dips premenstrually and during the period, lifts mid-cycle.
        let cycle_mood_shift = match cycle_day {
            1..=5 => -1.0,
            12..=16 => 0.8,
            22..=28 => -1.5,
            _ => 0.0,
        };
        let mood = (6.5 + cycle_mood_shift + rng.next() * 1.5 - 0.75)
            .clamp(1.0, 10.0)
            .round() as u8;
        let stress = (4.5 - cycle_mood_shift + rng.next() * 2.0 - 1.0)
            .clamp(1.0, 10.0)
            .round() as u8;

        let mut log = DailyLog::new(date).mood(mood).stress(stress);
        log.energy = Some((mood as f64 - 0.5 + rng.next()).clamp(1.0, 10.0).round() as u8);

        if matches!(cycle_day, 1..=3) {
            log = log.symptom("cramps");
        }
        if matches!(cycle_day, 3..=4 | 24..=25) {
            log = log.symptom("headache");
        }
        if matches!(cycle_day, 23..=28) && rng.next() > 0.4 {
            log = log.symptom("bloating");
        }
        let _ = store.upsert_log(user_id, log);

        let noon = Utc
            .from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap_or_default());
        // Sleep drives next-day steps a little, giving the correlation
        // engine something real to find.
        let sleep_hours = 7.0 + rng.next() * 1.6 - 0.8 + if cycle_mood_shift < 0.0 { -0.6 } else { 0.0 };
        sleep.points.push(MetricPoint {
            timestamp: noon,
            value: (sleep_hours * 10.0).round() / 10.0,
        });
        steps.points.push(MetricPoint {
            timestamp: noon,
            value: (4000.0 + sleep_hours * 700.0 + rng.next() * 1500.0).round(),
        });
        heart.points.push(MetricPoint {
            timestamp: noon,
            value: (62.0 + rng.next() * 6.0).round(),
        });
    }

    // A final-day spike for the anomaly detector to catch.
    if let Some(last) = heart.points.last_mut() {
        last.value = 92.0;
    }

    let steps_points = std::mem::take(&mut steps.points);
    store.add_metric_points(user_id, &steps, steps_points);
    let sleep_points = std::mem::take(&mut sleep.points);
    store.add_metric_points(user_id, &sleep, sleep_points);
    let heart_points = std::mem::take(&mut heart.points);
    store.add_metric_points(user_id, &heart, heart_points);

    tracing::info!(user = user_id, days = 90, "Generated demo dataset");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::RecordProvider;
    use crate::model::session::{Granularity, Timeframe};

    #[tokio::test]
    async fn test_demo_data_is_deterministic_and_complete() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        let timeframe = Timeframe {
            start: today - Duration::days(89),
            end: today,
            granularity: Granularity::Quarter,
        };

        let store_a = InMemoryStore::new();
        generate_demo_data(&store_a, "u1", today);
        let store_b = InMemoryStore::new();
        generate_demo_data(&store_b, "u1", today);

        let logs_a = store_a.daily_logs("u1", &timeframe).await.unwrap();
        let logs_b = store_b.daily_logs("u1", &timeframe).await.unwrap();
        assert_eq!(logs_a.len(), 90);
        assert_eq!(logs_a, logs_b);

        let cycles = store_a.cycles("u1", &timeframe).await.unwrap();
        assert!(cycles.len() >= 3);

        let series = store_a.metric_series("u1", &timeframe).await.unwrap();
        assert_eq!(series.len(), 3);
        for s in &series {
            assert_eq!(s.points.len(), 90);
        }
    }
}
