//! Cycle context resolution
//!
//! Maps a calendar date to a cycle day and phase given the user's cycle
//! history. The day-to-phase mapping is a documented heuristic, not a
//! medical fact, and is kept as an explicit enumerable window table so the
//! mapping can be asserted day by day.
//!
//! The follicular (6-13) and ovulatory (12-16) windows deliberately
//! overlap on days 12-13; `phase_windows` reports both in full, and
//! `phase_for_day` resolves the overlap by first match in declaration
//! order. Whether ovulatory should win that overlap is an open question
//! inherited from the source heuristic.

use crate::model::records::CycleRecord;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Phase of the menstrual cycle, always derived and never stored
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
    /// No cycle record covers the date
    Unknown,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclePhase::Menstrual => write!(f, "menstrual"),
            CyclePhase::Follicular => write!(f, "follicular"),
            CyclePhase::Ovulatory => write!(f, "ovulatory"),
            CyclePhase::Luteal => write!(f, "luteal"),
            CyclePhase::Unknown => write!(f, "unknown"),
        }
    }
}

/// Resolved cycle position for one date
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleContext {
    /// 1-indexed day within the governing cycle; `None` when uncovered
    pub cycle_day: Option<u32>,
    pub phase: CyclePhase,
}

impl CycleContext {
    /// Context for a date no cycle record covers
    pub fn unknown() -> Self {
        Self {
            cycle_day: None,
            phase: CyclePhase::Unknown,
        }
    }
}

/// One row of the day-to-phase window table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseWindow {
    pub days: RangeInclusive<u32>,
    pub phase: CyclePhase,
}

/// The full window table for a cycle of the given shape
///
/// Windows are returned in resolution order. The ovulatory window is
/// reported in full (12-16) even though days 12-13 also belong to the
/// follicular window.
pub fn phase_windows(period_length: u32, cycle_length: u32) -> Vec<PhaseWindow> {
    let period_end = period_length.max(1);
    let cycle_end = cycle_length.max(17);
    vec![
        PhaseWindow {
            days: 1..=period_end,
            phase: CyclePhase::Menstrual,
        },
        PhaseWindow {
            days: (period_end + 1)..=13,
            phase: CyclePhase::Follicular,
        },
        PhaseWindow {
            days: 12..=16,
            phase: CyclePhase::Ovulatory,
        },
        PhaseWindow {
            days: 17..=cycle_end,
            phase: CyclePhase::Luteal,
        },
    ]
}

/// Map a 1-indexed cycle day to its phase
///
/// First matching window wins; days past the luteal window clamp to
/// luteal (long cycles stay luteal until the next recorded start).
pub fn phase_for_day(day: u32, period_length: u32, cycle_length: u32) -> CyclePhase {
    if day == 0 {
        return CyclePhase::Unknown;
    }
    for window in phase_windows(period_length, cycle_length) {
        if window.days.contains(&day) {
            return window.phase;
        }
    }
    CyclePhase::Luteal
}

/// Resolves a date against a user's cycle history
pub struct CycleContextResolver;

impl CycleContextResolver {
    /// Resolve the cycle day and phase for a date
    ///
    /// Scans cycles most recent first; the first one whose interval
    /// covers the date governs. Returns an unknown context when no
    /// record covers the date.
    pub fn resolve(date: chrono::NaiveDate, cycles: &[CycleRecord]) -> CycleContext {
        let mut ordered: Vec<&CycleRecord> = cycles.iter().collect();
        ordered.sort_by(|a, b| b.start.cmp(&a.start));

        for cycle in ordered {
            if cycle.covers(date) {
                let day = (date - cycle.start).num_days() as u32 + 1;
                let phase = phase_for_day(
                    day,
                    cycle.effective_period_length(),
                    cycle.effective_length(),
                );
                return CycleContext {
                    cycle_day: Some(day),
                    phase,
                };
            }
        }

        CycleContext::unknown()
    }

    /// The most recently started cycle, if any
    pub fn latest_cycle(cycles: &[CycleRecord]) -> Option<&CycleRecord> {
        cycles.iter().max_by_key(|c| c.start)
    }

    /// Project a future date onto a cycle day, wrapping modulo the latest
    /// cycle's length
    ///
    /// Used by the forecaster for dates past the recorded cycle. Returns
    /// `None` when there is no cycle history or the date precedes it.
    pub fn projected_cycle_day(date: chrono::NaiveDate, cycles: &[CycleRecord]) -> Option<u32> {
        let latest = Self::latest_cycle(cycles)?;
        let delta = (date - latest.start).num_days();
        if delta < 0 {
            return None;
        }
        let len = latest.effective_length() as i64;
        Some((delta % len) as u32 + 1)
    }
}
