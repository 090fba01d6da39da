//! Adaptive 0–100 scoring of a combination against caller preferences.
//!
//! | Component | Weight |
//! |-----------|--------|
//! | Gaps | 35 |
//! | Time of day | 30 |
//! | Remote preference | 15 |
//! | Load balance | 10 |
//! | Compactness | 10 |
//!
//! The time-of-day component is normalized against the range actually offered
//! in the request's course group, not against fixed opening hours.

use crate::data::{CourseGroup, Preferences, RemotePreference, TimeOfDay, TimeOfDayPreference};
use crate::metrics::ScheduleMetrics;
use serde::{Deserialize, Serialize};

const GAP_WEIGHT: f64 = 35.0;
const TIME_OF_DAY_WEIGHT: f64 = 30.0;
const REMOTE_WEIGHT: f64 = 15.0;
const BALANCE_WEIGHT: f64 = 10.0;

/// Gap minutes at which the gap component bottoms out.
const GAP_SATURATION_MINUTES: f64 = 180.0;
const GAP_EXPONENT: f64 = 1.3;
const IDEAL_DAYS: f64 = 3.0;
const DAY_PENALTY: f64 = 1.5;
/// Single-day gap at which the compactness half bottoms out.
const DAY_GAP_SATURATION_MINUTES: f64 = 120.0;

/// Earliest start and latest end, in decimal hours, across every candidate block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub min_start_hour: f64,
    pub max_end_hour: f64,
}

impl TimeRange {
    /// Scans every section of the group. A group without blocks yields a degenerate range.
    pub fn detect(group: &CourseGroup) -> Self {
        let bounds = group
            .sections()
            .flat_map(|section| section.blocks.iter())
            .fold(None, |bounds: Option<(TimeOfDay, TimeOfDay)>, block| match bounds {
                None => Some((block.start, block.end)),
                Some((start, end)) => Some((start.min(block.start), end.max(block.end))),
            });
        match bounds {
            Some((start, end)) => TimeRange {
                min_start_hour: start.hours(),
                max_end_hour: end.hours(),
            },
            None => TimeRange {
                min_start_hour: 0.0,
                max_end_hour: 0.0,
            },
        }
    }

    pub fn span(&self) -> f64 {
        self.max_end_hour - self.min_start_hour
    }

    pub fn is_degenerate(&self) -> bool {
        self.span() <= 0.0
    }

    /// Position of `hour` inside the range, clamped to `[0, 1]`.
    pub fn normalize(&self, hour: f64) -> f64 {
        ((hour - self.min_start_hour) / self.span()).clamp(0.0, 1.0)
    }
}

/// Scores a combination. Pure: identical arguments always give the identical score.
pub fn score(metrics: &ScheduleMetrics, preferences: &Preferences, range: &TimeRange) -> f64 {
    let total = gap_points(metrics, preferences)
        + time_of_day_points(metrics, preferences, range)
        + remote_points(metrics, preferences)
        + metrics.load_balance * BALANCE_WEIGHT
        + compactness_points(metrics);
    round2(total.clamp(0.0, 100.0))
}

/// Preferences and offered range bundled for one request.
#[derive(Debug, Clone, Copy)]
pub struct ScoreModel {
    preferences: Preferences,
    range: TimeRange,
}

impl ScoreModel {
    pub fn new(preferences: Preferences, range: TimeRange) -> Self {
        Self { preferences, range }
    }

    pub fn evaluate(&self, metrics: &ScheduleMetrics) -> f64 {
        score(metrics, &self.preferences, &self.range)
    }
}

fn gap_points(metrics: &ScheduleMetrics, preferences: &Preferences) -> f64 {
    if !preferences.minimize_gaps {
        return GAP_WEIGHT / 2.0;
    }
    let saturation = (f64::from(metrics.total_gap_minutes) / GAP_SATURATION_MINUTES).min(1.0);
    (GAP_WEIGHT * (1.0 - saturation.powf(GAP_EXPONENT))).max(0.0)
}

fn time_of_day_points(
    metrics: &ScheduleMetrics,
    preferences: &Preferences,
    range: &TimeRange,
) -> f64 {
    if metrics.days_used == 0 || range.is_degenerate() {
        return TIME_OF_DAY_WEIGHT / 2.0;
    }
    let start = range.normalize(metrics.avg_start_hour);
    let end = range.normalize(metrics.avg_end_hour);
    let factor = match preferences.time_of_day_preference {
        TimeOfDayPreference::StartEarly => 1.0 - start,
        TimeOfDayPreference::StartLate => start,
        TimeOfDayPreference::EndEarly => 1.0 - end,
        TimeOfDayPreference::EndLate => end,
        TimeOfDayPreference::Neutral => {
            let midpoint = (start + end) / 2.0;
            (1.0 - (midpoint - 0.5).abs() / 0.5).max(0.0)
        }
    };
    factor * TIME_OF_DAY_WEIGHT
}

fn remote_points(metrics: &ScheduleMetrics, preferences: &Preferences) -> f64 {
    let ratio = metrics.remote_ratio();
    match preferences.remote_preference {
        RemotePreference::Want => ratio * REMOTE_WEIGHT,
        RemotePreference::Avoid => (1.0 - ratio) * REMOTE_WEIGHT,
        RemotePreference::Neutral => REMOTE_WEIGHT / 2.0,
    }
}

fn compactness_points(metrics: &ScheduleMetrics) -> f64 {
    let days = (5.0 - (metrics.days_used as f64 - IDEAL_DAYS).abs() * DAY_PENALTY).max(0.0);
    let worst_day = f64::from(metrics.max_gap_minutes) / DAY_GAP_SATURATION_MINUTES;
    let gap = (5.0 - worst_day.min(1.0) * 5.0).max(0.0);
    days + gap
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Weekday;
    use std::collections::BTreeMap;

    fn metrics() -> ScheduleMetrics {
        ScheduleMetrics {
            days_used: 3,
            total_gap_minutes: 0,
            max_gap_minutes: 0,
            remote_count: 0,
            total_count: 3,
            avg_start_hour: 8.0,
            avg_end_hour: 14.0,
            load_balance: 1.0,
            sections_per_day: BTreeMap::from([
                (Weekday::Monday, 1),
                (Weekday::Tuesday, 1),
                (Weekday::Wednesday, 1),
            ]),
            gaps_per_day: BTreeMap::new(),
        }
    }

    fn range() -> TimeRange {
        TimeRange {
            min_start_hour: 8.0,
            max_end_hour: 20.0,
        }
    }

    #[test]
    fn test_perfect_compact_schedule_with_neutral_preferences() {
        // gaps 35 + time (midpoint 0.25 -> 0.5) 15 + remote 7.5 + balance 10 + compactness 10
        let s = score(&metrics(), &Preferences::default(), &range());
        assert_eq!(s, 77.5);
    }

    #[test]
    fn test_score_is_referentially_transparent() {
        let m = metrics();
        let p = Preferences {
            minimize_gaps: true,
            remote_preference: RemotePreference::Want,
            time_of_day_preference: TimeOfDayPreference::EndLate,
        };
        let first = score(&m, &p, &range());
        for _ in 0..10 {
            assert_eq!(score(&m, &p, &range()), first);
        }
    }

    #[test]
    fn test_gap_component_saturates() {
        let mut m = metrics();
        m.total_gap_minutes = 500;
        m.max_gap_minutes = 0;
        let p = Preferences::default();
        // Gap points fall to 0, everything else unchanged: 77.5 - 35.
        assert_eq!(score(&m, &p, &range()), 42.5);

        let relaxed = Preferences {
            minimize_gaps: false,
            ..p
        };
        assert_eq!(score(&m, &relaxed, &range()), 60.0);
    }

    #[test]
    fn test_time_of_day_modes() {
        let m = metrics(); // start_norm 0.0, end_norm 0.5
        let with = |mode| Preferences {
            time_of_day_preference: mode,
            ..Preferences::default()
        };
        let base = 35.0 + 7.5 + 10.0 + 10.0;
        assert_eq!(score(&m, &with(TimeOfDayPreference::StartEarly), &range()), base + 30.0);
        assert_eq!(score(&m, &with(TimeOfDayPreference::StartLate), &range()), base);
        assert_eq!(score(&m, &with(TimeOfDayPreference::EndEarly), &range()), base + 15.0);
        assert_eq!(score(&m, &with(TimeOfDayPreference::EndLate), &range()), base + 15.0);
    }

    #[test]
    fn test_remote_modes() {
        let mut m = metrics();
        m.remote_count = 3;
        let with = |mode| Preferences {
            remote_preference: mode,
            ..Preferences::default()
        };
        assert_eq!(score(&m, &with(RemotePreference::Want), &range()), 85.0);
        assert_eq!(score(&m, &with(RemotePreference::Avoid), &range()), 70.0);
    }

    #[test]
    fn test_compactness_penalizes_day_count_and_worst_gap() {
        let mut m = metrics();
        m.days_used = 5;
        m.max_gap_minutes = 60;
        // days: 5 - 2*1.5 = 2, gap: 5 - 0.5*5 = 2.5
        assert_eq!(compactness_points(&m), 4.5);
    }

    #[test]
    fn test_degenerate_range_awards_half_weight() {
        let flat = TimeRange {
            min_start_hour: 10.0,
            max_end_hour: 10.0,
        };
        assert_eq!(time_of_day_points(&metrics(), &Preferences::default(), &flat), 15.0);
    }

    #[test]
    fn test_detect_range_scans_whole_group() {
        let json = r#"{
            "MAT": [{"courseCode":"MAT","courseName":"Calculo","sectionId":"1","shift":"Diurno",
                     "blocks":[{"day":"monday","start":"08:30","end":"10:00"}]}],
            "FIS": [{"courseCode":"FIS","courseName":"Fisica","sectionId":"1","shift":"Diurno",
                     "blocks":[{"day":"friday","start":"19:00","end":"22:15"}]}]
        }"#;
        let group: CourseGroup = serde_json::from_str(json).unwrap();
        let r = TimeRange::detect(&group);
        assert_eq!(r.min_start_hour, 8.5);
        assert_eq!(r.max_end_hour, 22.25);
        assert!(TimeRange::detect(&CourseGroup::new()).is_degenerate());
    }

    #[test]
    fn test_detect_range_after_twenty_three() {
        let json = r#"{
            "NOC": [{"courseCode":"NOC","courseName":"Nocturno","sectionId":"1","shift":"Noche",
                     "blocks":[{"day":"monday","start":"23:15","end":"23:45"}]}]
        }"#;
        let group: CourseGroup = serde_json::from_str(json).unwrap();
        let r = TimeRange::detect(&group);
        assert_eq!(r.min_start_hour, 23.25);
        assert_eq!(r.max_end_hour, 23.75);
        assert!(!r.is_degenerate());
    }

    #[test]
    fn test_score_is_clamped_and_rounded() {
        let mut m = metrics();
        m.total_gap_minutes = 100;
        let s = score(&m, &Preferences::default(), &range());
        assert!((0.0..=100.0).contains(&s));
        assert_eq!(s, (s * 100.0).round() / 100.0);
    }
}
