//! Quantitative features of a completed combination.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | `days_used` | Distinct days touched by any block |
//! | `total_gap_minutes` | Idle minutes between consecutive blocks, summed over days |
//! | `max_gap_minutes` | Largest single-day gap total |
//! | `remote_count` / `total_count` | Remote-synchronous sections vs. all sections |
//! | `avg_start_hour` / `avg_end_hour` | Mean earliest start / latest end over used days |
//! | `load_balance` | `max(0, 1 - variance(sections_per_day) / 16)` |
//!
//! Time before the first block and after the last block of a day is never
//! counted as a gap.

use crate::data::{Section, TimeOfDay, Weekday};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalization constant for the per-day load variance.
const LOAD_VARIANCE_SCALE: f64 = 16.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMetrics {
    pub days_used: usize,
    pub total_gap_minutes: u32,
    pub max_gap_minutes: u32,
    pub remote_count: usize,
    pub total_count: usize,
    /// Decimal hours, 0 when no day is used.
    pub avg_start_hour: f64,
    /// Decimal hours, 0 when no day is used.
    pub avg_end_hour: f64,
    /// In `[0, 1]`; 1 when no day is used.
    pub load_balance: f64,
    pub sections_per_day: BTreeMap<Weekday, usize>,
    pub gaps_per_day: BTreeMap<Weekday, u32>,
}

impl ScheduleMetrics {
    /// Computes metrics for the given sections.
    pub fn calculate<'a>(sections: impl IntoIterator<Item = &'a Section>) -> Self {
        let mut blocks_per_day: BTreeMap<Weekday, Vec<(TimeOfDay, TimeOfDay)>> = BTreeMap::new();
        let mut sections_per_day: BTreeMap<Weekday, usize> = BTreeMap::new();
        let mut remote_count = 0;
        let mut total_count = 0;

        for section in sections {
            total_count += 1;
            if section.remote {
                remote_count += 1;
            }
            for block in &section.blocks {
                blocks_per_day
                    .entry(block.day)
                    .or_default()
                    .push((block.start, block.end));
            }
            for day in section.blocks.iter().map(|b| b.day).unique() {
                *sections_per_day.entry(day).or_default() += 1;
            }
        }

        let mut gaps_per_day = BTreeMap::new();
        let mut start_hours = Vec::with_capacity(blocks_per_day.len());
        let mut end_hours = Vec::with_capacity(blocks_per_day.len());

        for (day, blocks) in blocks_per_day.iter_mut() {
            blocks.sort_unstable();
            let gap: u32 = blocks
                .iter()
                .tuple_windows()
                .map(|(prev, next)| u32::from(next.0.minutes().saturating_sub(prev.1.minutes())))
                .sum();
            gaps_per_day.insert(*day, gap);

            let first = blocks.first().map(|b| b.0);
            if let (Some(first), Some(last)) = (first, blocks.iter().map(|b| b.1).max()) {
                start_hours.push(first.hours());
                end_hours.push(last.hours());
            }
        }

        Self {
            days_used: blocks_per_day.len(),
            total_gap_minutes: gaps_per_day.values().sum(),
            max_gap_minutes: gaps_per_day.values().copied().max().unwrap_or(0),
            remote_count,
            total_count,
            avg_start_hour: mean(&start_hours),
            avg_end_hour: mean(&end_hours),
            load_balance: load_balance(sections_per_day.values().copied()),
            sections_per_day,
            gaps_per_day,
        }
    }

    /// Share of remote-synchronous sections; an empty combination counts as one section.
    pub fn remote_ratio(&self) -> f64 {
        self.remote_count as f64 / self.total_count.max(1) as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn load_balance(counts: impl Iterator<Item = usize>) -> f64 {
    let counts: Vec<f64> = counts.map(|c| c as f64).collect();
    if counts.is_empty() {
        return 1.0;
    }
    let avg = mean(&counts);
    let variance = counts.iter().map(|c| (c - avg).powi(2)).sum::<f64>() / counts.len() as f64;
    (1.0 - variance / LOAD_VARIANCE_SCALE).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeBlock;
    use crate::data::Weekday::{Friday, Monday, Tuesday, Wednesday};

    fn section(remote: bool, blocks: &[(Weekday, &str, &str)]) -> Section {
        Section {
            course_code: "X".into(),
            course_name: "X".into(),
            section_id: "1".into(),
            teacher: Some("Prof".into()),
            shift: "Diurno".into(),
            remote,
            blocks: blocks
                .iter()
                .map(|(day, s, e)| {
                    TimeBlock::new(*day, s.parse().unwrap(), e.parse().unwrap()).unwrap()
                })
                .collect(),
        }
    }

    #[test]
    fn test_gaps_only_between_blocks() {
        let sections = [
            section(false, &[(Monday, "08:00", "09:30")]),
            section(false, &[(Monday, "11:00", "12:00")]),
            section(false, &[(Monday, "12:00", "13:00")]),
        ];
        let m = ScheduleMetrics::calculate(&sections);
        assert_eq!(m.days_used, 1);
        assert_eq!(m.total_gap_minutes, 90);
        assert_eq!(m.max_gap_minutes, 90);
        assert_eq!(m.gaps_per_day.get(&Weekday::Monday), Some(&90));
    }

    #[test]
    fn test_max_gap_is_largest_day_total() {
        let sections = [
            section(false, &[(Monday, "08:00", "09:00"), (Tuesday, "08:00", "09:00")]),
            section(false, &[(Monday, "10:00", "11:00"), (Tuesday, "12:00", "13:00")]),
            section(false, &[(Monday, "12:00", "13:00")]),
        ];
        let m = ScheduleMetrics::calculate(&sections);
        assert_eq!(m.total_gap_minutes, 120 + 180);
        assert_eq!(m.max_gap_minutes, 180);
    }

    #[test]
    fn test_average_start_and_end_hours() {
        let sections = [
            section(false, &[(Monday, "08:30", "10:00"), (Wednesday, "10:00", "12:00")]),
            section(false, &[(Monday, "10:00", "13:00")]),
        ];
        let m = ScheduleMetrics::calculate(&sections);
        assert_eq!(m.avg_start_hour, (8.5 + 10.0) / 2.0);
        assert_eq!(m.avg_end_hour, (13.0 + 12.0) / 2.0);
    }

    #[test]
    fn test_remote_counts() {
        let sections = [
            section(true, &[(Friday, "08:00", "09:00")]),
            section(false, &[(Friday, "09:00", "10:00")]),
        ];
        let m = ScheduleMetrics::calculate(&sections);
        assert_eq!(m.remote_count, 1);
        assert_eq!(m.total_count, 2);
        assert_eq!(m.remote_ratio(), 0.5);
    }

    #[test]
    fn test_load_balance_uses_sections_per_day() {
        // Monday 2 sections, Friday 1, Tuesday unused: counts [2, 1], variance 0.25.
        let sections = [
            section(false, &[(Monday, "08:00", "09:00"), (Friday, "08:00", "09:00")]),
            section(false, &[(Monday, "10:00", "11:00"), (Monday, "12:00", "13:00")]),
        ];
        let m = ScheduleMetrics::calculate(&sections);
        assert_eq!(m.sections_per_day.get(&Weekday::Monday), Some(&2));
        assert_eq!(m.sections_per_day.get(&Weekday::Friday), Some(&1));
        assert_eq!(m.load_balance, 1.0 - 0.25 / 16.0);
    }

    #[test]
    fn test_empty_combination_defaults() {
        let m = ScheduleMetrics::calculate(std::iter::empty());
        assert_eq!(m.days_used, 0);
        assert_eq!(m.avg_start_hour, 0.0);
        assert_eq!(m.load_balance, 1.0);
        assert_eq!(m.remote_ratio(), 0.0);
    }
}
