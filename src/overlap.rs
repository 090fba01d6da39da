//! Time conflict detection for the combination search.
//!
//! Intervals are half-open, so blocks that merely touch (`end == start`)
//! do not conflict.

use crate::data::{Minute, Section, TimeBlock, Weekday};

/// Half-open interval test on raw minute bounds.
#[inline]
pub fn intervals_overlap(a: (Minute, Minute), b: (Minute, Minute)) -> bool {
    a.0 < b.1 && a.1 > b.0
}

/// True when both blocks fall on the same day and their intervals intersect.
#[inline]
pub fn overlaps(a: &TimeBlock, b: &TimeBlock) -> bool {
    a.day == b.day
        && intervals_overlap(
            (a.start.minutes(), a.end.minutes()),
            (b.start.minutes(), b.end.minutes()),
        )
}

/// Lengths of every day list at the moment a section was claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint([usize; 7]);

/// Intervals already claimed by the partial combination, per day.
///
/// Each day list is an append-only arena. A search branch claims a section,
/// recurses, and rewinds to the returned checkpoint, so siblings never see
/// each other's tentative intervals and no per-level copy is made.
#[derive(Debug, Clone, Default)]
pub struct OccupancyMap {
    days: [Vec<(Minute, Minute)>; 7],
}

impl OccupancyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intervals(&self, day: Weekday) -> &[(Minute, Minute)] {
        &self.days[day.index()]
    }

    /// Whether any block of `section` overlaps an interval on the same day.
    pub fn conflicts(&self, section: &Section) -> bool {
        section.blocks.iter().any(|block| {
            let candidate = (block.start.minutes(), block.end.minutes());
            self.intervals(block.day)
                .iter()
                .any(|&taken| intervals_overlap(candidate, taken))
        })
    }

    /// Appends the section's blocks and returns the state to rewind to.
    pub fn claim(&mut self, section: &Section) -> Checkpoint {
        let checkpoint = Checkpoint(std::array::from_fn(|i| self.days[i].len()));
        for block in &section.blocks {
            self.days[block.day.index()].push((block.start.minutes(), block.end.minutes()));
        }
        checkpoint
    }

    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        for (day, len) in self.days.iter_mut().zip(checkpoint.0) {
            day.truncate(len);
        }
    }
}
