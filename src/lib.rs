//! Conflict-free timetable search.
//!
//! Given alternative sections for each required course, [`generate`] enumerates
//! every combination with exactly one section per course, no overlapping class
//! blocks and a single shift, scores each against the caller's preferences and
//! returns the best ones.

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod overlap;
pub mod ranker;
pub mod score;
pub mod server;
pub mod solver;

pub use data::{
    CourseGroup, OutcomeReason, Preferences, RemotePreference, ScheduleRequest, ScoredCombination,
    SearchBudget, SearchOutcome, SearchStats, Section, TimeBlock, TimeOfDay, TimeOfDayPreference,
    Weekday,
};
pub use error::{Result, ScheduleError};
pub use metrics::ScheduleMetrics;
pub use solver::{CombinationEnumerator, generate};
