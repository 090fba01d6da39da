use crate::error::ScheduleError;
use crate::metrics::ScheduleMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Type aliases for clarity
pub type CourseCode = String;
pub type Minute = u16;

/// One complete selection of sections, one per required course, in course-code order.
pub type Combination = Vec<Section>;

/// A wall-clock time at minute resolution, stored as minutes since midnight.
///
/// Wire form is `"HH:MM"`; `"HH:MM:SS"` is accepted and the seconds dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(Minute);

impl TimeOfDay {
    pub fn from_hm(hour: u16, minute: u16) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTimeOfDay(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(hour * 60 + minute))
    }

    pub fn minutes(self) -> Minute {
        self.0
    }

    /// Decimal hours, e.g. 08:30 is 8.5.
    pub fn hours(self) -> f64 {
        f64::from(self.0 / 60) + f64::from(self.0 % 60) / 60.0
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTimeOfDay(s.to_string());
        let mut parts = s.trim().split(':');
        let hour = parts.next().ok_or_else(invalid)?;
        let minute = parts.next().ok_or_else(invalid)?;
        if let Some(second) = parts.next() {
            second.parse::<u16>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        let hour = hour.parse::<u16>().map_err(|_| invalid())?;
        let minute = minute.parse::<u16>().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Day of the week. Catalog exports use Spanish day names, accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    #[serde(alias = "LUNES", alias = "Lunes", alias = "lunes")]
    Monday,
    #[serde(alias = "MARTES", alias = "Martes", alias = "martes")]
    Tuesday,
    #[serde(
        alias = "MIERCOLES",
        alias = "MIÉRCOLES",
        alias = "Miercoles",
        alias = "Miércoles",
        alias = "miercoles",
        alias = "miércoles"
    )]
    Wednesday,
    #[serde(alias = "JUEVES", alias = "Jueves", alias = "jueves")]
    Thursday,
    #[serde(alias = "VIERNES", alias = "Viernes", alias = "viernes")]
    Friday,
    #[serde(
        alias = "SABADO",
        alias = "SÁBADO",
        alias = "Sabado",
        alias = "Sábado",
        alias = "sabado",
        alias = "sábado"
    )]
    Saturday,
    #[serde(alias = "DOMINGO", alias = "Domingo", alias = "domingo")]
    Sunday,
}

impl Weekday {
    /// Zero-based position, Monday first.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A weekly class block, half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeBlock")]
pub struct TimeBlock {
    pub day: Weekday,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeBlock {
    pub fn new(day: Weekday, start: TimeOfDay, end: TimeOfDay) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::InvalidTimeBlock {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { day, start, end })
    }
}

#[derive(Deserialize)]
struct RawTimeBlock {
    day: Weekday,
    start: TimeOfDay,
    end: TimeOfDay,
}

impl TryFrom<RawTimeBlock> for TimeBlock {
    type Error = ScheduleError;

    fn try_from(raw: RawTimeBlock) -> Result<Self, Self::Error> {
        TimeBlock::new(raw.day, raw.start, raw.end)
    }
}

/// One schedulable offering of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub course_code: CourseCode,
    pub course_name: String,
    pub section_id: String,
    #[serde(default)]
    pub teacher: Option<String>,
    pub shift: String,
    /// Remote-synchronous delivery.
    #[serde(default)]
    pub remote: bool,
    pub blocks: Vec<TimeBlock>,
}

/// Candidate sections per course code, iterated in lexicographic code order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseGroup(BTreeMap<CourseCode, Vec<Section>>);

impl CourseGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups a flat section list by course code, keeping per-course order.
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Self {
        let mut group = Self::new();
        for section in sections {
            group.insert(section);
        }
        group
    }

    pub fn insert(&mut self, section: Section) {
        self.0.entry(section.course_code.clone()).or_default().push(section);
    }

    pub fn get(&self, code: &str) -> Option<&[Section]> {
        self.0.get(code).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CourseCode, &Vec<Section>)> {
        self.0.iter()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.0.values().flatten()
    }

    pub fn section_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.section_count() == 0
    }

    /// Fails on the first section whose own course code differs from its key.
    pub fn check_codes(&self) -> Result<(), ScheduleError> {
        for (key, sections) in &self.0 {
            if let Some(section) = sections.iter().find(|s| &s.course_code != key) {
                return Err(ScheduleError::MisfiledSection {
                    key: key.clone(),
                    course_code: section.course_code.clone(),
                    section_id: section.section_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Copy of the group keeping only sections offered in `shift`.
    ///
    /// Course codes stay present even when narrowed to zero candidates.
    pub fn with_shift(&self, shift: &str) -> Self {
        Self(
            self.0
                .iter()
                .map(|(code, sections)| {
                    let kept = sections.iter().filter(|s| s.shift == shift).cloned().collect();
                    (code.clone(), kept)
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePreference {
    Want,
    Avoid,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDayPreference {
    StartEarly,
    StartLate,
    EndEarly,
    EndLate,
    #[default]
    Neutral,
}

/// Caller preferences. Unknown keys and values are rejected at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Preferences {
    pub minimize_gaps: bool,
    pub remote_preference: RemotePreference,
    pub time_of_day_preference: TimeOfDayPreference,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            minimize_gaps: true,
            remote_preference: RemotePreference::Neutral,
            time_of_day_preference: TimeOfDayPreference::Neutral,
        }
    }
}

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const DEFAULT_TIME_LIMIT_MS: u64 = 30_000;
pub const DEFAULT_MAX_LEAVES: usize = 100_000;

/// Resource limits for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchBudget {
    pub time_limit_ms: u64,
    pub max_leaves: usize,
    /// Unlimited when absent.
    pub max_nodes: Option<u64>,
    /// Split the first course level across threads.
    pub parallel: bool,
}

impl SearchBudget {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    /// A budget that never expires. Intended for tests and offline runs.
    pub fn unlimited() -> Self {
        Self {
            time_limit_ms: u64::MAX,
            max_leaves: usize::MAX,
            max_nodes: None,
            parallel: false,
        }
    }
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            max_leaves: DEFAULT_MAX_LEAVES,
            max_nodes: None,
            parallel: false,
        }
    }
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// The complete input for one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    /// Required course codes.
    pub courses: Vec<CourseCode>,
    pub sections: CourseGroup,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Active shift filter.
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub budget: Option<SearchBudget>,
}

/// A ranked candidate timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCombination {
    pub sections: Combination,
    pub metrics: ScheduleMetrics,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeReason {
    #[serde(rename = "NO_FEASIBLE_COMBINATION")]
    NoFeasibleCombination,
}

/// Counters collected during one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub nodes_explored: u64,
    pub leaves_found: usize,
    pub pruned_by_shift: u64,
    pub pruned_by_overlap: u64,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes={} leaves={} pruned_shift={} pruned_overlap={} elapsed={}ms timed_out={}",
            self.nodes_explored,
            self.leaves_found,
            self.pruned_by_shift,
            self.pruned_by_overlap,
            self.elapsed_ms,
            self.timed_out
        )
    }
}

/// The final output of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub results: Vec<ScoredCombination>,
    pub reason: Option<OutcomeReason>,
    pub stats: SearchStats,
}
