use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Failures surfaced to the caller.
///
/// Everything except [`ScheduleError::Internal`] is raised before the search
/// starts. Timeouts and empty result sets are not errors; they are reported
/// through [`crate::data::SearchOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// No course codes were requested.
    #[error("no course codes requested")]
    NoCoursesRequested,

    /// The course group carries no sections at all.
    #[error("course group is empty")]
    EmptyCourseGroup,

    /// `maxResults` must be at least one.
    #[error("maxResults must be greater than zero")]
    InvalidMaxResults,

    /// A required course has no candidate sections under the active filters.
    #[error("NO_SECTIONS_FOR({0})")]
    NoSectionsFor(String),

    /// A section filed under a course code other than its own.
    #[error("section {section_id} of course {course_code} is filed under {key}")]
    MisfiledSection {
        key: String,
        course_code: String,
        section_id: String,
    },

    /// A time string could not be parsed as `HH:MM`.
    #[error("invalid time of day: {0}")]
    InvalidTimeOfDay(String),

    /// A block whose start is not strictly before its end.
    #[error("invalid time block: start {start} is not before end {end}")]
    InvalidTimeBlock { start: String, end: String },

    /// Unexpected fault inside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScheduleError {
    /// True for faults caused by the request rather than the engine.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, ScheduleError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sections_renders_reason_code() {
        let err = ScheduleError::NoSectionsFor("MAT1100".to_string());
        assert_eq!(err.to_string(), "NO_SECTIONS_FOR(MAT1100)");
        assert!(err.is_input_error());
    }

    #[test]
    fn test_misfiled_section_names_both_codes() {
        let err = ScheduleError::MisfiledSection {
            key: "A".into(),
            course_code: "Z".into(),
            section_id: "1".into(),
        };
        assert_eq!(err.to_string(), "section 1 of course Z is filed under A");
        assert!(err.is_input_error());
    }

    #[test]
    fn test_internal_is_not_input_error() {
        assert!(!ScheduleError::Internal("worker panicked".into()).is_input_error());
    }
}
