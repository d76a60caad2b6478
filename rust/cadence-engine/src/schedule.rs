//! Cadence schedule model and validation.
//!
//! A [`CadenceSchedule`] is the declarative recurrence definition this
//! engine reads ("every weekday at 9am in America/New_York, complete
//! within 4 hours"). It is owned and mutated by the surrounding
//! application; the engine only consumes it.

use std::collections::HashSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Supported recurrence patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadencePattern {
    /// Every calendar day, optionally filtered to a weekday subset.
    Daily,
    /// Only on the given days of week (required, non-empty).
    Weekly,
    /// The 1st calendar day of every month.
    Monthly,
    /// The 1st calendar day of every third month.
    Quarterly,
}

impl CadencePattern {
    /// Pattern name for storage and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// Parse a pattern from its storage string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedPattern`] for anything other
    /// than the four supported kinds.
    #[allow(clippy::should_implement_trait, reason = "Different signature than std::str::FromStr")]
    pub fn from_str(s: &str) -> Result<Self, EngineError> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            other => Err(EngineError::UnsupportedPattern(other.to_owned())),
        }
    }
}

impl std::fmt::Display for CadencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a schedule recurs or fires once.
///
/// One-time schedules are materialized by the surrounding application,
/// not by this engine; the generator skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Expanded by the generator over its lookahead window.
    Recurring,
    /// Fires once; never expanded here.
    OneTime,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recurring => f.write_str("recurring"),
            Self::OneTime => f.write_str("one_time"),
        }
    }
}

/// Local wall-clock time of day at which an occurrence becomes available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    /// Hour of day (0-23, local).
    pub hour: u8,
    /// Minute of hour (0-59).
    pub minute: u8,
}

impl TimeOfDay {
    /// Create a validated time of day.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSchedule`] if hour or minute is out
    /// of range.
    pub fn new(hour: u8, minute: u8) -> Result<Self, EngineError> {
        if hour > 23 || minute > 59 {
            return Err(EngineError::InvalidSchedule(format!(
                "time of day out of range: {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A recurrence definition.
///
/// Read-only from the engine's perspective. `days_of_week` is meaningful
/// for `Daily` (optional filter) and `Weekly` (required, non-empty);
/// `Monthly` and `Quarterly` ignore it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceSchedule {
    /// Unique cadence identifier.
    pub id: Uuid,
    /// Recurrence pattern.
    pub pattern: CadencePattern,
    /// Local time of day for each occurrence.
    pub time_of_day: TimeOfDay,
    /// IANA timezone identifier (e.g. `America/New_York`).
    pub timezone: String,
    /// Weekday filter; see the type-level doc for when it applies.
    pub days_of_week: HashSet<Weekday>,
    /// Hours after `scheduled_for` before an instance is overdue.
    pub completion_window_hours: u32,
    /// Opaque assignee identifiers, passed through to instances unchanged.
    pub assigned_to: Vec<String>,
    /// Inactive cadences are skipped entirely.
    pub is_active: bool,
    /// Recurring vs one-time.
    pub kind: ScheduleKind,
}

impl CadenceSchedule {
    /// Create a validated, active, recurring cadence.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSchedule`] if the definition is
    /// contradictory (see [`CadenceSchedule::validate`]).
    pub fn new(
        pattern: CadencePattern,
        time_of_day: TimeOfDay,
        timezone: impl Into<String>,
        days_of_week: HashSet<Weekday>,
        completion_window_hours: u32,
    ) -> Result<Self, EngineError> {
        let cadence = Self {
            id: Uuid::new_v4(),
            pattern,
            time_of_day,
            timezone: timezone.into(),
            days_of_week,
            completion_window_hours,
            assigned_to: Vec::new(),
            is_active: true,
            kind: ScheduleKind::Recurring,
        };
        cadence.validate()?;
        Ok(cadence)
    }

    /// Check the definition for contradictions.
    ///
    /// A weekly cadence with an empty `days_of_week` would silently
    /// produce zero occurrences, so it is rejected here instead.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSchedule`] on a contradictory
    /// definition.
    pub fn validate(&self) -> Result<(), EngineError> {
        TimeOfDay::new(self.time_of_day.hour, self.time_of_day.minute)?;
        if self.pattern == CadencePattern::Weekly && self.days_of_week.is_empty() {
            return Err(EngineError::InvalidSchedule(
                "weekly cadence requires a non-empty days_of_week".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn weekdays(days: &[Weekday]) -> HashSet<Weekday> {
        days.iter().copied().collect()
    }

    #[test]
    fn pattern_round_trips_through_storage_string() {
        for pattern in [
            CadencePattern::Daily,
            CadencePattern::Weekly,
            CadencePattern::Monthly,
            CadencePattern::Quarterly,
        ] {
            assert_eq!(CadencePattern::from_str(pattern.as_str()).unwrap(), pattern);
        }
    }

    #[test]
    fn unknown_pattern_string_is_rejected() {
        let err = CadencePattern::from_str("fortnightly").unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedPattern(_)));
    }

    #[test]
    fn time_of_day_bounds_are_enforced() {
        assert!(TimeOfDay::new(23, 59).is_ok());
        assert!(TimeOfDay::new(24, 0).is_err());
        assert!(TimeOfDay::new(9, 60).is_err());
    }

    #[test]
    fn weekly_without_days_fails_validation() {
        let err = CadenceSchedule::new(
            CadencePattern::Weekly,
            TimeOfDay::new(9, 0).unwrap(),
            "America/New_York",
            HashSet::new(),
            4,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSchedule(_)));
    }

    #[test]
    fn daily_without_days_is_valid() {
        let cadence = CadenceSchedule::new(
            CadencePattern::Daily,
            TimeOfDay::new(9, 0).unwrap(),
            "America/New_York",
            HashSet::new(),
            4,
        )
        .unwrap();
        assert!(cadence.is_active);
        assert_eq!(cadence.kind, ScheduleKind::Recurring);
    }

    #[test]
    fn weekly_with_days_is_valid() {
        let cadence = CadenceSchedule::new(
            CadencePattern::Weekly,
            TimeOfDay::new(17, 30).unwrap(),
            "Europe/London",
            weekdays(&[Weekday::Mon, Weekday::Fri]),
            48,
        )
        .unwrap();
        assert_eq!(cadence.days_of_week.len(), 2);
    }

    #[test]
    fn pattern_serde_uses_snake_case() {
        let json = serde_json::to_string(&CadencePattern::Quarterly).unwrap();
        assert_eq!(json, "\"quarterly\"");
    }
}
