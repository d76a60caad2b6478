//! Pure recurrence expansion.
//!
//! Turns a pattern plus an inclusive local-date window into the ordered
//! local dates on which occurrences fall. No I/O, no hidden state; date
//! arithmetic is delegated to chrono so leap years and month lengths
//! are handled correctly.

use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate, Weekday};

use crate::error::EngineError;
use crate::schedule::CadencePattern;

/// Expand a pattern over the inclusive window `[start, end]`.
///
/// Returns the occurrence dates in ascending order. An inverted window
/// (`start > end`) yields no occurrences.
///
/// # Errors
///
/// Returns [`EngineError::InvalidSchedule`] for a weekly pattern with an
/// empty `days_of_week` — that definition would silently produce zero
/// occurrences forever.
pub fn expand(
    pattern: CadencePattern,
    days_of_week: &HashSet<Weekday>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, EngineError> {
    if start > end {
        return Ok(Vec::new());
    }

    match pattern {
        CadencePattern::Daily => Ok(expand_daily(days_of_week, start, end)),
        CadencePattern::Weekly => {
            if days_of_week.is_empty() {
                return Err(EngineError::InvalidSchedule(
                    "weekly cadence requires a non-empty days_of_week".to_owned(),
                ));
            }
            Ok(filter_by_weekday(days_of_week, start, end))
        }
        CadencePattern::Monthly => Ok(expand_month_firsts(start, end, 1)),
        CadencePattern::Quarterly => Ok(expand_month_firsts(start, end, 3)),
    }
}

/// Every date in the window; a strict weekday subset filters it
/// (this is how "daily" can mean "every weekday").
fn expand_daily(days_of_week: &HashSet<Weekday>, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if days_of_week.is_empty() || days_of_week.len() >= 7 {
        return start.iter_days().take_while(|d| *d <= end).collect();
    }
    filter_by_weekday(days_of_week, start, end)
}

fn filter_by_weekday(
    days_of_week: &HashSet<Weekday>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| days_of_week.contains(&d.weekday()))
        .collect()
}

/// The 1st of every `step_months`-th month counted from the window
/// start's month, clamped to the window.
fn expand_month_firsts(start: NaiveDate, end: NaiveDate, step_months: u32) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    // with_day(1) never fails for day 1.
    let mut first = match start.with_day(1) {
        Some(d) => d,
        None => return out,
    };
    while first <= end {
        if first >= start {
            out.push(first);
        }
        first = match first.checked_add_months(Months::new(step_months)) {
            Some(d) => d,
            None => break,
        };
    }
    out
}
