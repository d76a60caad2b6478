//! IANA timezone resolution.
//!
//! Converts a local (naive) occurrence datetime plus an IANA zone
//! identifier into an absolute UTC instant, applying the zone's offset
//! as of that date rather than a fixed offset.
//!
//! DST edge policy:
//! - a nonexistent local time (spring-forward gap) resolves to the first
//!   valid instant after the gap;
//! - an ambiguous local time (fall-back repeat) resolves to the earlier
//!   of the two instants.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::EngineError;
use crate::schedule::TimeOfDay;

/// Longest forward probe when a local time falls in a DST gap. Real
/// tzdata gaps are at most a few hours.
const MAX_GAP_PROBE_MINUTES: i64 = 24 * 60;

/// Parse an IANA timezone identifier.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] if the identifier is unknown.
pub fn parse_timezone(timezone: &str) -> Result<Tz, EngineError> {
    timezone
        .parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(timezone.to_owned()))
}

/// Resolve a local date and time of day in the given zone to a UTC instant.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] if the identifier is unknown,
/// or [`EngineError::InvalidSchedule`] if the local datetime cannot be
/// formed or mapped at all.
pub fn resolve(date: NaiveDate, time: TimeOfDay, timezone: &str) -> Result<DateTime<Utc>, EngineError> {
    let tz = parse_timezone(timezone)?;
    resolve_in(date, time, tz)
}

/// Resolve against an already-parsed zone.
///
/// # Errors
///
/// Returns [`EngineError::InvalidSchedule`] if the local datetime cannot
/// be formed or mapped at all.
pub fn resolve_in(date: NaiveDate, time: TimeOfDay, tz: Tz) -> Result<DateTime<Utc>, EngineError> {
    let local = date
        .and_hms_opt(u32::from(time.hour), u32::from(time.minute), 0)
        .ok_or_else(|| EngineError::InvalidSchedule(format!("invalid time of day: {time}")))?;

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        // Fall-back repeat: take the first occurrence of that wall time.
        LocalResult::Ambiguous(earlier, _later) => Ok(earlier.with_timezone(&Utc)),
        // Spring-forward gap: the first valid instant after the gap.
        LocalResult::None => {
            let mut probe = local;
            for _ in 0..MAX_GAP_PROBE_MINUTES {
                probe += Duration::minutes(1);
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) => return Ok(dt.with_timezone(&Utc)),
                    LocalResult::Ambiguous(earlier, _) => return Ok(earlier.with_timezone(&Utc)),
                    LocalResult::None => {}
                }
            }
            Err(EngineError::InvalidSchedule(format!(
                "local time {local} cannot be mapped in {tz}"
            )))
        }
    }
}
