//! Error types for cadence expansion, generation, and lifecycle sweeps.
//!
//! Errors are scoped to a single cadence or sweep rule: a failure here
//! never poisons another cadence in the same batch invocation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Errors produced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The recurrence pattern string is not one of the supported kinds.
    #[error("unsupported recurrence pattern: {0}")]
    UnsupportedPattern(String),

    /// The IANA timezone identifier could not be resolved.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The schedule definition is contradictory or incomplete
    /// (e.g. a weekly cadence with no days of week).
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The persistence port failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by an [`InstanceStore`](crate::store::InstanceStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An instance already exists for this cadence at (or within a minute
    /// of) this instant. The generator treats this as a benign outcome:
    /// a concurrent invocation won the create race.
    #[error("instance already exists for cadence {cadence_id} at {scheduled_for}")]
    UniqueViolation {
        /// Cadence whose slot is already occupied.
        cadence_id: Uuid,
        /// The contested `scheduled_for` instant.
        scheduled_for: DateTime<Utc>,
    },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Returns `true` for the benign duplicate-create outcome.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_detectable() {
        let err = StoreError::UniqueViolation {
            cadence_id: Uuid::new_v4(),
            scheduled_for: Utc::now(),
        };
        assert!(err.is_unique_violation());
        assert!(!StoreError::Unavailable("down".to_owned()).is_unique_violation());
    }

    #[test]
    fn store_errors_convert_into_engine_errors() {
        let err: EngineError = StoreError::Unavailable("down".to_owned()).into();
        assert!(matches!(err, EngineError::Store(_)));
    }
}
