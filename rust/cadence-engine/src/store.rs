//! Instance model and persistence port.
//!
//! Provides the trait-based store abstraction the engine writes through,
//! plus an in-memory backend used in tests and embeddable where no
//! external database is wired up.
//!
//! Backends must enforce a uniqueness constraint on
//! `(cadence_id, scheduled_for rounded to the minute)` and surface
//! collisions as [`StoreError::UniqueViolation`]; that constraint, not a
//! lock in this engine, is what makes concurrent generation for the same
//! cadence safe.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Instance lifecycle status.
///
/// Time-driven transitions (`pending -> ready`, `ready|in_progress ->
/// missed`) are performed by the lifecycle manager; `completed`,
/// `skipped`, and manual resets are driven by external actors acting on
/// the store directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Created but not yet available.
    Pending,
    /// Available for work.
    Ready,
    /// Picked up by an assignee.
    InProgress,
    /// Finished by an external actor.
    Completed,
    /// Deadline passed without completion.
    Missed,
    /// Declined by an external actor.
    Skipped,
}

impl InstanceStatus {
    /// Status string for storage and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Missed => "missed",
            Self::Skipped => "skipped",
        }
    }

    /// Parse a status from its storage string.
    ///
    /// # Errors
    ///
    /// Returns an error if the status string is invalid.
    #[allow(clippy::should_implement_trait, reason = "Different signature than std::str::FromStr")]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "missed" => Ok(Self::Missed),
            "skipped" => Ok(Self::Skipped),
            _ => anyhow::bail!("Invalid instance status: {s}"),
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete occurrence of a cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Unique instance identifier.
    pub id: Uuid,
    /// Cadence this occurrence belongs to (reference, not ownership).
    pub cadence_id: Uuid,
    /// UTC instant at which the task becomes available.
    pub scheduled_for: DateTime<Utc>,
    /// UTC deadline; always `scheduled_for + completion_window_hours`.
    pub due_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: InstanceStatus,
    /// Opaque assignee identifiers, copied from the cadence.
    pub assigned_to: Vec<String>,
    /// Opaque metadata bag (generation timestamp, source timezone, ...).
    pub metadata: serde_json::Value,
    /// Completion timestamp, set by external actors.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Creation payload for a new instance.
#[derive(Debug, Clone)]
pub struct NewInstance {
    /// Owning cadence.
    pub cadence_id: Uuid,
    /// UTC availability instant.
    pub scheduled_for: DateTime<Utc>,
    /// UTC deadline.
    pub due_at: DateTime<Utc>,
    /// Initial status (the generator always uses `Pending`).
    pub status: InstanceStatus,
    /// Assignees copied through from the cadence.
    pub assigned_to: Vec<String>,
    /// Opaque metadata bag.
    pub metadata: serde_json::Value,
}

/// Predicate for a bulk status update.
///
/// An instance matches when its status is in `status_in` and every set
/// time bound holds.
#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    /// Exact statuses to match; an empty list matches nothing.
    pub status_in: Vec<InstanceStatus>,
    /// Matches instances with `scheduled_for <= bound`.
    pub scheduled_at_or_before: Option<DateTime<Utc>>,
    /// Matches instances with `due_at < bound`.
    pub due_before: Option<DateTime<Utc>>,
}

impl StatusFilter {
    /// Whether the given instance satisfies the predicate.
    #[must_use]
    pub fn matches(&self, instance: &Instance) -> bool {
        if !self.status_in.contains(&instance.status) {
            return false;
        }
        if let Some(bound) = self.scheduled_at_or_before {
            if instance.scheduled_for > bound {
                return false;
            }
        }
        if let Some(bound) = self.due_before {
            if instance.due_at >= bound {
                return false;
            }
        }
        true
    }
}

/// Persistence port for instance records.
///
/// Each operation is assumed atomic per call; the engine does not rely
/// on cross-call transactions.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Find an instance of the cadence whose `scheduled_for` lies within
    /// `tolerance` of `near`.
    async fn find_instance(
        &self,
        cadence_id: Uuid,
        near: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Option<Instance>, StoreError>;

    /// Persist a new instance.
    ///
    /// Returns [`StoreError::UniqueViolation`] if the cadence already has
    /// an instance in the same minute slot.
    async fn create_instance(&self, data: NewInstance) -> Result<Instance, StoreError>;

    /// Set `new_status` on every instance matching `filter`; returns the
    /// number of instances updated.
    async fn update_instances_matching(
        &self,
        filter: StatusFilter,
        new_status: InstanceStatus,
    ) -> Result<u64, StoreError>;
}

/// Round an instant to its nearest-minute slot for the uniqueness key.
fn minute_slot(instant: DateTime<Utc>) -> i64 {
    (instant.timestamp() + 30).div_euclid(60)
}

#[derive(Debug, Default)]
struct InMemoryInner {
    instances: HashMap<Uuid, Instance>,
    /// Uniqueness index on `(cadence_id, minute slot)`.
    slots: HashSet<(Uuid, i64)>,
}

/// In-memory store backend.
///
/// Enforces the same `(cadence_id, minute slot)` uniqueness constraint a
/// database backend would, so idempotency behaves identically in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<parking_lot::RwLock<InMemoryInner>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a single instance by ID.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Instance> {
        self.inner.read().instances.get(&id).cloned()
    }

    /// Snapshot of all instances, ordered by `scheduled_for`.
    #[must_use]
    pub fn all(&self) -> Vec<Instance> {
        let inner = self.inner.read();
        let mut out: Vec<Instance> = inner.instances.values().cloned().collect();
        out.sort_by_key(|i| i.scheduled_for);
        out
    }

    /// Overwrite an instance's status directly, bypassing the lifecycle
    /// rules. Models externally-driven transitions (complete, skip,
    /// manual reset) in tests.
    pub fn set_status(&self, id: Uuid, status: InstanceStatus) {
        let mut inner = self.inner.write();
        if let Some(instance) = inner.instances.get_mut(&id) {
            instance.status = status;
        }
    }
}

#[async_trait]
impl InstanceStore for InMemoryStore {
    async fn find_instance(
        &self,
        cadence_id: Uuid,
        near: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Option<Instance>, StoreError> {
        let inner = self.inner.read();
        let found = inner
            .instances
            .values()
            .filter(|i| i.cadence_id == cadence_id)
            .filter(|i| (i.scheduled_for - near).abs() <= tolerance)
            .min_by_key(|i| i.scheduled_for)
            .cloned();
        Ok(found)
    }

    async fn create_instance(&self, data: NewInstance) -> Result<Instance, StoreError> {
        let mut inner = self.inner.write();
        let slot = (data.cadence_id, minute_slot(data.scheduled_for));
        if !inner.slots.insert(slot) {
            return Err(StoreError::UniqueViolation {
                cadence_id: data.cadence_id,
                scheduled_for: data.scheduled_for,
            });
        }

        let instance = Instance {
            id: Uuid::new_v4(),
            cadence_id: data.cadence_id,
            scheduled_for: data.scheduled_for,
            due_at: data.due_at,
            status: data.status,
            assigned_to: data.assigned_to,
            metadata: data.metadata,
            completed_at: None,
        };
        inner.instances.insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn update_instances_matching(
        &self,
        filter: StatusFilter,
        new_status: InstanceStatus,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let mut updated = 0u64;
        for instance in inner.instances.values_mut() {
            if filter.matches(instance) {
                instance.status = new_status;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn new_instance(cadence_id: Uuid, scheduled_for: DateTime<Utc>) -> NewInstance {
        NewInstance {
            cadence_id,
            scheduled_for,
            due_at: scheduled_for + Duration::hours(4),
            status: InstanceStatus::Pending,
            assigned_to: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn create_then_find_within_tolerance() {
        let store = InMemoryStore::new();
        let cadence_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 14, 0, 0).unwrap();

        store.create_instance(new_instance(cadence_id, at)).await.unwrap();

        let found = store
            .find_instance(cadence_id, at + Duration::seconds(30), Duration::minutes(1))
            .await
            .unwrap();
        assert!(found.is_some());

        let missed = store
            .find_instance(cadence_id, at + Duration::minutes(5), Duration::minutes(1))
            .await
            .unwrap();
        assert!(missed.is_none());
    }

    #[tokio::test]
    async fn same_minute_slot_violates_uniqueness() {
        let store = InMemoryStore::new();
        let cadence_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 14, 0, 0).unwrap();

        store.create_instance(new_instance(cadence_id, at)).await.unwrap();
        let err = store
            .create_instance(new_instance(cadence_id, at + Duration::seconds(10)))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        // A different cadence may use the same slot.
        store
            .create_instance(new_instance(Uuid::new_v4(), at))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bulk_update_touches_only_matching_statuses() {
        let store = InMemoryStore::new();
        let cadence_id = Uuid::new_v4();
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        let a = store.create_instance(new_instance(cadence_id, base)).await.unwrap();
        let b = store
            .create_instance(new_instance(cadence_id, base + Duration::hours(24)))
            .await
            .unwrap();
        store.set_status(b.id, InstanceStatus::Completed);

        let updated = store
            .update_instances_matching(
                StatusFilter {
                    status_in: vec![InstanceStatus::Pending],
                    scheduled_at_or_before: Some(base + Duration::hours(48)),
                    due_before: None,
                },
                InstanceStatus::Ready,
            )
            .await
            .unwrap();

        assert_eq!(updated, 1);
        assert_eq!(store.get(a.id).unwrap().status, InstanceStatus::Ready);
        assert_eq!(store.get(b.id).unwrap().status, InstanceStatus::Completed);
    }

    #[test]
    fn status_round_trips_through_storage_string() {
        for status in [
            InstanceStatus::Pending,
            InstanceStatus::Ready,
            InstanceStatus::InProgress,
            InstanceStatus::Completed,
            InstanceStatus::Missed,
            InstanceStatus::Skipped,
        ] {
            assert_eq!(InstanceStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(InstanceStatus::from_str("archived").is_err());
    }
}
