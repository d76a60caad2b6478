//! Time-driven instance status sweeps.
//!
//! Performs exactly two transitions, both pure functions of stored
//! timestamps against the current instant:
//!
//! 1. `pending -> ready` once `scheduled_for` has passed;
//! 2. `ready | in_progress -> missed` once `due_at` has passed.
//!
//! `completed`, `skipped`, and manual resets are external actions on the
//! store; the exact-status filters here guarantee those records are
//! never touched, so a completed instance stays completed no matter how
//! overdue it is.

use std::sync::Arc;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::logging::OpTimer;
use crate::store::{InstanceStatus, InstanceStore, StatusFilter};

/// Counts of instances transitioned by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Instances moved `pending -> ready`.
    pub readied: u64,
    /// Instances moved `ready | in_progress -> missed`.
    pub missed: u64,
}

/// Advances instance statuses as a function of wall-clock time.
pub struct LifecycleManager {
    store: Arc<dyn InstanceStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager").finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Create a lifecycle manager over the given store and clock.
    pub fn new(store: Arc<dyn InstanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Run both sweeps once and return the transition counts.
    ///
    /// The two rules are isolated: if the ready sweep fails, the missed
    /// sweep still runs, and the first error is surfaced afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if either sweep's bulk update
    /// failed.
    pub async fn update_instance_statuses(&self) -> Result<SweepOutcome, EngineError> {
        let timer = OpTimer::new("lifecycle", "sweep");
        let now = self.clock.now();
        let mut outcome = SweepOutcome::default();
        let mut first_error: Option<EngineError> = None;

        match self
            .store
            .update_instances_matching(
                StatusFilter {
                    status_in: vec![InstanceStatus::Pending],
                    scheduled_at_or_before: Some(now),
                    due_before: None,
                },
                InstanceStatus::Ready,
            )
            .await
        {
            Ok(count) => outcome.readied = count,
            Err(e) => {
                tracing::warn!(error = %e, "pending -> ready sweep failed");
                first_error = Some(e.into());
            }
        }

        match self
            .store
            .update_instances_matching(
                StatusFilter {
                    status_in: vec![InstanceStatus::Ready, InstanceStatus::InProgress],
                    scheduled_at_or_before: None,
                    due_before: Some(now),
                },
                InstanceStatus::Missed,
            )
            .await
        {
            Ok(count) => outcome.missed = count,
            Err(e) => {
                tracing::warn!(error = %e, "overdue -> missed sweep failed");
                if first_error.is_none() {
                    first_error = Some(e.into());
                }
            }
        }

        match first_error {
            Some(e) => {
                timer.finish_with_error(&e);
                Err(e)
            }
            None => {
                tracing::info!(
                    readied = outcome.readied,
                    missed = outcome.missed,
                    "Lifecycle sweep completed"
                );
                timer.finish();
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{InMemoryStore, InstanceStore, NewInstance};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    async fn seed(
        store: &InMemoryStore,
        scheduled_for: chrono::DateTime<Utc>,
        due_at: chrono::DateTime<Utc>,
        status: InstanceStatus,
    ) -> Uuid {
        let instance = store
            .create_instance(NewInstance {
                cadence_id: Uuid::new_v4(),
                scheduled_for,
                due_at,
                status: InstanceStatus::Pending,
                assigned_to: Vec::new(),
                metadata: serde_json::Value::Null,
            })
            .await
            .unwrap();
        store.set_status(instance.id, status);
        instance.id
    }

    #[tokio::test]
    async fn both_rules_fire_in_a_single_pass() {
        // One instance becomes ready, another becomes missed.
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();

        let ready_candidate = seed(
            &store,
            now - Duration::hours(1),
            now + Duration::hours(3),
            InstanceStatus::Pending,
        )
        .await;
        let missed_candidate = seed(
            &store,
            now - Duration::hours(6),
            now - Duration::minutes(1),
            InstanceStatus::Ready,
        )
        .await;

        let manager = LifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(now)),
        );
        let outcome = manager.update_instance_statuses().await.unwrap();

        assert_eq!(outcome, SweepOutcome { readied: 1, missed: 1 });
        assert_eq!(store.get(ready_candidate).unwrap().status, InstanceStatus::Ready);
        assert_eq!(store.get(missed_candidate).unwrap().status, InstanceStatus::Missed);
    }

    #[tokio::test]
    async fn future_instances_are_untouched() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();

        let future = seed(
            &store,
            now + Duration::hours(2),
            now + Duration::hours(6),
            InstanceStatus::Pending,
        )
        .await;

        let manager = LifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(now)),
        );
        let outcome = manager.update_instance_statuses().await.unwrap();

        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!(store.get(future).unwrap().status, InstanceStatus::Pending);
    }

    #[tokio::test]
    async fn completed_and_skipped_never_regress() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();

        let completed = seed(
            &store,
            now - Duration::hours(10),
            now - Duration::hours(6),
            InstanceStatus::Completed,
        )
        .await;
        let skipped = seed(
            &store,
            now - Duration::hours(9),
            now - Duration::hours(5),
            InstanceStatus::Skipped,
        )
        .await;

        let manager = LifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(now)),
        );
        manager.update_instance_statuses().await.unwrap();

        assert_eq!(store.get(completed).unwrap().status, InstanceStatus::Completed);
        assert_eq!(store.get(skipped).unwrap().status, InstanceStatus::Skipped);
    }

    #[tokio::test]
    async fn instance_exactly_at_now_becomes_ready() {
        // scheduled_for <= now is inclusive.
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();

        let id = seed(&store, now, now + Duration::hours(4), InstanceStatus::Pending).await;

        let manager = LifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(now)),
        );
        let outcome = manager.update_instance_statuses().await.unwrap();

        assert_eq!(outcome.readied, 1);
        assert_eq!(store.get(id).unwrap().status, InstanceStatus::Ready);
    }

    #[tokio::test]
    async fn in_progress_past_due_becomes_missed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();

        let id = seed(
            &store,
            now - Duration::hours(5),
            now - Duration::minutes(1),
            InstanceStatus::InProgress,
        )
        .await;

        let manager = LifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(now)),
        );
        let outcome = manager.update_instance_statuses().await.unwrap();

        assert_eq!(outcome.missed, 1);
        assert_eq!(store.get(id).unwrap().status, InstanceStatus::Missed);
    }
}
