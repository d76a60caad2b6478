//! Idempotent instance generation.
//!
//! Orchestrates recurrence expansion and timezone resolution over a
//! lookahead window, consults the store for existing instances, and
//! creates only the missing ones. Safe to invoke repeatedly and
//! concurrently: the store's uniqueness constraint decides the winner of
//! any create race, and a violation is treated as "already exists".

use std::sync::Arc;

use chrono::{Duration, NaiveTime};
use serde_json::json;

use crate::clock::Clock;
use crate::error::{EngineError, StoreError};
use crate::logging::OpTimer;
use crate::recurrence;
use crate::schedule::{CadenceSchedule, ScheduleKind};
use crate::store::{Instance, InstanceStatus, InstanceStore, NewInstance};
use crate::timezone;

/// Default lookahead window: 14 days.
pub const DEFAULT_LOOKAHEAD_HOURS: u32 = 336;

/// Tuning knobs for generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Forward window, in hours, within which occurrences are
    /// materialized.
    pub lookahead_hours: u32,
    /// Half-width of the dedup window around a computed `scheduled_for`.
    /// Widen this when the job runner and the store disagree on time.
    pub dedup_tolerance: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            lookahead_hours: DEFAULT_LOOKAHEAD_HOURS,
            dedup_tolerance: Duration::minutes(1),
        }
    }
}

/// Outcome of a batch generation pass over many cadences.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Instances actually created, across all cadences.
    pub created: Vec<Instance>,
    /// Number of cadences whose generation failed and was skipped.
    pub failed_cadences: u64,
}

/// Materializes cadence occurrences as instances.
pub struct InstanceGenerator {
    store: Arc<dyn InstanceStore>,
    clock: Arc<dyn Clock>,
    config: GeneratorConfig,
}

impl std::fmt::Debug for InstanceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InstanceGenerator {
    /// Create a generator with the default configuration.
    pub fn new(store: Arc<dyn InstanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, GeneratorConfig::default())
    }

    /// Create a generator with explicit tuning.
    pub fn with_config(
        store: Arc<dyn InstanceStore>,
        clock: Arc<dyn Clock>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Generate missing instances for one cadence over the configured
    /// lookahead window.
    ///
    /// Returns only the instances actually created; occurrences that
    /// already have an instance (within the dedup tolerance) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTimezone`] or
    /// [`EngineError::InvalidSchedule`] for a broken definition, or
    /// [`EngineError::Store`] if the store fails with anything other
    /// than a uniqueness violation. Errors are scoped to this cadence.
    pub async fn generate_instances_for_cadence(
        &self,
        cadence: &CadenceSchedule,
    ) -> Result<Vec<Instance>, EngineError> {
        self.generate_with_lookahead(cadence, self.config.lookahead_hours)
            .await
    }

    /// Like [`Self::generate_instances_for_cadence`] with an explicit
    /// lookahead, for callers that widen or narrow the window per run.
    pub async fn generate_with_lookahead(
        &self,
        cadence: &CadenceSchedule,
        lookahead_hours: u32,
    ) -> Result<Vec<Instance>, EngineError> {
        if cadence.kind != ScheduleKind::Recurring || !cadence.is_active {
            tracing::debug!(
                cadence_id = %cadence.id,
                kind = %cadence.kind,
                is_active = cadence.is_active,
                "Skipping non-recurring or inactive cadence"
            );
            return Ok(Vec::new());
        }
        cadence.validate()?;

        let timer = OpTimer::new("generator", "generate");
        let result = self.generate_inner(cadence, lookahead_hours).await;
        match &result {
            Ok(created) => {
                tracing::info!(
                    cadence_id = %cadence.id,
                    pattern = %cadence.pattern,
                    lookahead_hours,
                    created = created.len(),
                    "Instance generation completed"
                );
                timer.finish();
            }
            Err(e) => timer.finish_with_error(e),
        }
        result
    }

    async fn generate_inner(
        &self,
        cadence: &CadenceSchedule,
        lookahead_hours: u32,
    ) -> Result<Vec<Instance>, EngineError> {
        let tz = timezone::parse_timezone(&cadence.timezone)?;

        // Window in wall-clock terms: local midnight today through
        // midnight + lookahead, closed on both ends.
        let now = self.clock.now();
        let window_start = now.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
        let window_end = window_start + Duration::hours(i64::from(lookahead_hours));

        let dates = recurrence::expand(
            cadence.pattern,
            &cadence.days_of_week,
            window_start.date(),
            window_end.date(),
        )?;

        let mut created = Vec::new();
        for date in dates {
            let Some(occurrence_local) = date.and_hms_opt(
                u32::from(cadence.time_of_day.hour),
                u32::from(cadence.time_of_day.minute),
                0,
            ) else {
                continue;
            };
            if occurrence_local < window_start || occurrence_local > window_end {
                continue;
            }

            let scheduled_for = timezone::resolve_in(date, cadence.time_of_day, tz)?;

            let existing = self
                .store
                .find_instance(cadence.id, scheduled_for, self.config.dedup_tolerance)
                .await?;
            if let Some(existing) = existing {
                tracing::debug!(
                    cadence_id = %cadence.id,
                    scheduled_for = %scheduled_for,
                    existing_id = %existing.id,
                    "Occurrence already materialized, skipping"
                );
                continue;
            }

            let data = NewInstance {
                cadence_id: cadence.id,
                scheduled_for,
                due_at: scheduled_for + Duration::hours(i64::from(cadence.completion_window_hours)),
                status: InstanceStatus::Pending,
                assigned_to: cadence.assigned_to.clone(),
                metadata: json!({
                    "generated_at": now.to_rfc3339(),
                    "source_timezone": cadence.timezone,
                }),
            };

            match self.store.create_instance(data).await {
                Ok(instance) => created.push(instance),
                // A concurrent invocation created this slot between our
                // check and our create. That is the constraint doing its
                // job, not a failure.
                Err(StoreError::UniqueViolation { .. }) => {
                    tracing::debug!(
                        cadence_id = %cadence.id,
                        scheduled_for = %scheduled_for,
                        "Lost create race to a concurrent invocation, skipping"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(created)
    }

    /// Run generation for many cadences, isolating failures per cadence.
    ///
    /// A broken cadence (invalid timezone, contradictory definition,
    /// store failure) is logged and counted; the remaining cadences are
    /// still processed.
    pub async fn generate_for_cadences(&self, cadences: &[CadenceSchedule]) -> GenerationReport {
        let mut report = GenerationReport::default();
        for cadence in cadences {
            match self.generate_instances_for_cadence(cadence).await {
                Ok(mut created) => report.created.append(&mut created),
                Err(e) => {
                    report.failed_cadences += 1;
                    tracing::warn!(
                        cadence_id = %cadence.id,
                        error = %e,
                        "Cadence generation failed, continuing with remaining cadences"
                    );
                }
            }
        }
        report
    }
}
