//! Cadence Engine - Recurring Task Scheduling & Instance Lifecycle
//!
//! This crate turns declarative recurrence definitions ("every weekday at
//! 9am in America/New_York, complete within 4 hours") into concrete,
//! timestamped task instances, and advances those instances through a
//! status lifecycle purely as a function of wall-clock time. It is a
//! library-level engine: no long-lived process, no wire protocol — an
//! external periodic job invokes it, and repeated or concurrent
//! invocations never duplicate work.
//!
//! # Architecture
//!
//! The engine is organized into several key modules:
//!
//! - [`schedule`]: Cadence definitions (pattern, time of day, timezone)
//!   with construction-time validation
//! - [`recurrence`]: Pure expansion of a pattern over a local-date window
//! - [`timezone`]: DST-aware IANA timezone resolution to UTC instants
//! - [`generator`]: Idempotent materialization of missing instances over
//!   a lookahead window
//! - [`lifecycle`]: Time-driven status sweeps (`pending -> ready`,
//!   overdue -> `missed`)
//! - [`store`]: Instance model and the persistence port, plus an
//!   in-memory backend
//! - [`clock`]: Injectable time source for deterministic tests
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadence_engine::{
//!     CadencePattern, CadenceSchedule, InMemoryStore, InstanceGenerator,
//!     LifecycleManager, SystemClock, TimeOfDay,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let clock = Arc::new(SystemClock);
//!
//!     let cadence = CadenceSchedule::new(
//!         CadencePattern::Daily,
//!         TimeOfDay::new(9, 0)?,
//!         "America/New_York",
//!         Default::default(),
//!         4,
//!     )?;
//!
//!     let generator = InstanceGenerator::new(store.clone(), clock.clone());
//!     let created = generator.generate_instances_for_cadence(&cadence).await?;
//!     println!("created {} instances", created.len());
//!
//!     let lifecycle = LifecycleManager::new(store, clock);
//!     let outcome = lifecycle.update_instance_statuses().await?;
//!     println!("readied {}, missed {}", outcome.readied, outcome.missed);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod logging;
pub mod recurrence;
pub mod schedule;
pub mod store;
pub mod timezone;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EngineError, StoreError};
pub use generator::{
    GenerationReport, GeneratorConfig, InstanceGenerator, DEFAULT_LOOKAHEAD_HOURS,
};
pub use lifecycle::{LifecycleManager, SweepOutcome};
pub use schedule::{CadencePattern, CadenceSchedule, ScheduleKind, TimeOfDay};
pub use store::{
    InMemoryStore, Instance, InstanceStatus, InstanceStore, NewInstance, StatusFilter,
};
