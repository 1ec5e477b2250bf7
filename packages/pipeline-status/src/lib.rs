/*
 * Pipeline Status - composite job status for CI pipeline processing
 *
 * Reduces the statuses of a group of jobs (stage, pipeline, DAG needs) to a
 * single status and keeps an indexed in-memory view of one pipeline's jobs
 * for a processing pass.
 *
 * Architecture:
 * - Status enums + allow_failure derivation (status)
 * - Composite status calculator (composite)
 * - Status snapshot with per-stage memoization (snapshot)
 * - Fact store seam + optimistic-locking pass runner (store, pass)
 * - YAML status policy / pass config (config)
 */

// Public modules
pub mod composite;
pub mod config;
pub mod error;
pub mod fact;
pub mod pass;
pub mod snapshot;
pub mod status;
pub mod store;

// Re-exports
pub use composite::{composite_status, CompositeStatus, StatusSource};
pub use config::{CoreConfig, PassConfig, StatusPolicy};
pub use error::{ErrorCategory, Result, StatusError};
pub use fact::{FactRow, JobId, JobStatusFact, StageIdx};
pub use pass::{PassContext, PassReport, PassRunner};
pub use snapshot::StatusSnapshot;
pub use status::{
    effective_status, or_empty_default, EffectiveStatus, RawStatus, StatusSet,
    EMPTY_COMPOSITE_DEFAULT, IGNORABLE_STATUSES, WARNING_ELIGIBLE_STATUSES,
};
pub use store::{FactStore, InMemoryFactStore};
