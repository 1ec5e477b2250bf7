//! Processing pass runner
//!
//! Several workers may process the same pipeline at once. Every persisted
//! status write is conditioned on the job's lock version; when one fails the
//! runner throws the whole snapshot away and starts over from a fresh load
//! instead of trying to merge.

use crate::config::PassConfig;
use crate::error::{Result, StatusError};
use crate::fact::JobId;
use crate::snapshot::StatusSnapshot;
use crate::status::{or_empty_default, RawStatus};
use crate::store::FactStore;
use std::time::Instant;
use tracing::{debug, info, warn};

/// State handed to the pass body for one attempt
pub struct PassContext<'a, S: FactStore + ?Sized> {
    snapshot: StatusSnapshot,
    store: &'a S,
    attempt: u32,
    writes: usize,
}

impl<'a, S: FactStore + ?Sized> PassContext<'a, S> {
    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Persist a new status and mirror it into the snapshot.
    ///
    /// Returns `Ok(false)` for jobs outside the loaded batch. A lock conflict
    /// is returned as an error; propagate it to have the pass restarted.
    pub fn update_status(&mut self, id: JobId, status: RawStatus) -> Result<bool> {
        let Some(fact) = self.snapshot.fact(id) else {
            return Ok(false);
        };

        let lock_version = self.store.write_status(id, status, fact.lock_version)?;
        self.snapshot.set_status(id, status, lock_version);
        self.writes += 1;
        Ok(true)
    }
}

/// Outcome of a pass that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport<T> {
    pub value: T,
    /// 1 when the first attempt went through
    pub attempts: u32,
    /// Writes made by the successful attempt
    pub writes: usize,
    /// Pipeline composite after the pass, empty pipelines read as success
    pub pipeline_status: RawStatus,
    pub duration_ms: u64,
}

pub struct PassRunner<S: FactStore> {
    store: S,
    config: PassConfig,
}

impl<S: FactStore> PassRunner<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, PassConfig::default())
    }

    pub fn with_config(store: S, config: PassConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Run `body` against a fresh snapshot until it completes without a lock
    /// conflict or the attempt budget is spent.
    pub fn run<T, F>(&self, pipeline_id: u64, mut body: F) -> Result<PassReport<T>>
    where
        F: FnMut(&mut PassContext<'_, S>) -> Result<T>,
    {
        self.config.validate()?;
        let start_time = Instant::now();

        for attempt in 1..=self.config.max_attempts {
            let facts = self.store.load_facts(pipeline_id)?;
            debug!(
                pipeline_id,
                attempt,
                jobs = facts.len(),
                "starting processing pass"
            );

            let mut ctx = PassContext {
                snapshot: StatusSnapshot::new(facts),
                store: &self.store,
                attempt,
                writes: 0,
            };

            match body(&mut ctx) {
                Ok(value) => {
                    let pipeline_status = or_empty_default(ctx.snapshot.status_of_all());
                    let duration_ms = start_time.elapsed().as_millis() as u64;

                    info!(
                        pipeline_id,
                        attempts = attempt,
                        writes = ctx.writes,
                        status = %pipeline_status,
                        duration_ms,
                        "processing pass finished"
                    );

                    return Ok(PassReport {
                        value,
                        attempts: attempt,
                        writes: ctx.writes,
                        pipeline_status,
                        duration_ms,
                    });
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        pipeline_id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "lock conflict, restarting pass with fresh snapshot"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(StatusError::RetriesExhausted {
            attempts: self.config.max_attempts,
        })
    }
}
