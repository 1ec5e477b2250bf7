use crate::error::{Result, StatusError};
use crate::fact::{JobId, JobStatusFact};
use crate::status::RawStatus;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Durable side of a processing pass.
///
/// Loads every job of a pipeline in one round trip and persists status
/// changes guarded by the job's lock version.
pub trait FactStore {
    fn load_facts(&self, pipeline_id: u64) -> Result<Vec<JobStatusFact>>;

    /// Persist `status` if the stored lock version still equals
    /// `expected_lock_version`. Returns the new lock version, or
    /// [`StatusError::LockConflict`] when another writer got there first.
    fn write_status(&self, id: JobId, status: RawStatus, expected_lock_version: u64) -> Result<u64>;
}

impl<S: FactStore + ?Sized> FactStore for std::sync::Arc<S> {
    fn load_facts(&self, pipeline_id: u64) -> Result<Vec<JobStatusFact>> {
        (**self).load_facts(pipeline_id)
    }

    fn write_status(&self, id: JobId, status: RawStatus, expected_lock_version: u64) -> Result<u64> {
        (**self).write_status(id, status, expected_lock_version)
    }
}

/// Fact store held in memory (tests, local tooling)
#[derive(Default)]
pub struct InMemoryFactStore {
    pipelines: Mutex<HashMap<u64, Vec<JobStatusFact>>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all jobs of a pipeline
    pub fn insert_pipeline(&self, pipeline_id: u64, facts: Vec<JobStatusFact>) {
        self.pipelines.lock().insert(pipeline_id, facts);
    }

    pub fn job(&self, id: JobId) -> Option<JobStatusFact> {
        self.pipelines
            .lock()
            .values()
            .flat_map(|facts| facts.iter())
            .find(|fact| fact.id == id)
            .cloned()
    }

    /// Bump a job's lock version as a concurrent writer would
    pub fn bump_lock_version(&self, id: JobId) -> Result<u64> {
        let mut pipelines = self.pipelines.lock();
        let fact = find_mut(&mut pipelines, id)?;
        fact.lock_version += 1;
        Ok(fact.lock_version)
    }

    /// Mark a job as acted on
    pub fn mark_processed(&self, id: JobId) -> Result<()> {
        let mut pipelines = self.pipelines.lock();
        find_mut(&mut pipelines, id)?.processed = true;
        Ok(())
    }
}

fn find_mut(pipelines: &mut HashMap<u64, Vec<JobStatusFact>>, id: JobId) -> Result<&mut JobStatusFact> {
    pipelines
        .values_mut()
        .flat_map(|facts| facts.iter_mut())
        .find(|fact| fact.id == id)
        .ok_or(StatusError::JobNotFound(id))
}

impl FactStore for InMemoryFactStore {
    fn load_facts(&self, pipeline_id: u64) -> Result<Vec<JobStatusFact>> {
        self.pipelines
            .lock()
            .get(&pipeline_id)
            .cloned()
            .ok_or(StatusError::PipelineNotFound(pipeline_id))
    }

    fn write_status(&self, id: JobId, status: RawStatus, expected_lock_version: u64) -> Result<u64> {
        let mut pipelines = self.pipelines.lock();
        let fact = find_mut(&mut pipelines, id)?;

        if fact.lock_version != expected_lock_version {
            return Err(StatusError::LockConflict {
                id,
                expected: expected_lock_version,
                actual: fact.lock_version,
            });
        }

        fact.status = status;
        fact.lock_version += 1;
        Ok(fact.lock_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryFactStore {
        let store = InMemoryFactStore::new();
        store.insert_pipeline(
            1,
            vec![
                JobStatusFact::new(10, "build", RawStatus::Created, 0),
                JobStatusFact::new(11, "test", RawStatus::Created, 1).with_lock_version(5),
            ],
        );
        store
    }

    #[test]
    fn test_load_facts() {
        let store = store();
        assert_eq!(store.load_facts(1).unwrap().len(), 2);
        assert!(matches!(
            store.load_facts(2),
            Err(StatusError::PipelineNotFound(2))
        ));
    }

    #[test]
    fn test_write_status_increments_lock_version() {
        let store = store();
        let version = store
            .write_status(JobId(11), RawStatus::Pending, 5)
            .unwrap();

        assert_eq!(version, 6);
        let job = store.job(JobId(11)).unwrap();
        assert_eq!(job.status, RawStatus::Pending);
        assert_eq!(job.lock_version, 6);
    }

    #[test]
    fn test_write_status_stale_version_conflicts() {
        let store = store();
        store.bump_lock_version(JobId(10)).unwrap();

        let err = store
            .write_status(JobId(10), RawStatus::Pending, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            StatusError::LockConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
        assert_eq!(store.job(JobId(10)).unwrap().status, RawStatus::Created);
    }

    #[test]
    fn test_write_unknown_job() {
        let store = store();
        assert!(matches!(
            store.write_status(JobId(99), RawStatus::Pending, 0),
            Err(StatusError::JobNotFound(JobId(99)))
        ));
    }

    #[test]
    fn test_mark_processed() {
        let store = store();
        store.mark_processed(JobId(10)).unwrap();
        assert!(store.job(JobId(10)).unwrap().processed);
    }
}
