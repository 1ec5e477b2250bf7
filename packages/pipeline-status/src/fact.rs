use crate::composite::StatusSource;
use crate::error::Result;
use crate::status::RawStatus;
use serde::{Deserialize, Serialize};

/// Job identifier, unique within a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Position of a stage; stages run in ascending order
pub type StageIdx = u32;

/// Row shape handed over by the batch fetch:
/// `(id, name, status, allow_failure, stage_idx, processed, lock_version)`
pub type FactRow = (u64, String, RawStatus, bool, StageIdx, bool, u64);

/// Status facts of one job, as loaded for a processing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusFact {
    pub id: JobId,
    pub name: String,
    pub status: RawStatus,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub stage_idx: StageIdx,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub lock_version: u64,
}

impl JobStatusFact {
    /// Unprocessed job in the given stage with lock version 0
    pub fn new(id: u64, name: impl Into<String>, status: RawStatus, stage_idx: StageIdx) -> Self {
        Self {
            id: JobId(id),
            name: name.into(),
            status,
            allow_failure: false,
            stage_idx,
            processed: false,
            lock_version: 0,
        }
    }

    pub fn allowed_to_fail(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    pub fn processed(mut self) -> Self {
        self.processed = true;
        self
    }

    pub fn with_lock_version(mut self, lock_version: u64) -> Self {
        self.lock_version = lock_version;
        self
    }

    /// Parse a batch encoded as a JSON array of objects
    pub fn batch_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<FactRow> for JobStatusFact {
    fn from(row: FactRow) -> Self {
        let (id, name, status, allow_failure, stage_idx, processed, lock_version) = row;
        Self {
            id: JobId(id),
            name,
            status,
            allow_failure,
            stage_idx,
            processed,
            lock_version,
        }
    }
}

impl StatusSource for JobStatusFact {
    fn status(&self) -> RawStatus {
        self.status
    }

    fn allow_failure(&self) -> bool {
        self.allow_failure
    }
}
