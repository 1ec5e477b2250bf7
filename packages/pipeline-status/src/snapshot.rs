//! In-memory status view of one pipeline
//!
//! A [`StatusSnapshot`] is built from a single batch fetch of every job in a
//! pipeline and answers the composite-status questions a processing pass asks
//! over and over (per stage, per set of needs, everything before a stage)
//! without going back to storage.
//!
//! # Caching
//!
//! [`StatusSnapshot::status_of_stage`] and
//! [`StatusSnapshot::status_of_processables_prior_to_stage`] remember their
//! answer per stage index for the lifetime of the snapshot. A later
//! [`StatusSnapshot::set_status`] does not invalidate them: query a stage only
//! once every update that affects it has been applied, or build a new
//! snapshot. All other queries always read the current facts.
//!
//! The snapshot is owned by exactly one pass and is not `Sync`.

use crate::composite::CompositeStatus;
use crate::config::StatusPolicy;
use crate::error::Result;
use crate::fact::{FactRow, JobId, JobStatusFact, StageIdx};
use crate::status::RawStatus;
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

pub struct StatusSnapshot {
    facts: Vec<JobStatusFact>,
    policy: StatusPolicy,

    // Lazy indexes into `facts`; positions never move after construction
    by_id: OnceCell<HashMap<JobId, usize>>,
    by_name: OnceCell<HashMap<String, usize>>,
    by_stage: OnceCell<BTreeMap<StageIdx, Vec<usize>>>,

    // Never invalidated
    stage_statuses: RefCell<HashMap<StageIdx, Option<RawStatus>>>,
    prior_stage_statuses: RefCell<HashMap<StageIdx, Option<RawStatus>>>,
}

impl StatusSnapshot {
    /// Snapshot with the default status policy
    pub fn new(facts: Vec<JobStatusFact>) -> Self {
        Self::with_policy(facts, StatusPolicy::default())
    }

    pub fn with_policy(mut facts: Vec<JobStatusFact>, policy: StatusPolicy) -> Self {
        // Stable: jobs of one stage keep their load order
        facts.sort_by_key(|fact| fact.stage_idx);

        Self {
            facts,
            policy,
            by_id: OnceCell::new(),
            by_name: OnceCell::new(),
            by_stage: OnceCell::new(),
            stage_statuses: RefCell::new(HashMap::new()),
            prior_stage_statuses: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_rows<I: IntoIterator<Item = FactRow>>(rows: I) -> Self {
        Self::new(rows.into_iter().map(JobStatusFact::from).collect())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(JobStatusFact::batch_from_json(json)?))
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// All facts, ordered by stage
    pub fn facts(&self) -> &[JobStatusFact] {
        &self.facts
    }

    pub fn fact(&self, id: JobId) -> Option<&JobStatusFact> {
        self.id_index().get(&id).map(|&pos| &self.facts[pos])
    }

    /// Stage indexes present in the pipeline, ascending
    pub fn stage_indexes(&self) -> impl Iterator<Item = StageIdx> + '_ {
        self.stage_index().keys().copied()
    }

    /// Overwrite status and lock version of a job.
    ///
    /// Ids outside the loaded batch are ignored.
    pub fn set_status(&mut self, id: JobId, status: RawStatus, lock_version: u64) {
        let Some(&pos) = self.id_index().get(&id) else {
            return;
        };

        let fact = &mut self.facts[pos];
        fact.status = status;
        fact.lock_version = lock_version;
    }

    pub fn status_of_all(&self) -> Option<RawStatus> {
        self.composite(0..self.facts.len(), false).status()
    }

    pub fn warnings_of_all(&self) -> bool {
        self.composite(0..self.facts.len(), false).has_warnings()
    }

    /// Composite of one stage, remembered for the lifetime of the snapshot
    pub fn status_of_stage(&self, stage_idx: StageIdx) -> Option<RawStatus> {
        if let Some(cached) = self.stage_statuses.borrow().get(&stage_idx) {
            trace!(stage_idx, "stage status cache hit");
            return *cached;
        }

        let status = self
            .composite(self.stage_positions(stage_idx).iter().copied(), false)
            .status();
        self.stage_statuses.borrow_mut().insert(stage_idx, status);
        status
    }

    pub fn warnings_of_stage(&self, stage_idx: StageIdx) -> bool {
        self.composite(self.stage_positions(stage_idx).iter().copied(), false)
            .has_warnings()
    }

    /// Composite of the jobs with the given names. Unknown names are skipped.
    pub fn status_of_processables<I>(&self, names: I, dag: bool) -> Option<RawStatus>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let by_name = self.name_index();
        let positions = names
            .into_iter()
            .filter_map(|name| by_name.get(name.as_ref()).copied());

        self.composite(positions, dag).status()
    }

    /// Composite of every job in a stage before `stage_idx`, remembered per index
    pub fn status_of_processables_prior_to_stage(&self, stage_idx: StageIdx) -> Option<RawStatus> {
        if let Some(cached) = self.prior_stage_statuses.borrow().get(&stage_idx) {
            trace!(stage_idx, "prior stage status cache hit");
            return *cached;
        }

        let positions = self
            .stage_index()
            .range(..stage_idx)
            .flat_map(|(_, positions)| positions.iter().copied());
        let status = self.composite(positions, false).status();
        self.prior_stage_statuses
            .borrow_mut()
            .insert(stage_idx, status);
        status
    }

    /// Jobs of a stage still in `created`
    pub fn created_processable_ids_in_stage(&self, stage_idx: StageIdx) -> Vec<JobId> {
        self.stage_positions(stage_idx)
            .iter()
            .map(|&pos| &self.facts[pos])
            .filter(|fact| fact.status == RawStatus::Created)
            .map(|fact| fact.id)
            .collect()
    }

    /// Jobs the orchestrator has not acted on yet, read from the current state
    pub fn processing_processables(&self) -> impl Iterator<Item = &JobStatusFact> + '_ {
        self.facts.iter().filter(|fact| !fact.processed)
    }

    fn composite<I>(&self, positions: I, dag: bool) -> CompositeStatus
    where
        I: IntoIterator<Item = usize>,
    {
        CompositeStatus::new(
            positions.into_iter().map(|pos| &self.facts[pos]),
            &self.policy,
            dag,
        )
    }

    fn stage_positions(&self, stage_idx: StageIdx) -> &[usize] {
        self.stage_index()
            .get(&stage_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn id_index(&self) -> &HashMap<JobId, usize> {
        self.by_id.get_or_init(|| {
            debug!(jobs = self.facts.len(), "indexing jobs by id");
            self.facts
                .iter()
                .enumerate()
                .map(|(pos, fact)| (fact.id, pos))
                .collect()
        })
    }

    fn name_index(&self) -> &HashMap<String, usize> {
        self.by_name.get_or_init(|| {
            debug!(jobs = self.facts.len(), "indexing jobs by name");
            // Later rows win on duplicate names
            self.facts
                .iter()
                .enumerate()
                .map(|(pos, fact)| (fact.name.clone(), pos))
                .collect()
        })
    }

    fn stage_index(&self) -> &BTreeMap<StageIdx, Vec<usize>> {
        self.by_stage.get_or_init(|| {
            let mut stages: BTreeMap<StageIdx, Vec<usize>> = BTreeMap::new();
            for (pos, fact) in self.facts.iter().enumerate() {
                stages.entry(fact.stage_idx).or_default().push(pos);
            }
            debug!(
                jobs = self.facts.len(),
                stages = stages.len(),
                "grouping jobs by stage"
            );
            stages
        })
    }
}

impl FromIterator<JobStatusFact> for StatusSnapshot {
    fn from_iter<I: IntoIterator<Item = JobStatusFact>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for StatusSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSnapshot")
            .field("jobs", &self.facts.len())
            .field("cached_stages", &self.stage_statuses.borrow().len())
            .field("cached_prior_stages", &self.prior_stage_statuses.borrow().len())
            .finish()
    }
}
