//! Composite status calculation
//!
//! Reduces the statuses of a group of jobs (a stage, a pipeline, or the needs
//! of a DAG job) to one status. The reduction is order dependent:
//! some rules only hold when the group consists of exactly the listed
//! statuses, others fire as soon as one status is present. Rules are tried
//! top to bottom and the first match wins.

use crate::config::StatusPolicy;
use crate::status::{EffectiveStatus, RawStatus, StatusSet};
use EffectiveStatus as E;

/// Anything that contributes one job to an aggregate
pub trait StatusSource {
    fn status(&self) -> RawStatus;
    fn allow_failure(&self) -> bool;
}

impl StatusSource for (RawStatus, bool) {
    fn status(&self) -> RawStatus {
        self.0
    }

    fn allow_failure(&self) -> bool {
        self.1
    }
}

impl<T: StatusSource + ?Sized> StatusSource for &T {
    fn status(&self) -> RawStatus {
        (**self).status()
    }

    fn allow_failure(&self) -> bool {
        (**self).allow_failure()
    }
}

/// Aggregate view of a group of jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeStatus {
    statuses: StatusSet,
    dag: bool,
}

impl CompositeStatus {
    pub fn new<I>(jobs: I, policy: &StatusPolicy, dag: bool) -> Self
    where
        I: IntoIterator,
        I::Item: StatusSource,
    {
        let statuses = jobs
            .into_iter()
            .map(|job| policy.effective_status(job.status(), job.allow_failure()))
            .collect();

        Self { statuses, dag }
    }

    /// Composite over an already derived status set
    pub fn from_effective(statuses: StatusSet, dag: bool) -> Self {
        Self { statuses, dag }
    }

    /// `None` when there was nothing to aggregate
    pub fn status(&self) -> Option<RawStatus> {
        reduce(self.statuses, self.dag)
    }

    pub fn has_warnings(&self) -> bool {
        self.statuses.contains(E::SuccessWithWarnings)
    }

    pub fn effective_statuses(&self) -> StatusSet {
        self.statuses
    }

    pub fn is_dag(&self) -> bool {
        self.dag
    }
}

/// Composite status with the default policy
pub fn composite_status<I>(jobs: I, dag: bool) -> Option<RawStatus>
where
    I: IntoIterator,
    I::Item: StatusSource,
{
    CompositeStatus::new(jobs, &StatusPolicy::default(), dag).status()
}

fn reduce(set: StatusSet, dag: bool) -> Option<RawStatus> {
    if set.is_empty() {
        return None;
    }

    let status = if dag && set.any_of(&[E::Skipped, E::Ignored]) {
        // One of the needs did not run at all
        RawStatus::Skipped
    } else if dag
        && !set.only_of(&[
            E::Success,
            E::Failed,
            E::Canceled,
            E::Skipped,
            E::SuccessWithWarnings,
        ])
    {
        // Blocked until every need is complete
        RawStatus::Pending
    } else if set.only_of(&[E::Skipped, E::Ignored]) {
        RawStatus::Skipped
    } else if set.only_of(&[E::Success, E::Skipped, E::SuccessWithWarnings, E::Ignored]) {
        RawStatus::Success
    } else if set.only_of(&[E::Created, E::SuccessWithWarnings, E::Ignored]) {
        RawStatus::Created
    } else if set.only_of(&[E::Preparing, E::SuccessWithWarnings, E::Ignored]) {
        RawStatus::Preparing
    } else if set.only_of(&[
        E::Canceled,
        E::Success,
        E::Skipped,
        E::SuccessWithWarnings,
        E::Ignored,
    ]) {
        RawStatus::Canceled
    } else if set.only_of(&[
        E::Pending,
        E::Created,
        E::Skipped,
        E::SuccessWithWarnings,
        E::Ignored,
    ]) {
        RawStatus::Pending
    } else if set.any_of(&[E::Running, E::Pending]) {
        RawStatus::Running
    } else if set.contains(E::WaitingForResource) {
        RawStatus::WaitingForResource
    } else if set.contains(E::Manual) {
        RawStatus::Manual
    } else if set.contains(E::Scheduled) {
        RawStatus::Scheduled
    } else if set.contains(E::Preparing) {
        RawStatus::Preparing
    } else if set.contains(E::Created) {
        RawStatus::Running
    } else {
        RawStatus::Failed
    };

    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RawStatus::*;

    fn strict(statuses: &[RawStatus]) -> Option<RawStatus> {
        composite_status(statuses.iter().map(|s| (*s, false)), false)
    }

    fn dag(statuses: &[RawStatus]) -> Option<RawStatus> {
        composite_status(statuses.iter().map(|s| (*s, false)), true)
    }

    fn effective(statuses: &[EffectiveStatus], dag: bool) -> Option<RawStatus> {
        CompositeStatus::from_effective(StatusSet::of(statuses), dag).status()
    }

    #[test]
    fn test_empty_has_no_result() {
        assert_eq!(strict(&[]), None);
        assert_eq!(dag(&[]), None);
    }

    #[test]
    fn test_basic_statuses() {
        assert_eq!(strict(&[Success]), Some(Success));
        assert_eq!(strict(&[Failed]), Some(Failed));
        assert_eq!(strict(&[Success, Failed]), Some(Failed));
        assert_eq!(strict(&[Success, Success, Success]), Some(Success));
    }

    #[test]
    fn test_allowed_failure_reads_as_success_with_warnings() {
        let composite = CompositeStatus::new([(Failed, true)], &StatusPolicy::default(), false);
        assert_eq!(composite.status(), Some(Success));
        assert!(composite.has_warnings());

        let composite = CompositeStatus::new([(Failed, false)], &StatusPolicy::default(), false);
        assert_eq!(composite.status(), Some(Failed));
        assert!(!composite.has_warnings());
    }

    #[test]
    fn test_allowed_manual_and_skipped_collapse_to_skipped() {
        let jobs = [(Skipped, true), (Manual, true)];
        assert_eq!(composite_status(jobs, false), Some(Skipped));
    }

    #[test]
    fn test_dag_rules_take_precedence() {
        // rule 2: running is not terminal
        assert_eq!(dag(&[Running]), Some(Pending));
        // rule 1 before rule 3
        assert_eq!(dag(&[Skipped]), Some(Skipped));
        // rule 1 before rule 2
        assert_eq!(dag(&[Skipped, Running]), Some(Skipped));
        // rule 2 before rule 5
        assert_eq!(dag(&[Created]), Some(Pending));
        // terminal needs fall through to the shared rules
        assert_eq!(dag(&[Success, Failed]), Some(Failed));
        assert_eq!(dag(&[Success, Canceled]), Some(Canceled));
        assert_eq!(dag(&[Success]), Some(Success));
    }

    #[test]
    fn test_dag_ignored_need_skips() {
        let jobs = [(Success, false), (Manual, true)];
        assert_eq!(composite_status(jobs, true), Some(Skipped));
        assert_eq!(composite_status(jobs, false), Some(Success));
    }

    #[test]
    fn test_dag_allowed_failure_counts_as_complete() {
        let jobs = [(Success, false), (Failed, true)];
        assert_eq!(composite_status(jobs, true), Some(Success));
    }

    #[test]
    fn test_subset_rule_boundaries() {
        // rule 3 before rule 4
        assert_eq!(effective(&[E::Ignored], false), Some(Skipped));
        // rule 4 before rule 5/6 when only warnings/ignored
        assert_eq!(effective(&[E::SuccessWithWarnings], false), Some(Success));
        assert_eq!(
            effective(&[E::SuccessWithWarnings, E::Ignored], false),
            Some(Success)
        );
        // rule 5
        assert_eq!(strict(&[Created]), Some(Created));
        assert_eq!(effective(&[E::Created, E::Ignored], false), Some(Created));
        // rule 6
        assert_eq!(strict(&[Preparing]), Some(Preparing));
        // rule 7
        assert_eq!(strict(&[Canceled, Success, Skipped]), Some(Canceled));
        // rule 8 (created + skipped does not match rule 5)
        assert_eq!(strict(&[Created, Skipped]), Some(Pending));
        assert_eq!(strict(&[Pending, Created]), Some(Pending));
        assert_eq!(strict(&[Pending]), Some(Pending));
    }

    #[test]
    fn test_any_of_rule_boundaries() {
        // rule 9: running beats everything below it
        assert_eq!(strict(&[Running, Manual, Failed]), Some(Running));
        assert_eq!(strict(&[Pending, Success]), Some(Running));
        // rule 10 before rule 11
        assert_eq!(strict(&[WaitingForResource, Manual]), Some(WaitingForResource));
        // rule 11 before rule 12
        assert_eq!(strict(&[Manual, Scheduled]), Some(Manual));
        assert_eq!(strict(&[Manual, Success]), Some(Manual));
        // rule 12 before rule 13
        assert_eq!(strict(&[Scheduled, Preparing]), Some(Scheduled));
        // rule 13 before rule 14
        assert_eq!(strict(&[Preparing, Created]), Some(Preparing));
        // rule 14: created next to finished work is still running
        assert_eq!(strict(&[Created, Success]), Some(Running));
        assert_eq!(strict(&[Created, Failed]), Some(Running));
        // rule 15
        assert_eq!(strict(&[Failed, Canceled]), Some(Failed));
        assert_eq!(strict(&[Failed, Skipped]), Some(Failed));
    }

    #[test]
    fn test_without_allow_failure_policy() {
        let policy = StatusPolicy::without_allow_failure();
        let composite = CompositeStatus::new([(Failed, true), (Success, false)], &policy, false);
        assert_eq!(composite.status(), Some(Failed));
        assert!(!composite.has_warnings());
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = strict(&[Manual, Success, Created]);
        let b = strict(&[Created, Manual, Success]);
        assert_eq!(a, b);
        assert_eq!(a, Some(Manual));
    }
}
