use crate::error::{Result, StatusError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Status persisted for a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawStatus {
    Created,
    Preparing,
    Pending,
    Running,
    Manual,
    Scheduled,
    WaitingForResource,
    Success,
    Failed,
    Canceled,
    Skipped,
}

impl RawStatus {
    pub const ALL: [RawStatus; 11] = [
        RawStatus::Created,
        RawStatus::Preparing,
        RawStatus::Pending,
        RawStatus::Running,
        RawStatus::Manual,
        RawStatus::Scheduled,
        RawStatus::WaitingForResource,
        RawStatus::Success,
        RawStatus::Failed,
        RawStatus::Canceled,
        RawStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RawStatus::Created => "created",
            RawStatus::Preparing => "preparing",
            RawStatus::Pending => "pending",
            RawStatus::Running => "running",
            RawStatus::Manual => "manual",
            RawStatus::Scheduled => "scheduled",
            RawStatus::WaitingForResource => "waiting_for_resource",
            RawStatus::Success => "success",
            RawStatus::Failed => "failed",
            RawStatus::Canceled => "canceled",
            RawStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for RawStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self> {
        RawStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::parse(format!("Invalid job status: {}", s)))
    }
}

impl std::fmt::Display for RawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status a job contributes to an aggregate after `allow_failure` is applied.
///
/// Never leaves the calculator: composite results are always [`RawStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveStatus {
    Created,
    Preparing,
    Pending,
    Running,
    Manual,
    Scheduled,
    WaitingForResource,
    Success,
    Failed,
    Canceled,
    Skipped,
    /// Allowed to fail and did
    SuccessWithWarnings,
    /// Allowed to fail and never ran to completion
    Ignored,
}

impl EffectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self.as_raw() {
            Some(raw) => raw.as_str(),
            None if *self == EffectiveStatus::Ignored => "ignored",
            None => "success_with_warnings",
        }
    }

    /// The raw status this value was taken from unchanged, if any
    pub fn as_raw(&self) -> Option<RawStatus> {
        Some(match self {
            EffectiveStatus::Created => RawStatus::Created,
            EffectiveStatus::Preparing => RawStatus::Preparing,
            EffectiveStatus::Pending => RawStatus::Pending,
            EffectiveStatus::Running => RawStatus::Running,
            EffectiveStatus::Manual => RawStatus::Manual,
            EffectiveStatus::Scheduled => RawStatus::Scheduled,
            EffectiveStatus::WaitingForResource => RawStatus::WaitingForResource,
            EffectiveStatus::Success => RawStatus::Success,
            EffectiveStatus::Failed => RawStatus::Failed,
            EffectiveStatus::Canceled => RawStatus::Canceled,
            EffectiveStatus::Skipped => RawStatus::Skipped,
            EffectiveStatus::SuccessWithWarnings | EffectiveStatus::Ignored => return None,
        })
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl From<RawStatus> for EffectiveStatus {
    fn from(status: RawStatus) -> Self {
        match status {
            RawStatus::Created => EffectiveStatus::Created,
            RawStatus::Preparing => EffectiveStatus::Preparing,
            RawStatus::Pending => EffectiveStatus::Pending,
            RawStatus::Running => EffectiveStatus::Running,
            RawStatus::Manual => EffectiveStatus::Manual,
            RawStatus::Scheduled => EffectiveStatus::Scheduled,
            RawStatus::WaitingForResource => EffectiveStatus::WaitingForResource,
            RawStatus::Success => EffectiveStatus::Success,
            RawStatus::Failed => EffectiveStatus::Failed,
            RawStatus::Canceled => EffectiveStatus::Canceled,
            RawStatus::Skipped => EffectiveStatus::Skipped,
        }
    }
}

impl std::fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statuses meaning the job ran and did not succeed.
/// Allowed failures with these statuses count as `success_with_warnings`.
pub const WARNING_ELIGIBLE_STATUSES: &[RawStatus] = &[RawStatus::Failed, RawStatus::Canceled];

/// Statuses meaning the job never reached completion by design.
/// Allowed failures with these statuses are `ignored`.
pub const IGNORABLE_STATUSES: &[RawStatus] = &[RawStatus::Skipped, RawStatus::Manual];

/// Status the caller reports for a group with no jobs at all
pub const EMPTY_COMPOSITE_DEFAULT: RawStatus = RawStatus::Success;

/// Apply the caller-side default to a composite that had nothing to aggregate
pub fn or_empty_default(composite: Option<RawStatus>) -> RawStatus {
    composite.unwrap_or(EMPTY_COMPOSITE_DEFAULT)
}

/// Map one job onto the status it contributes to an aggregate
pub fn effective_status(
    status: RawStatus,
    allow_failure: bool,
    warning_eligible: &[RawStatus],
    ignorable: &[RawStatus],
) -> EffectiveStatus {
    if allow_failure && warning_eligible.contains(&status) {
        EffectiveStatus::SuccessWithWarnings
    } else if allow_failure && ignorable.contains(&status) {
        EffectiveStatus::Ignored
    } else {
        status.into()
    }
}

/// Set of distinct effective statuses, one bit per variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusSet(u16);

impl StatusSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(statuses: &[EffectiveStatus]) -> Self {
        statuses.iter().copied().collect()
    }

    pub fn insert(&mut self, status: EffectiveStatus) {
        self.0 |= status.bit();
    }

    pub fn contains(&self, status: EffectiveStatus) -> bool {
        self.0 & status.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Non-empty and every member is one of `allowed`
    pub fn only_of(&self, allowed: &[EffectiveStatus]) -> bool {
        let mask = Self::of(allowed).0;
        self.0 != 0 && self.0 & !mask == 0
    }

    pub fn any_of(&self, candidates: &[EffectiveStatus]) -> bool {
        self.0 & Self::of(candidates).0 != 0
    }
}

impl FromIterator<EffectiveStatus> for StatusSet {
    fn from_iter<I: IntoIterator<Item = EffectiveStatus>>(iter: I) -> Self {
        let mut set = StatusSet::empty();
        for status in iter {
            set.insert(status);
        }
        set
    }
}
