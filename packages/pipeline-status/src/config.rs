//! Status policy and pass configuration
//!
//! Which raw statuses an allowed failure turns into a warning, and which it
//! turns into "ignored", is product policy. Defaults come from
//! [`WARNING_ELIGIBLE_STATUSES`] and [`IGNORABLE_STATUSES`]; a YAML file can
//! override them:
//!
//! ```yaml
//! policy:
//!   warning_eligible: [failed, canceled]
//!   ignorable: [skipped, manual]
//!   with_allow_failure: true
//! pass:
//!   max_attempts: 3
//! ```

use crate::error::{Result, StatusError};
use crate::status::{effective_status, EffectiveStatus, RawStatus};
use crate::status::{IGNORABLE_STATUSES, WARNING_ELIGIBLE_STATUSES};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How individual jobs are mapped before aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPolicy {
    pub warning_eligible: Vec<RawStatus>,
    pub ignorable: Vec<RawStatus>,
    /// When false, `allow_failure` is ignored and every job counts with its raw status
    pub with_allow_failure: bool,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            warning_eligible: WARNING_ELIGIBLE_STATUSES.to_vec(),
            ignorable: IGNORABLE_STATUSES.to_vec(),
            with_allow_failure: true,
        }
    }
}

impl StatusPolicy {
    /// Policy that aggregates raw statuses only
    pub fn without_allow_failure() -> Self {
        Self {
            with_allow_failure: false,
            ..Self::default()
        }
    }

    pub fn effective_status(&self, status: RawStatus, allow_failure: bool) -> EffectiveStatus {
        effective_status(
            status,
            self.with_allow_failure && allow_failure,
            &self.warning_eligible,
            &self.ignorable,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(overlap) = self
            .warning_eligible
            .iter()
            .find(|status| self.ignorable.contains(status))
        {
            return Err(StatusError::config(format!(
                "Status '{}' is both warning-eligible and ignorable",
                overlap
            )));
        }
        Ok(())
    }
}

/// Retry bounds for a processing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    /// Passes attempted before a lock conflict becomes fatal
    pub max_attempts: u32,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl PassConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(StatusError::config("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub policy: StatusPolicy,
    pub pass: PassConfig,
}

impl CoreConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: CoreConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.pass.validate()
    }
}
