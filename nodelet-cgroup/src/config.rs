//! Cgroup configuration derived from node capacity

use std::path::Component;
use std::path::Path;

use nodelet_core::{Error, MemorySize, ProcessId, Result};

/// Limits to apply to one control group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupConfig {
    /// Group path relative to the cgroup root, e.g. `nodelet.apps`
    pub group: String,

    /// Process moved into the group on creation; [`ProcessId::UNSET`] for none
    pub pid: ProcessId,

    /// CPU quota in microseconds per period; `None` is unlimited
    pub cpu_quota: Option<i64>,

    /// CPU period in microseconds
    pub cpu_period: Option<i64>,

    /// Memory limit; `None` leaves memory.max untouched
    pub memory_limit: Option<MemorySize>,
}

impl CgroupConfig {
    /// Create a configuration for `group` without any limits
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            pid: ProcessId::UNSET,
            cpu_quota: None,
            cpu_period: None,
            memory_limit: None,
        }
    }

    /// Set CPU quota and period
    #[must_use]
    pub const fn with_cpu(mut self, quota: Option<i64>, period: Option<i64>) -> Self {
        self.cpu_quota = quota;
        self.cpu_period = period;
        self
    }

    /// Set memory limit
    #[must_use]
    pub const fn with_memory_limit(mut self, limit: Option<MemorySize>) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set the process to move into the group
    #[must_use]
    pub const fn with_pid(mut self, pid: ProcessId) -> Self {
        self.pid = pid;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for an empty or escaping group path
    /// and for non-positive CPU values.
    pub fn validate(&self) -> Result<()> {
        if self.group.is_empty() {
            return Err(Error::invalid_config("cgroup group cannot be empty"));
        }

        let relative = Path::new(&self.group)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !relative {
            return Err(Error::invalid_config(format!(
                "cgroup group must be a relative path without '..': {:?}",
                self.group
            )));
        }

        if let Some(quota) = self.cpu_quota
            && quota <= 0
        {
            return Err(Error::invalid_config(format!(
                "cpu quota must be positive, got {quota}"
            )));
        }

        if let Some(period) = self.cpu_period
            && period <= 0
        {
            return Err(Error::invalid_config(format!(
                "cpu period must be positive, got {period}"
            )));
        }

        Ok(())
    }
}
