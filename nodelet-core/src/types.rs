//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Execution substrate backing the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuntimeKind {
    /// Bare local process supervisor
    Process,
    /// Local container runtime (CRI)
    Container,
    /// Remote, delegated Kubernetes cluster
    K8s,
}

impl RuntimeKind {
    /// Configuration name of the process-local runtime
    pub const PROCESS: &'static str = "runp";
    /// Configuration name of the container-local runtime
    pub const CONTAINER: &'static str = "runc";
    /// Configuration name of the delegated-cluster runtime
    pub const K8S: &'static str = "runk";

    /// Configuration name of this runtime kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Process => Self::PROCESS,
            Self::Container => Self::CONTAINER,
            Self::K8s => Self::K8S,
        }
    }

    /// Whether workloads run on this host (process or container runtime)
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Process | Self::Container)
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            Self::PROCESS => Ok(Self::Process),
            Self::CONTAINER => Ok(Self::Container),
            Self::K8S => Ok(Self::K8s),
            other => Err(Error::invalid_config(format!("unknown runtime: {other}"))),
        }
    }
}

impl TryFrom<String> for RuntimeKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RuntimeKind> for String {
    fn from(kind: RuntimeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Process identifier
///
/// A raw value of `0` means "unset": no process is moved into a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// The unset process id
    pub const UNSET: Self = Self(0);

    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        Self::from(nix::unistd::getpid())
    }

    /// Whether this id refers to a real process
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 > 0
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}
