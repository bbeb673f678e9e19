//! CGroup v2 resource limits for the node agent
//!
//! This crate applies CPU and memory limits to the agent's control groups
//! through a pluggable [`CgroupBackend`], and provides the
//! [`CgroupInitializer`] state machine that tolerates a group which is
//! created by a third party some time after the agent starts.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod initializer;
mod limits;

pub use backend::{CgroupBackend, CgroupOperation, FsCgroupBackend, MockBackend, MockOutcome};
pub use config::CgroupConfig;
pub use controller::CgroupController;
pub use initializer::{CgroupInitializer, InitProgress, InitState, RETRY_DELAY};

/// Mount point of the unified cgroup v2 hierarchy
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Group owned and created by the agent for process-runtime workloads
pub const LOCAL_APPS_GROUP: &str = "nodelet.apps";

/// Group created by the container runtime (containerd's `k8s.io` namespace)
pub const CONTAINER_RUNTIME_GROUP: &str = "k8s.io";
