//! Cgroup initialization state machine
//!
//! Applies the node's CPU and memory limits to a control group that may
//! not exist yet. A group that is missing is tried again every
//! [`RETRY_DELAY`] without bound; any other failure stops the machine with
//! a warning. Nothing here ever fails the caller.
//!
//! ```text
//! Idle -> PermissionCheck -> Skipped
//!                         -> Probing -> Applied
//!                                    -> Probing (path missing, after RETRY_DELAY)
//!                                    -> Aborted
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{CgroupBackend, CgroupOperation};
use crate::config::CgroupConfig;

/// Delay between attempts on a group that does not exist yet
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// State of the cgroup initializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    /// Not started
    Idle,
    /// Checking whether cgroups may be managed at all
    PermissionCheck,
    /// Running the create/update operation; `attempt` starts at 1
    Probing {
        /// Attempt about to be made
        attempt: u32,
    },
    /// No permission to manage cgroups; nothing was done
    Skipped,
    /// Limits are in place
    Applied {
        /// Attempts it took, including the successful one
        attempts: u32,
    },
    /// A non-retryable failure stopped initialization
    Aborted {
        /// Attempts made, including the failing one
        attempts: u32,
        /// Failure description
        reason: String,
    },
}

impl InitState {
    /// Whether the machine has stopped
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Applied { .. } | Self::Aborted { .. }
        )
    }
}

/// Outcome of [`CgroupInitializer::start`]
#[derive(Debug)]
pub enum InitProgress {
    /// Ran to completion on the caller's task
    Finished(InitState),
    /// Running in the background; the handle is for observation only
    Detached(JoinHandle<InitState>),
}

/// Applies limits to one group, retrying while the group is missing
pub struct CgroupInitializer {
    backend: Arc<dyn CgroupBackend>,
    config: CgroupConfig,
    operation: CgroupOperation,
    retry_delay: Duration,
}

impl CgroupInitializer {
    /// Create an initializer running `operation` with `config`
    #[must_use]
    pub fn new(
        backend: Arc<dyn CgroupBackend>,
        config: CgroupConfig,
        operation: CgroupOperation,
    ) -> Self {
        Self {
            backend,
            config,
            operation,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override the delay between attempts
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run the machine.
    ///
    /// The permission check always runs on the caller. With `blocking` the
    /// caller also waits for a terminal state. Otherwise only the probing
    /// loop is spawned as a detached task and this returns immediately;
    /// dropping the returned handle does not stop the task.
    pub async fn start(self, blocking: bool) -> InitProgress {
        let state = self.step(InitState::Idle).await;
        let state = self.step(state).await;

        if blocking || state.is_terminal() {
            return InitProgress::Finished(self.run_from(state).await);
        }

        debug!(group = %self.config.group, "Initializing cgroup in background");
        InitProgress::Detached(tokio::spawn(self.run_from(state)))
    }

    /// Drive the machine from [`InitState::Idle`] to a terminal state
    pub async fn run(self) -> InitState {
        self.run_from(InitState::Idle).await
    }

    async fn run_from(self, mut state: InitState) -> InitState {
        while !state.is_terminal() {
            state = self.step(state).await;
        }
        state
    }

    /// Perform one transition
    ///
    /// After a missing-path failure this sleeps for the retry delay before
    /// returning the next probing state. Terminal states are returned as is.
    pub async fn step(&self, state: InitState) -> InitState {
        match state {
            InitState::Idle => InitState::PermissionCheck,

            InitState::PermissionCheck => {
                if self.backend.has_permission() {
                    InitState::Probing { attempt: 1 }
                } else {
                    info!(group = %self.config.group, "No permission to manage cgroups, skip initializing cgroup");
                    InitState::Skipped
                }
            }

            InitState::Probing { attempt } => {
                match self.backend.apply(self.operation, &self.config).await {
                    Ok(()) => {
                        info!(
                            group = %self.config.group,
                            operation = ?self.operation,
                            attempts = attempt,
                            "Finish initializing cgroup"
                        );
                        InitState::Applied { attempts: attempt }
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(
                            group = %self.config.group,
                            attempt,
                            error = %e,
                            "Cgroup path does not exist yet, retrying"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                        InitState::Probing {
                            attempt: attempt.saturating_add(1),
                        }
                    }
                    Err(e) => {
                        warn!(group = %self.config.group, error = %e, "Init cgroup failed");
                        InitState::Aborted {
                            attempts: attempt,
                            reason: e.to_string(),
                        }
                    }
                }
            }

            terminal => terminal,
        }
    }
}
