//! Cgroup backend trait for pluggable implementations

use async_trait::async_trait;
use nix::unistd::{AccessFlags, access};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use nodelet_core::{Error, Result};

use crate::config::CgroupConfig;
use crate::controller::CgroupController;

/// How limits reach the group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupOperation {
    /// The agent owns the group and creates it
    Create,
    /// Someone else creates the group; the agent only updates limits
    Update,
}

/// Trait for cgroup backends
///
/// This allows for different implementations:
/// - [`FsCgroupBackend`] - Production cgroup v2 filesystem
/// - [`MockBackend`] - Testing without filesystem
///
/// # Thread Safety
/// All implementations must be `Send + Sync` so they can be moved into a
/// background task.
#[async_trait]
pub trait CgroupBackend: Send + Sync {
    /// Whether the current principal may manage control groups at all
    fn has_permission(&self) -> bool;

    /// Create the configured group and apply its limits
    async fn create(&self, config: &CgroupConfig) -> Result<()>;

    /// Apply limits to an existing group
    async fn update(&self, config: &CgroupConfig) -> Result<()>;

    /// Run `operation` against the backend
    async fn apply(&self, operation: CgroupOperation, config: &CgroupConfig) -> Result<()> {
        match operation {
            CgroupOperation::Create => self.create(config).await,
            CgroupOperation::Update => self.update(config).await,
        }
    }
}

/// Backend writing to a cgroup v2 hierarchy
#[derive(Debug, Clone)]
pub struct FsCgroupBackend {
    root: PathBuf,
}

impl FsCgroupBackend {
    /// Backend rooted at `root` (normally [`crate::CGROUP_ROOT`])
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Hierarchy root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for FsCgroupBackend {
    fn default() -> Self {
        Self::new(crate::CGROUP_ROOT)
    }
}

#[async_trait]
impl CgroupBackend for FsCgroupBackend {
    fn has_permission(&self) -> bool {
        if !self.root.join("cgroup.controllers").exists() {
            debug!(root = %self.root.display(), "cgroup v2 is not mounted");
            return false;
        }

        match access(&self.root, AccessFlags::W_OK) {
            Ok(()) => true,
            Err(errno) => {
                debug!(root = %self.root.display(), %errno, "cgroup root is not writable");
                false
            }
        }
    }

    async fn create(&self, config: &CgroupConfig) -> Result<()> {
        CgroupController::new(&self.root, config.clone())?
            .create()
            .await
    }

    async fn update(&self, config: &CgroupConfig) -> Result<()> {
        CgroupController::new(&self.root, config.clone())?
            .update()
            .await
    }
}

/// Scripted result of one mock operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Operation succeeds
    Succeed,
    /// Group path does not exist yet
    NotFound,
    /// Any other failure
    Fail(String),
}

impl MockOutcome {
    fn into_result(self, config: &CgroupConfig) -> Result<()> {
        match self {
            Self::Succeed => Ok(()),
            Self::NotFound => Err(Error::NotFound {
                path: PathBuf::from(crate::CGROUP_ROOT).join(&config.group),
            }),
            Self::Fail(message) => Err(Error::CGroup { message }),
        }
    }
}

/// Mock backend for testing (doesn't touch filesystem)
///
/// Outcomes are consumed in order; once the script is exhausted every
/// further call gets the fallback outcome (success unless changed).
///
/// # Example
/// ```
/// use nodelet_cgroup::{CgroupBackend, CgroupConfig, MockBackend, MockOutcome};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let backend = MockBackend::new().with_script([MockOutcome::NotFound]);
/// let config = CgroupConfig::new("k8s.io");
///
/// assert!(backend.update(&config).await.unwrap_err().is_not_found());
/// assert!(backend.update(&config).await.is_ok());
/// assert_eq!(backend.call_count().await, 2);
/// # });
/// ```
#[derive(Clone)]
pub struct MockBackend {
    permitted: bool,
    permission_checks: Arc<AtomicUsize>,
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    script: VecDeque<MockOutcome>,
    fallback: MockOutcome,
    calls: Vec<(CgroupOperation, CgroupConfig)>,
}

impl MockBackend {
    /// Create a permitted mock backend where every call succeeds
    #[must_use]
    pub fn new() -> Self {
        Self {
            permitted: true,
            permission_checks: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(MockState {
                script: VecDeque::new(),
                fallback: MockOutcome::Succeed,
                calls: Vec::new(),
            })),
        }
    }

    /// Deny permission to manage cgroups
    #[must_use]
    pub const fn without_permission(mut self) -> Self {
        self.permitted = false;
        self
    }

    /// Queue outcomes for the next calls
    ///
    /// Clones share the script, so outcomes queued here are also seen by
    /// backends cloned earlier.
    #[must_use]
    pub fn with_script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.lock_state().script.extend(outcomes);
        self
    }

    /// Outcome used once the script is exhausted
    #[must_use]
    pub fn with_fallback(self, outcome: MockOutcome) -> Self {
        self.lock_state().fallback = outcome;
        self
    }

    /// Get the number of create/update calls made (for testing)
    #[allow(clippy::unused_async)]
    pub async fn call_count(&self) -> usize {
        self.lock_state().calls.len()
    }

    /// Get the recorded calls (for testing)
    #[allow(clippy::unused_async)]
    pub async fn calls(&self) -> Vec<(CgroupOperation, CgroupConfig)> {
        self.lock_state().calls.clone()
    }

    /// Get the number of permission checks (for testing)
    #[must_use]
    pub fn permission_checks(&self) -> usize {
        self.permission_checks.load(Ordering::SeqCst)
    }

    // never held across an await
    fn lock_state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, operation: CgroupOperation, config: &CgroupConfig) -> Result<()> {
        let mut state = self.lock_state();
        state.calls.push((operation, config.clone()));

        let outcome = state
            .script
            .pop_front()
            .unwrap_or_else(|| state.fallback.clone());

        tracing::debug!(
            ?operation,
            group = %config.group,
            call = state.calls.len(),
            ?outcome,
            "Mock: cgroup operation"
        );

        outcome.into_result(config)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("permitted", &self.permitted)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CgroupBackend for MockBackend {
    fn has_permission(&self) -> bool {
        self.permission_checks.fetch_add(1, Ordering::SeqCst);
        self.permitted
    }

    async fn create(&self, config: &CgroupConfig) -> Result<()> {
        self.record(CgroupOperation::Create, config)
    }

    async fn update(&self, config: &CgroupConfig) -> Result<()> {
        self.record(CgroupOperation::Update, config)
    }
}
