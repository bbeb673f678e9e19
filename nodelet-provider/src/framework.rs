//! Collaborators owned by the agent and lent to pod providers

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Severity of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Expected lifecycle step
    Normal,
    /// Something an operator should look at
    Warning,
}

/// Sink for object lifecycle events
pub trait EventRecorder: Send + Sync {
    /// Record `reason`/`message` against `object`
    fn event(&self, object: &str, event_type: EventType, reason: &str, message: &str);
}

/// [`EventRecorder`] that writes events to the log
#[derive(Debug, Clone)]
pub struct LoggingEventRecorder {
    component: String,
}

impl LoggingEventRecorder {
    /// Recorder tagging events with `component`
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl EventRecorder for LoggingEventRecorder {
    fn event(&self, object: &str, event_type: EventType, reason: &str, message: &str) {
        match event_type {
            EventType::Normal => {
                info!(component = %self.component, object, reason, "{message}");
            }
            EventType::Warning => {
                warn!(component = %self.component, object, reason, "{message}");
            }
        }
    }
}

/// Read access to config maps and secrets in the agent's namespace
pub trait ResourceManager: Send + Sync {
    /// Namespace the resources live in
    fn namespace(&self) -> &str;

    /// Data of config map `name`
    fn config_map(&self, name: &str) -> Option<BTreeMap<String, String>>;

    /// Data of secret `name`
    fn secret(&self, name: &str) -> Option<BTreeMap<String, String>>;
}

/// [`ResourceManager`] over a fixed set of resources
#[derive(Debug, Clone, Default)]
pub struct StaticResourceManager {
    namespace: String,
    config_maps: HashMap<String, BTreeMap<String, String>>,
    secrets: HashMap<String, BTreeMap<String, String>>,
}

impl StaticResourceManager {
    /// Empty manager for `namespace`
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Add a config map
    #[must_use]
    pub fn with_config_map(mut self, name: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        self.config_maps.insert(name.into(), data);
        self
    }

    /// Add a secret
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        self.secrets.insert(name.into(), data);
        self
    }
}

impl ResourceManager for StaticResourceManager {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn config_map(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.config_maps.get(name).cloned()
    }

    fn secret(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.secrets.get(name).cloned()
    }
}

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted, not running yet
    Pending,
    /// At least one container running
    Running,
    /// All containers exited successfully
    Succeeded,
    /// At least one container failed
    Failed,
    /// State could not be obtained
    Unknown,
}

impl PodPhase {
    /// Whether the pod will not run again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Answers questions about pod state
pub trait PodStateProvider: Send + Sync {
    /// Whether the pod has terminated
    fn is_pod_terminated(&self, uid: &str) -> bool;

    /// Whether the pod's on-disk content may be removed
    fn should_pod_content_be_removed(&self, uid: &str) -> bool;
}

/// Receives pod resync requests
pub trait PodSyncHandler: Send + Sync {
    /// Schedule another sync of the pod
    fn handle_pod_sync(&self, uid: &str);
}

/// Holds the latest known status of each pod
pub trait StatusManager: Send + Sync {
    /// Record the pod's phase
    fn set_pod_status(&self, uid: &str, phase: PodPhase);

    /// Last recorded phase
    fn pod_status(&self, uid: &str) -> Option<PodPhase>;
}

/// In-memory pod status table implementing the lifecycle traits
#[derive(Debug, Default)]
pub struct PodStatusStore {
    phases: RwLock<HashMap<String, PodPhase>>,
    sync_requests: AtomicUsize,
}

impl PodStatusStore {
    /// Number of resync requests received
    #[must_use]
    pub fn sync_requests(&self) -> usize {
        self.sync_requests.load(Ordering::SeqCst)
    }
}

impl PodStateProvider for PodStatusStore {
    fn is_pod_terminated(&self, uid: &str) -> bool {
        self.pod_status(uid).is_some_and(PodPhase::is_terminal)
    }

    fn should_pod_content_be_removed(&self, uid: &str) -> bool {
        // pods nobody knows about are orphans
        self.pod_status(uid).is_none_or(PodPhase::is_terminal)
    }
}

impl PodSyncHandler for PodStatusStore {
    fn handle_pod_sync(&self, uid: &str) {
        self.sync_requests.fetch_add(1, Ordering::SeqCst);
        debug!(uid, "Pod sync requested");
    }
}

impl StatusManager for PodStatusStore {
    fn set_pod_status(&self, uid: &str, phase: PodPhase) {
        if let Ok(mut phases) = self.phases.write() {
            phases.insert(uid.to_string(), phase);
        }
    }

    fn pod_status(&self, uid: &str) -> Option<PodPhase> {
        self.phases.read().ok()?.get(uid).copied()
    }
}

/// Bundle of pod lifecycle collaborators
#[derive(Clone)]
pub struct PodsController {
    state_provider: Arc<dyn PodStateProvider>,
    sync_handler: Arc<dyn PodSyncHandler>,
    status_manager: Arc<dyn StatusManager>,
}

impl PodsController {
    /// Controller from explicit collaborators
    #[must_use]
    pub fn new(
        state_provider: Arc<dyn PodStateProvider>,
        sync_handler: Arc<dyn PodSyncHandler>,
        status_manager: Arc<dyn StatusManager>,
    ) -> Self {
        Self {
            state_provider,
            sync_handler,
            status_manager,
        }
    }

    /// Controller whose collaborators all share one [`PodStatusStore`]
    #[must_use]
    pub fn in_memory(store: Arc<PodStatusStore>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }

    /// Pod state queries
    #[must_use]
    pub fn pod_state_provider(&self) -> Arc<dyn PodStateProvider> {
        Arc::clone(&self.state_provider)
    }

    /// Resync sink
    #[must_use]
    pub fn pod_sync_handler(&self) -> Arc<dyn PodSyncHandler> {
        Arc::clone(&self.sync_handler)
    }

    /// Status table
    #[must_use]
    pub fn status_manager(&self) -> Arc<dyn StatusManager> {
        Arc::clone(&self.status_manager)
    }
}

impl std::fmt::Debug for PodsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodsController").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_tracks_phases() {
        let store = Arc::new(PodStatusStore::default());
        let controller = PodsController::in_memory(store.clone());

        controller.status_manager().set_pod_status("a", PodPhase::Running);
        controller.status_manager().set_pod_status("b", PodPhase::Failed);

        let state = controller.pod_state_provider();
        assert!(!state.is_pod_terminated("a"));
        assert!(state.is_pod_terminated("b"));
        assert!(!state.should_pod_content_be_removed("a"));
        assert!(state.should_pod_content_be_removed("b"));
        assert!(state.should_pod_content_be_removed("unknown"));

        controller.pod_sync_handler().handle_pod_sync("a");
        assert_eq!(store.sync_requests(), 1);
    }

    #[test]
    fn static_resources() {
        let data = BTreeMap::from([("key".to_string(), "value".to_string())]);
        let manager = StaticResourceManager::new("agents").with_config_map("settings", data.clone());

        assert_eq!(manager.namespace(), "agents");
        assert_eq!(manager.config_map("settings"), Some(data));
        assert_eq!(manager.secret("settings"), None);
    }
}
