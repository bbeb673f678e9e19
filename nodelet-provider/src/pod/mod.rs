//! Pod providers
//!
//! A pod provider runs the pods bound to this node. Local runtimes run them
//! through the container runtime interface; the delegated runtime mirrors
//! them into a backend cluster.

mod cri;
mod k8s;

pub use cri::CriProvider;
pub use k8s::K8sProvider;

use async_trait::async_trait;
use kube::Client;
use std::path::PathBuf;
use std::sync::Arc;

use nodelet_core::config::{CriProviderConfig, K8sProviderConfig, RegistryConfig};
use nodelet_core::{Result, RuntimeKind};

use crate::backend_client::BackendClient;
use crate::framework::{
    EventRecorder, PodPhase, PodStateProvider, PodSyncHandler, ResourceManager, StatusManager,
};

/// Runs the pods bound to this node
#[async_trait]
pub trait PodProvider: Send + Sync {
    /// Runtime backing the pods
    fn runtime(&self) -> RuntimeKind;

    /// Node the provider serves
    fn node_name(&self) -> &str;

    /// Prepare the provider to accept pods
    async fn start(&self) -> Result<()>;

    /// Record an observed phase of pod `uid`
    async fn sync_pod_status(&self, uid: &str, phase: PodPhase) -> Result<()>;

    /// Pods among `uids` whose local content may be deleted
    fn removable_pods(&self, uids: &[String]) -> Vec<String>;
}

/// Inputs of [`CriProvider`]
#[derive(Clone)]
pub struct CriProviderDependence {
    /// Process or container runtime
    pub runtime: RuntimeKind,
    /// Agent namespace
    pub namespace: String,
    /// Node IP
    pub node_ip: String,
    /// Node name
    pub node_name: String,
    /// Agent root directory
    pub root_directory: PathBuf,
    /// Directory for container stdout logs
    pub stdout_directory: PathBuf,
    /// Whether privileged containers may run
    pub allow_privileged: bool,
    /// CRI endpoints
    pub cri_config: CriProviderConfig,
    /// Image registry credentials
    pub registry_config: RegistryConfig,
    /// Event sink
    pub event_recorder: Arc<dyn EventRecorder>,
    /// Config map and secret access
    pub resource_manager: Arc<dyn ResourceManager>,
    /// Pod state queries
    pub pod_state_provider: Arc<dyn PodStateProvider>,
    /// Resync sink
    pub pod_sync_handler: Arc<dyn PodSyncHandler>,
    /// Status table
    pub status_manager: Arc<dyn StatusManager>,
}

/// Inputs of [`K8sProvider`]
#[derive(Clone)]
pub struct K8sProviderDependence {
    /// Node name
    pub node_name: String,
    /// Agent namespace
    pub namespace: String,
    /// Node IP
    pub node_ip: String,
    /// Directory for container stdout logs
    pub stdout_directory: PathBuf,
    /// Client for the agent's own control plane
    pub kube_client: Option<Client>,
    /// Client for the backend cluster
    pub bk_client: BackendClient,
    /// Backend settings
    pub k8s_config: K8sProviderConfig,
    /// Event sink
    pub event_recorder: Arc<dyn EventRecorder>,
    /// Config map and secret access
    pub resource_manager: Arc<dyn ResourceManager>,
    /// Resync sink
    pub pod_sync_handler: Arc<dyn PodSyncHandler>,
}
