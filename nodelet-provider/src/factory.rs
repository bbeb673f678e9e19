//! Provider factory
//!
//! The configured runtime kind is resolved once into a [`ProviderFactory`].
//! Local runtimes share one implementation that differs only in capacity
//! reporting and cgroup handling; the delegated runtime owns a client to
//! its backend cluster.

use async_trait::async_trait;
use kube::Client;
use std::sync::Arc;
use tracing::{debug, info};

use nodelet_cgroup::{
    CONTAINER_RUNTIME_GROUP, CgroupBackend, CgroupConfig, CgroupInitializer, CgroupOperation,
    FsCgroupBackend, InitProgress, LOCAL_APPS_GROUP,
};
use nodelet_core::{AgentConfig, Result, RuntimeKind};

use crate::backend_client::{BackendClient, ClientResolver, KubeClientResolver, resolve_backend_client};
use crate::capacity::CapacityManager;
use crate::framework::{EventRecorder, PodsController, ResourceManager};
use crate::node::{
    BaseNodeDependence, GenericNodeDependence, GenericNodeProvider, K8sNodeDependence,
    K8sNodeProvider, NodeProvider,
};
use crate::pod::{CriProvider, CriProviderDependence, K8sProvider, K8sProviderDependence, PodProvider};

/// Builds the node and pod providers for one runtime
#[async_trait]
pub trait Factory: Send + Sync {
    /// Resolve capacity and build the node provider
    ///
    /// Local runtimes also initialize their cgroup; cgroup failures are
    /// logged and never returned.
    async fn build_node_provider(&self) -> Result<Box<dyn NodeProvider>>;

    /// Build the pod provider for `node_name`
    async fn build_pod_provider(
        &self,
        node_name: &str,
        event_recorder: Arc<dyn EventRecorder>,
        resource_manager: Arc<dyn ResourceManager>,
        pods_controller: &PodsController,
    ) -> Result<Box<dyn PodProvider>>;
}

/// Factory for the configured runtime
#[derive(Debug)]
pub enum ProviderFactory {
    /// Process or container runtime on this host
    Local(LocalRuntimeFactory),
    /// Delegated backend cluster
    K8s(K8sRuntimeFactory),
}

impl ProviderFactory {
    /// Select the factory for `config.provider.runtime`
    ///
    /// `kube_client` talks to the agent's own control plane and is required
    /// by the delegated pod provider.
    ///
    /// # Errors
    /// Returns [`nodelet_core::Error::InvalidConfig`] for an unknown runtime
    /// and [`nodelet_core::Error::BackendClient`] when the delegated
    /// runtime's client cannot be built.
    pub async fn new(config: Arc<AgentConfig>, kube_client: Option<Client>) -> Result<Self> {
        Self::with_collaborators(
            config,
            kube_client,
            &KubeClientResolver,
            Arc::new(FsCgroupBackend::default()),
        )
        .await
    }

    /// Like [`ProviderFactory::new`] with explicit client resolution and
    /// cgroup access
    ///
    /// # Errors
    /// See [`ProviderFactory::new`].
    pub async fn with_collaborators(
        config: Arc<AgentConfig>,
        kube_client: Option<Client>,
        client_resolver: &dyn ClientResolver,
        cgroup_backend: Arc<dyn CgroupBackend>,
    ) -> Result<Self> {
        let runtime: RuntimeKind = config.provider.runtime.parse()?;
        info!(%runtime, "Creating provider factory");

        match runtime {
            RuntimeKind::Process | RuntimeKind::Container => Ok(Self::Local(LocalRuntimeFactory {
                config,
                runtime,
                cgroup_backend,
            })),
            RuntimeKind::K8s => {
                let bk_client = resolve_backend_client(&config.provider.k8s, client_resolver).await?;
                Ok(Self::K8s(K8sRuntimeFactory {
                    config,
                    kube_client,
                    bk_client,
                }))
            }
        }
    }

    /// Runtime this factory builds for
    #[must_use]
    pub const fn runtime(&self) -> RuntimeKind {
        match self {
            Self::Local(factory) => factory.runtime,
            Self::K8s(_) => RuntimeKind::K8s,
        }
    }
}

#[async_trait]
impl Factory for ProviderFactory {
    async fn build_node_provider(&self) -> Result<Box<dyn NodeProvider>> {
        match self {
            Self::Local(factory) => factory.build_node_provider().await,
            Self::K8s(factory) => factory.build_node_provider().await,
        }
    }

    async fn build_pod_provider(
        &self,
        node_name: &str,
        event_recorder: Arc<dyn EventRecorder>,
        resource_manager: Arc<dyn ResourceManager>,
        pods_controller: &PodsController,
    ) -> Result<Box<dyn PodProvider>> {
        match self {
            Self::Local(factory) => {
                factory
                    .build_pod_provider(node_name, event_recorder, resource_manager, pods_controller)
                    .await
            }
            Self::K8s(factory) => {
                factory
                    .build_pod_provider(node_name, event_recorder, resource_manager, pods_controller)
                    .await
            }
        }
    }
}

/// Factory for the process and container runtimes
pub struct LocalRuntimeFactory {
    config: Arc<AgentConfig>,
    runtime: RuntimeKind,
    cgroup_backend: Arc<dyn CgroupBackend>,
}

impl LocalRuntimeFactory {
    async fn init_cgroup(&self, capacity: &CapacityManager) {
        let (group, operation) = match self.runtime {
            RuntimeKind::Process => (LOCAL_APPS_GROUP, CgroupOperation::Create),
            RuntimeKind::Container => (CONTAINER_RUNTIME_GROUP, CgroupOperation::Update),
            RuntimeKind::K8s => return,
        };
        let config = CgroupConfig::new(group)
            .with_cpu(capacity.cgroup_cpu_quota(), capacity.cgroup_cpu_period())
            .with_memory_limit(capacity.cgroup_memory_limit());

        // the container runtime creates its group some time after we start
        let blocking = self.runtime == RuntimeKind::Process;

        let initializer = CgroupInitializer::new(Arc::clone(&self.cgroup_backend), config, operation);
        match initializer.start(blocking).await {
            InitProgress::Finished(state) => debug!(group, ?state, "Cgroup initializer finished"),
            InitProgress::Detached(_) => debug!(group, "Cgroup initializer detached"),
        }
    }
}

#[async_trait]
impl Factory for LocalRuntimeFactory {
    async fn build_node_provider(&self) -> Result<Box<dyn NodeProvider>> {
        let config = &self.config;
        let capacity_manager = CapacityManager::new(
            self.runtime,
            &config.capacity,
            &config.reserved_resources,
            &config.root_dir,
            self.runtime.is_local(),
        )?;

        self.init_cgroup(&capacity_manager).await;

        let dep = GenericNodeDependence {
            base: BaseNodeDependence {
                runtime: self.runtime,
                namespace: config.namespace.clone(),
                address: config.node_ip.clone(),
                capacity_manager,
            },
            disk_pressure_path: config.disk_pressure_path.clone(),
        };
        Ok(Box::new(GenericNodeProvider::new(dep)))
    }

    async fn build_pod_provider(
        &self,
        node_name: &str,
        event_recorder: Arc<dyn EventRecorder>,
        resource_manager: Arc<dyn ResourceManager>,
        pods_controller: &PodsController,
    ) -> Result<Box<dyn PodProvider>> {
        let config = &self.config;
        let dep = CriProviderDependence {
            runtime: self.runtime,
            namespace: config.namespace.clone(),
            node_ip: config.node_ip.clone(),
            node_name: node_name.to_string(),
            root_directory: config.root_dir.clone(),
            stdout_directory: config.stdout_path.clone(),
            allow_privileged: config.allow_privileged,
            cri_config: config.provider.cri.clone(),
            registry_config: config.registry.clone(),
            event_recorder,
            resource_manager,
            pod_state_provider: pods_controller.pod_state_provider(),
            pod_sync_handler: pods_controller.pod_sync_handler(),
            status_manager: pods_controller.status_manager(),
        };
        Ok(Box::new(CriProvider::new(dep)?))
    }
}

impl std::fmt::Debug for LocalRuntimeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRuntimeFactory")
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

/// Factory for the delegated runtime
pub struct K8sRuntimeFactory {
    config: Arc<AgentConfig>,
    kube_client: Option<Client>,
    bk_client: BackendClient,
}

impl K8sRuntimeFactory {
    /// Backend cluster client
    #[must_use]
    pub const fn bk_client(&self) -> &BackendClient {
        &self.bk_client
    }
}

#[async_trait]
impl Factory for K8sRuntimeFactory {
    async fn build_node_provider(&self) -> Result<Box<dyn NodeProvider>> {
        let config = &self.config;
        let capacity_manager = CapacityManager::new(
            RuntimeKind::K8s,
            &config.capacity,
            &config.reserved_resources,
            &config.root_dir,
            RuntimeKind::K8s.is_local(),
        )?;

        let dep = K8sNodeDependence {
            base: BaseNodeDependence {
                runtime: RuntimeKind::K8s,
                namespace: config.namespace.clone(),
                address: config.node_ip.clone(),
                capacity_manager,
            },
            bk_namespace: config.provider.k8s.namespace.clone(),
            bk_client: self.bk_client.clone(),
        };
        Ok(Box::new(K8sNodeProvider::new(dep)))
    }

    async fn build_pod_provider(
        &self,
        node_name: &str,
        event_recorder: Arc<dyn EventRecorder>,
        resource_manager: Arc<dyn ResourceManager>,
        pods_controller: &PodsController,
    ) -> Result<Box<dyn PodProvider>> {
        let config = &self.config;
        let dep = K8sProviderDependence {
            node_name: node_name.to_string(),
            namespace: config.namespace.clone(),
            node_ip: config.node_ip.clone(),
            stdout_directory: config.stdout_path.clone(),
            kube_client: self.kube_client.clone(),
            bk_client: self.bk_client.clone(),
            k8s_config: config.provider.k8s.clone(),
            event_recorder,
            resource_manager,
            pod_sync_handler: pods_controller.pod_sync_handler(),
        };
        Ok(Box::new(K8sProvider::new(dep)?))
    }
}

impl std::fmt::Debug for K8sRuntimeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sRuntimeFactory")
            .field("bk_client", &self.bk_client)
            .finish_non_exhaustive()
    }
}
