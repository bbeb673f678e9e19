//! Pod provider mirroring pods into a backend cluster

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use tracing::info;

use nodelet_core::{Error, Result, RuntimeKind};

use super::{K8sProviderDependence, PodProvider};
use crate::backend_client::BackendClient;
use crate::framework::{EventType, PodPhase};

/// Pod provider for the delegated runtime
pub struct K8sProvider {
    dep: K8sProviderDependence,
    kube_client: Client,
}

impl K8sProvider {
    /// Validate `dep` and create the provider
    ///
    /// # Errors
    /// Returns [`Error::Provider`] when the backend namespace is empty or
    /// no control plane client was supplied.
    pub fn new(dep: K8sProviderDependence) -> Result<Self> {
        if dep.k8s_config.namespace.is_empty() {
            return Err(Error::Provider {
                message: "backend namespace is empty".to_string(),
            });
        }
        let kube_client = dep.kube_client.clone().ok_or_else(|| Error::Provider {
            message: "control plane client is required".to_string(),
        })?;

        Ok(Self { dep, kube_client })
    }

    /// Namespace in the backend cluster
    #[must_use]
    pub fn bk_namespace(&self) -> &str {
        &self.dep.k8s_config.namespace
    }

    /// Backend cluster client
    #[must_use]
    pub const fn bk_client(&self) -> &BackendClient {
        &self.dep.bk_client
    }

    /// Control plane client
    #[must_use]
    pub const fn kube_client(&self) -> &Client {
        &self.kube_client
    }
}

#[async_trait]
impl PodProvider for K8sProvider {
    fn runtime(&self) -> RuntimeKind {
        RuntimeKind::K8s
    }

    fn node_name(&self) -> &str {
        &self.dep.node_name
    }

    async fn start(&self) -> Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.dep.bk_client.client().clone());
        namespaces
            .get(self.bk_namespace())
            .await
            .map_err(|e| Error::BackendClient {
                message: format!("get backend namespace {:?}: {e}", self.bk_namespace()),
            })?;

        info!(
            node = %self.dep.node_name,
            bk_namespace = %self.bk_namespace(),
            "Pod provider started"
        );
        self.dep.event_recorder.event(
            &self.dep.node_name,
            EventType::Normal,
            "Starting",
            "Starting k8s pod provider",
        );
        Ok(())
    }

    async fn sync_pod_status(&self, uid: &str, phase: PodPhase) -> Result<()> {
        if phase == PodPhase::Unknown {
            self.dep.event_recorder.event(
                uid,
                EventType::Warning,
                "Unknown",
                "Backend pod state is unknown",
            );
        }
        self.dep.pod_sync_handler.handle_pod_sync(uid);
        Ok(())
    }

    fn removable_pods(&self, _uids: &[String]) -> Vec<String> {
        // content lives in the backend cluster
        Vec::new()
    }
}

impl std::fmt::Debug for K8sProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sProvider")
            .field("node_name", &self.dep.node_name)
            .field("bk_namespace", &self.dep.k8s_config.namespace)
            .finish_non_exhaustive()
    }
}
