//! Node provider for the delegated runtime

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use tracing::warn;

use nodelet_core::{Result, RuntimeKind};

use super::{K8sNodeDependence, NodeHealth, NodeProvider};
use crate::backend_client::BackendClient;

/// Node provider backed by a remote cluster
#[derive(Debug)]
pub struct K8sNodeProvider {
    dep: K8sNodeDependence,
}

impl K8sNodeProvider {
    /// Create the provider
    #[must_use]
    pub const fn new(dep: K8sNodeDependence) -> Self {
        Self { dep }
    }

    /// Namespace in the backend cluster
    #[must_use]
    pub fn bk_namespace(&self) -> &str {
        &self.dep.bk_namespace
    }

    /// Backend cluster client
    #[must_use]
    pub const fn bk_client(&self) -> &BackendClient {
        &self.dep.bk_client
    }
}

#[async_trait]
impl NodeProvider for K8sNodeProvider {
    fn runtime(&self) -> RuntimeKind {
        self.dep.base.runtime
    }

    fn capacity(&self) -> BTreeMap<String, Quantity> {
        self.dep.base.capacity_manager.capacity().to_quantities()
    }

    fn allocatable(&self) -> BTreeMap<String, Quantity> {
        self.dep.base.capacity_manager.allocatable().to_quantities()
    }

    async fn check_health(&self) -> Result<NodeHealth> {
        let ready = match self.dep.bk_client.client().apiserver_version().await {
            Ok(_) => true,
            Err(e) => {
                warn!(namespace = %self.dep.bk_namespace, error = %e, "Backend cluster is unreachable");
                false
            }
        };

        Ok(NodeHealth {
            ready,
            disk_pressure: false,
        })
    }
}
