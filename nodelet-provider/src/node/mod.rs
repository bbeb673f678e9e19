//! Node providers
//!
//! A node provider reports the node's capacity and health to the control
//! plane. Local runtimes check the host; the delegated runtime checks its
//! backend cluster.

mod generic;
mod k8s;

pub use generic::{DISK_PRESSURE_THRESHOLD, GenericNodeProvider};
pub use k8s::K8sNodeProvider;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use std::path::PathBuf;

use nodelet_core::{Result, RuntimeKind};

use crate::backend_client::BackendClient;
use crate::capacity::CapacityManager;

/// Health conditions reported with the node status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHealth {
    /// The runtime can accept pods
    pub ready: bool,
    /// Free space is below the pressure threshold
    pub disk_pressure: bool,
}

/// Reports node capacity and conditions
#[async_trait]
pub trait NodeProvider: Send + Sync {
    /// Runtime backing this node
    fn runtime(&self) -> RuntimeKind;

    /// Total capacity as a resource list
    fn capacity(&self) -> BTreeMap<String, Quantity>;

    /// Allocatable resources as a resource list
    fn allocatable(&self) -> BTreeMap<String, Quantity>;

    /// Check current conditions
    async fn check_health(&self) -> Result<NodeHealth>;
}

/// Inputs common to every node provider
#[derive(Debug)]
pub struct BaseNodeDependence {
    /// Runtime kind
    pub runtime: RuntimeKind,
    /// Agent namespace
    pub namespace: String,
    /// Node address
    pub address: String,
    /// Resolved capacity
    pub capacity_manager: CapacityManager,
}

/// Inputs of [`GenericNodeProvider`]
#[derive(Debug)]
pub struct GenericNodeDependence {
    /// Common inputs
    pub base: BaseNodeDependence,
    /// Filesystem watched for disk pressure
    pub disk_pressure_path: PathBuf,
}

/// Inputs of [`K8sNodeProvider`]
#[derive(Debug)]
pub struct K8sNodeDependence {
    /// Common inputs
    pub base: BaseNodeDependence,
    /// Namespace in the backend cluster
    pub bk_namespace: String,
    /// Backend cluster client
    pub bk_client: BackendClient,
}
