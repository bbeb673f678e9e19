//! Node provider for runtimes on this host

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use nodelet_core::{Error, Result, RuntimeKind};

use super::{GenericNodeDependence, NodeHealth, NodeProvider};

/// Free-space fraction below which the node reports disk pressure
pub const DISK_PRESSURE_THRESHOLD: f64 = 0.1;

/// Node provider for the process and container runtimes
#[derive(Debug)]
pub struct GenericNodeProvider {
    dep: GenericNodeDependence,
}

impl GenericNodeProvider {
    /// Create the provider
    #[must_use]
    pub const fn new(dep: GenericNodeDependence) -> Self {
        Self { dep }
    }

    /// Node address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.dep.base.address
    }

    /// Filesystem watched for disk pressure
    #[must_use]
    pub fn disk_pressure_path(&self) -> &Path {
        &self.dep.disk_pressure_path
    }
}

#[async_trait]
impl NodeProvider for GenericNodeProvider {
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
        let free = free_fraction(&self.dep.disk_pressure_path)?;
        let disk_pressure = free < DISK_PRESSURE_THRESHOLD;
        debug!(
            path = %self.dep.disk_pressure_path.display(),
            free,
            disk_pressure,
            "Checked disk pressure"
        );

        Ok(NodeHealth {
            ready: true,
            disk_pressure,
        })
    }
}

#[allow(clippy::cast_precision_loss, clippy::unnecessary_cast)]
fn free_fraction(path: &Path) -> Result<f64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|errno| Error::Provider {
        message: format!("stat {}: {errno}", path.display()),
    })?;

    let total = stat.blocks() as f64;
    if total == 0.0 {
        return Ok(1.0);
    }
    Ok(stat.blocks_available() as f64 / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::CapacityManager;
    use crate::node::BaseNodeDependence;
    use nodelet_core::config::CapacityConfig;

    fn provider(disk_pressure_path: &Path) -> GenericNodeProvider {
        let capacity = CapacityConfig {
            cpu: Some("4".to_string()),
            memory: Some("8Gi".to_string()),
            pods: None,
            storage: Some("50Gi".to_string()),
        };
        let reserved = CapacityConfig {
            cpu: Some("1".to_string()),
            ..Default::default()
        };
        let capacity_manager =
            CapacityManager::new(RuntimeKind::Process, &capacity, &reserved, disk_pressure_path, true)
                .unwrap();

        GenericNodeProvider::new(GenericNodeDependence {
            base: BaseNodeDependence {
                runtime: RuntimeKind::Process,
                namespace: "alice".to_string(),
                address: "10.0.0.5".to_string(),
                capacity_manager,
            },
            disk_pressure_path: disk_pressure_path.to_path_buf(),
        })
    }

    #[tokio::test]
    async fn reports_capacity_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let node = provider(dir.path());

        assert_eq!(node.address(), "10.0.0.5");
        assert_eq!(node.capacity()["cpu"], Quantity("4".to_string()));
        assert_eq!(node.allocatable()["cpu"], Quantity("3".to_string()));
        assert_eq!(node.allocatable()["pods"], Quantity("500".to_string()));

        let health = node.check_health().await.unwrap();
        assert!(health.ready);
    }

    #[tokio::test]
    async fn missing_disk_pressure_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let node = provider(dir.path());
        drop(dir);

        let err = node.check_health().await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
