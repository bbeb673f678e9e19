//! Pod provider for runtimes on this host

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use nodelet_core::{Error, Result, RuntimeKind};

use super::{CriProviderDependence, PodProvider};
use crate::framework::{EventType, PodPhase};

/// Pod provider for the process and container runtimes
pub struct CriProvider {
    dep: CriProviderDependence,
}

impl CriProvider {
    /// Validate `dep` and create the provider
    ///
    /// # Errors
    /// Returns [`Error::Provider`] when the node name or root directory is
    /// empty, or the container runtime lacks an endpoint or a connection
    /// timeout.
    pub fn new(dep: CriProviderDependence) -> Result<Self> {
        if dep.node_name.is_empty() {
            return Err(provider_error("node name is empty"));
        }
        if dep.root_directory.as_os_str().is_empty() {
            return Err(provider_error("root directory is empty"));
        }
        if dep.runtime == RuntimeKind::Container {
            let cri = &dep.cri_config;
            if cri.remote_runtime_endpoint.is_empty() {
                return Err(provider_error("remote runtime endpoint is empty"));
            }
            if cri.remote_image_endpoint.is_empty() {
                return Err(provider_error("remote image endpoint is empty"));
            }
            if cri.connection_timeout().is_zero() {
                return Err(provider_error("cri connection timeout must be positive"));
            }
        }

        Ok(Self { dep })
    }

    /// Agent root directory
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.dep.root_directory
    }

    /// Whether privileged containers may run
    #[must_use]
    pub const fn allow_privileged(&self) -> bool {
        self.dep.allow_privileged
    }
}

#[async_trait]
impl PodProvider for CriProvider {
    fn runtime(&self) -> RuntimeKind {
        self.dep.runtime
    }

    fn node_name(&self) -> &str {
        &self.dep.node_name
    }

    async fn start(&self) -> Result<()> {
        for dir in [&self.dep.root_directory, &self.dep.stdout_directory] {
            if dir.as_os_str().is_empty() {
                continue;
            }
            tokio::fs::create_dir_all(dir).await?;
        }

        info!(
            runtime = %self.dep.runtime,
            node = %self.dep.node_name,
            namespace = %self.dep.resource_manager.namespace(),
            endpoint = %self.dep.cri_config.remote_runtime_endpoint,
            image_endpoint = %self.dep.cri_config.remote_image_endpoint,
            timeout = ?self.dep.cri_config.connection_timeout(),
            registry = %self.dep.registry_config.default.repository,
            "Pod provider started"
        );
        self.dep.event_recorder.event(
            &self.dep.node_name,
            EventType::Normal,
            "Starting",
            &format!("Starting {} pod provider", self.dep.runtime),
        );
        Ok(())
    }

    async fn sync_pod_status(&self, uid: &str, phase: PodPhase) -> Result<()> {
        let previous = self.dep.status_manager.pod_status(uid);
        self.dep.status_manager.set_pod_status(uid, phase);

        if previous != Some(phase) {
            if phase == PodPhase::Failed {
                self.dep
                    .event_recorder
                    .event(uid, EventType::Warning, "Failed", "Pod failed");
            }
            self.dep.pod_sync_handler.handle_pod_sync(uid);
        }
        Ok(())
    }

    fn removable_pods(&self, uids: &[String]) -> Vec<String> {
        uids.iter()
            .filter(|uid| self.dep.pod_state_provider.should_pod_content_be_removed(uid))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for CriProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriProvider")
            .field("runtime", &self.dep.runtime)
            .field("node_name", &self.dep.node_name)
            .finish_non_exhaustive()
    }
}

fn provider_error(message: &str) -> Error {
    Error::Provider {
        message: message.to_string(),
    }
}
