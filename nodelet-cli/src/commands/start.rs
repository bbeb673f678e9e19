//! Agent startup

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use nodelet_core::AgentConfig;
use nodelet_provider::{
    ClientOverrides, ClientResolver, Factory, KubeClientResolver, LoggingEventRecorder,
    PodStatusStore, PodsController, ProviderFactory, StaticResourceManager,
};

pub async fn execute(config_path: &Path, node_name: Option<String>) -> Result<()> {
    info!("Starting Nodelet");

    let config = AgentConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let node_name = match node_name {
        Some(name) => name,
        None => nix::unistd::gethostname()
            .context("Failed to get host name")?
            .to_string_lossy()
            .into_owned(),
    };
    info!(node = %node_name, runtime = %config.provider.runtime, "Loaded configuration");

    let kube_client = match &config.master.kubeconfig_file {
        Some(path) if !path.as_os_str().is_empty() => Some(
            KubeClientResolver
                .from_kubeconfig(path, &ClientOverrides::default())
                .await
                .context("Failed to create master client")?,
        ),
        _ => None,
    };

    let namespace = config.namespace.clone();
    let factory = ProviderFactory::new(Arc::new(config), kube_client)
        .await
        .context("Failed to create provider factory")?;

    let node = factory
        .build_node_provider()
        .await
        .context("Failed to build node provider")?;
    info!(capacity = ?node.capacity(), allocatable = ?node.allocatable(), "Node provider ready");

    let store = Arc::new(PodStatusStore::default());
    let pods = factory
        .build_pod_provider(
            &node_name,
            Arc::new(LoggingEventRecorder::new("nodelet")),
            Arc::new(StaticResourceManager::new(namespace)),
            &PodsController::in_memory(store),
        )
        .await
        .context("Failed to build pod provider")?;
    drop(factory);

    pods.start().await.context("Failed to start pod provider")?;

    match node.check_health().await {
        Ok(health) => info!(ready = health.ready, disk_pressure = health.disk_pressure, "Node health"),
        Err(e) => warn!(error = %e, "Node health check failed"),
    }

    info!(node = %node_name, "Nodelet started, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;

    info!("Shutting down");
    Ok(())
}
