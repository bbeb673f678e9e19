//! Configuration check

use anyhow::{Context, Result};
use std::path::Path;

use nodelet_core::{AgentConfig, RuntimeKind};

pub fn execute(config_path: &Path) -> Result<()> {
    let config = AgentConfig::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let runtime: RuntimeKind = config
        .provider
        .runtime
        .parse()
        .context("Invalid provider runtime")?;

    println!("Configuration: {}", config_path.display());
    println!("{:-<60}", "");
    println!("Runtime:        {runtime}");
    println!("Namespace:      {}", config.namespace);
    println!("Root dir:       {}", config.root_dir.display());
    println!("Stdout dir:     {}", config.stdout_path.display());

    let capacity = &config.capacity;
    println!(
        "Capacity:       cpu={} memory={} pods={} storage={}",
        capacity.cpu.as_deref().unwrap_or("auto"),
        capacity.memory.as_deref().unwrap_or("auto"),
        capacity.pods.as_deref().unwrap_or("auto"),
        capacity.storage.as_deref().unwrap_or("auto"),
    );

    if !runtime.is_local() {
        let k8s = &config.provider.k8s;
        let credentials = k8s
            .kubeconfig_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| "in-cluster".to_string(), |p| p.display().to_string());
        println!("Backend:        namespace={} credentials={credentials}", k8s.namespace);
    } else {
        let cgroup = if runtime == RuntimeKind::Process {
            "create nodelet.apps"
        } else {
            "update k8s.io"
        };
        println!("Cgroup:         {cgroup}");
    }

    println!("{:-<60}", "");
    println!("Configuration OK");
    Ok(())
}
