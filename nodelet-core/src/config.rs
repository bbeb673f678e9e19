//! Agent configuration snapshot
//!
//! Loaded once at startup from a YAML file and never mutated afterwards.
//! Every field has a default so a minimal file only needs the keys it
//! wants to override.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Top-level agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Agent root directory (workloads, images, capacity probing)
    pub root_dir: PathBuf,

    /// Namespace the node belongs to
    pub namespace: String,

    /// Address advertised for this node
    #[serde(rename = "nodeIP")]
    pub node_ip: String,

    /// Directory for container stdout logs
    pub stdout_path: PathBuf,

    /// Whether privileged workloads are allowed
    pub allow_privileged: bool,

    /// Path whose free space drives the disk-pressure condition
    pub disk_pressure_path: PathBuf,

    /// Node capacity. Empty fields are detected on local runtimes.
    pub capacity: CapacityConfig,

    /// Resources withheld from workloads
    pub reserved_resources: CapacityConfig,

    /// Runtime provider selection and settings
    pub provider: ProviderConfig,

    /// Image registry settings
    pub registry: RegistryConfig,

    /// Connection to the orchestrating (master) cluster
    pub master: MasterConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/home/nodelet"),
            namespace: String::new(),
            node_ip: String::new(),
            stdout_path: PathBuf::from("/home/nodelet/var/stdout"),
            allow_privileged: false,
            disk_pressure_path: PathBuf::from("/home/nodelet/var"),
            capacity: CapacityConfig::default(),
            reserved_resources: CapacityConfig::default(),
            provider: ProviderConfig::default(),
            registry: RegistryConfig::default(),
            master: MasterConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("read config file {}: {e}", path.display()))
        })?;

        let config = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), runtime = %config.provider.runtime, "Loaded agent config");
        Ok(config)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the text is not valid configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::invalid_config(format!("parse config: {e}")))
    }
}

/// Resource amounts as Kubernetes quantity strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapacityConfig {
    /// CPU, e.g. `"4"` or `"500m"`
    pub cpu: Option<String>,
    /// Memory, e.g. `"8Gi"`
    pub memory: Option<String>,
    /// Maximum number of pods
    pub pods: Option<String>,
    /// Ephemeral storage, e.g. `"100Gi"`
    pub storage: Option<String>,
}

/// Runtime provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Runtime kind name (`runp`, `runc` or `runk`)
    ///
    /// Kept as text and empty when unset; the provider factory resolves it
    /// and rejects unknown or missing names.
    pub runtime: String,

    /// Container runtime interface settings
    pub cri: CriProviderConfig,

    /// Delegated cluster settings
    pub k8s: K8sProviderConfig,
}

/// CRI socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CriProviderConfig {
    /// Runtime service endpoint
    pub remote_runtime_endpoint: String,
    /// Image service endpoint
    pub remote_image_endpoint: String,
    /// Connection timeout in seconds
    pub connection_timeout_seconds: u64,
}

impl Default for CriProviderConfig {
    fn default() -> Self {
        Self {
            remote_runtime_endpoint: "unix:///run/containerd/containerd.sock".to_string(),
            remote_image_endpoint: "unix:///run/containerd/containerd.sock".to_string(),
            connection_timeout_seconds: 300,
        }
    }
}

impl CriProviderConfig {
    /// Connection timeout as a [`Duration`]
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

/// Delegated cluster connection parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct K8sProviderConfig {
    /// Namespace in the delegated cluster that receives pods
    pub namespace: String,

    /// Credentials file; when absent, in-cluster credentials are used
    pub kubeconfig_file: Option<PathBuf>,

    /// API server endpoint overriding the credentials file's server
    pub endpoint: Option<String>,

    /// Sustained requests per second; `0` keeps the client default
    pub qps: f32,

    /// Request burst; `0` keeps the client default
    pub burst: u32,

    /// Request timeout in seconds; `0` keeps the client default
    pub timeout_seconds: u64,
}

impl K8sProviderConfig {
    /// Request timeout, if configured
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_seconds))
        }
    }
}

/// Image registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Registry used for unqualified image names
    pub default: ImageRegistry,
}

/// A single image registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRegistry {
    /// Repository prefix
    pub repository: String,
    /// Registry user
    pub username: String,
    /// Registry password
    pub password: String,
}

/// Master (orchestrator) cluster connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasterConfig {
    /// Credentials file for the master cluster
    pub kubeconfig_file: Option<PathBuf>,
}
