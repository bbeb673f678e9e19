//! Client for the delegated backend cluster
//!
//! A credentials file selects explicit configuration; without one the
//! in-cluster service account is used. The two paths never fall back to
//! each other.

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use nodelet_core::config::K8sProviderConfig;
use nodelet_core::{Error, Result};

/// Overrides applied on top of a credentials file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOverrides {
    /// API server URL replacing the file's server
    pub endpoint: Option<String>,
    /// Connect and read timeout
    pub timeout: Option<Duration>,
}

/// Builds Kubernetes clients from credentials
#[async_trait]
pub trait ClientResolver: Send + Sync {
    /// Client from an explicit credentials file
    async fn from_kubeconfig(&self, path: &Path, overrides: &ClientOverrides) -> Result<Client>;

    /// Client from the ambient in-cluster service account
    async fn in_cluster(&self) -> Result<Client>;
}

/// [`ClientResolver`] backed by `kube`'s configuration loaders
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeClientResolver;

#[async_trait]
impl ClientResolver for KubeClientResolver {
    async fn from_kubeconfig(&self, path: &Path, overrides: &ClientOverrides) -> Result<Client> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| Error::BackendClient {
            message: format!("read kubeconfig {}: {e}", path.display()),
        })?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::BackendClient {
                message: format!("load kubeconfig {}: {e}", path.display()),
            })?;

        if let Some(endpoint) = overrides.endpoint.as_deref().filter(|e| !e.is_empty()) {
            config.cluster_url = endpoint.parse().map_err(|e| Error::BackendClient {
                message: format!("invalid endpoint {endpoint:?}: {e}"),
            })?;
        }

        if let Some(timeout) = overrides.timeout {
            config.connect_timeout = Some(timeout);
            config.read_timeout = Some(timeout);
        }

        Client::try_from(config).map_err(|e| Error::BackendClient {
            message: format!("create client: {e}"),
        })
    }

    async fn in_cluster(&self) -> Result<Client> {
        let config = Config::incluster().map_err(|e| Error::BackendClient {
            message: format!("failed to get in cluster config: {e}"),
        })?;

        Client::try_from(config).map_err(|e| Error::BackendClient {
            message: format!("create client: {e}"),
        })
    }
}

/// Connection to the backend cluster with its request tunables
///
/// `kube` has no client-side rate limiter, so QPS and burst are validated
/// and carried for callers that throttle their own request loops.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    qps: f32,
    burst: u32,
}

impl BackendClient {
    /// Wrap an existing client
    #[must_use]
    pub const fn new(client: Client, qps: f32, burst: u32) -> Self {
        Self { client, qps, burst }
    }

    /// Underlying client
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Sustained requests per second (`0` = client default)
    #[must_use]
    pub const fn qps(&self) -> f32 {
        self.qps
    }

    /// Request burst (`0` = client default)
    #[must_use]
    pub const fn burst(&self) -> u32 {
        self.burst
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("qps", &self.qps)
            .field("burst", &self.burst)
            .finish_non_exhaustive()
    }
}

/// Build the backend client described by `config`
///
/// # Errors
/// Returns [`Error::BackendClient`] for invalid tunables or when the
/// selected credentials path fails.
pub async fn resolve_backend_client(
    config: &K8sProviderConfig,
    resolver: &dyn ClientResolver,
) -> Result<BackendClient> {
    if !config.qps.is_finite() || config.qps < 0.0 {
        return Err(Error::BackendClient {
            message: format!("invalid qps {}", config.qps),
        });
    }

    let client = match config
        .kubeconfig_file
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
    {
        Some(path) => {
            info!(kubeconfig = %path.display(), "Create backend k8s client with kubeconfig file");
            let overrides = ClientOverrides {
                endpoint: config.endpoint.clone(),
                timeout: config.timeout(),
            };
            resolver.from_kubeconfig(path, &overrides).await?
        }
        None => {
            info!("Create backend k8s client with in cluster config");
            resolver.in_cluster().await?
        }
    };

    Ok(BackendClient::new(client, config.qps, config.burst))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r"
apiVersion: v1
kind: Config
clusters:
- name: backend
  cluster:
    server: http://127.0.0.1:6443
    insecure-skip-tls-verify: true
users:
- name: agent
  user:
    token: secret-token
contexts:
- name: backend
  context:
    cluster: backend
    user: agent
    namespace: workloads
current-context: backend
";

    #[tokio::test]
    async fn kubeconfig_with_endpoint_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubeconfig");
        std::fs::write(&path, KUBECONFIG).unwrap();

        let overrides = ClientOverrides {
            endpoint: Some("http://10.0.0.1:8080".to_string()),
            timeout: Some(Duration::from_secs(3)),
        };
        let client = KubeClientResolver
            .from_kubeconfig(&path, &overrides)
            .await
            .unwrap();
        assert_eq!(client.default_namespace(), "workloads");
    }

    #[tokio::test]
    async fn unreadable_kubeconfig_is_backend_error() {
        let err = KubeClientResolver
            .from_kubeconfig(Path::new("/no/such/kubeconfig"), &ClientOverrides::default())
            .await
            .err().unwrap();
        assert!(matches!(err, Error::BackendClient { .. }));
    }

    #[tokio::test]
    async fn invalid_endpoint_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubeconfig");
        std::fs::write(&path, KUBECONFIG).unwrap();

        let overrides = ClientOverrides {
            endpoint: Some("not a url".to_string()),
            timeout: None,
        };
        let err = KubeClientResolver
            .from_kubeconfig(&path, &overrides)
            .await
            .err().unwrap();
        assert!(err.to_string().contains("invalid endpoint"));
    }

    #[tokio::test]
    async fn in_cluster_outside_a_cluster_fails() {
        if std::env::var_os("KUBERNETES_SERVICE_HOST").is_some() {
            return;
        }
        let err = KubeClientResolver.in_cluster().await.err().unwrap();
        assert!(matches!(err, Error::BackendClient { .. }));
    }

    #[tokio::test]
    async fn negative_qps_rejected_before_resolving() {
        struct Unreachable;

        #[async_trait]
        impl ClientResolver for Unreachable {
            async fn from_kubeconfig(&self, _: &Path, _: &ClientOverrides) -> Result<Client> {
                panic!("resolver must not be called")
            }
            async fn in_cluster(&self) -> Result<Client> {
                panic!("resolver must not be called")
            }
        }

        let config = K8sProviderConfig {
            qps: -1.0,
            ..Default::default()
        };
        let err = resolve_backend_client(&config, &Unreachable).await.unwrap_err();
        assert!(err.to_string().contains("qps"));
    }
}
