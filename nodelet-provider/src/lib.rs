//! Nodelet Provider - runtime-specific node and pod providers
//!
//! The agent resolves its configured runtime into a [`ProviderFactory`]
//! once at startup and uses it to build one [`NodeProvider`] and one
//! [`PodProvider`].
//!
//! | Runtime | Node provider | Pod provider | Cgroup |
//! |---------|---------------|--------------|--------|
//! | `runp` | [`GenericNodeProvider`] | [`CriProvider`] | create `nodelet.apps`, blocking |
//! | `runc` | [`GenericNodeProvider`] | [`CriProvider`] | update `k8s.io`, background |
//! | `runk` | [`K8sNodeProvider`] | [`K8sProvider`] | none |

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend_client;
pub mod capacity;
pub mod factory;
pub mod framework;
pub mod node;
pub mod pod;

pub use backend_client::{
    BackendClient, ClientOverrides, ClientResolver, KubeClientResolver, resolve_backend_client,
};
pub use capacity::{CapacityManager, ResourceAmounts};
pub use factory::{Factory, K8sRuntimeFactory, LocalRuntimeFactory, ProviderFactory};
pub use framework::{
    EventRecorder, EventType, LoggingEventRecorder, PodPhase, PodStateProvider, PodStatusStore,
    PodSyncHandler, PodsController, ResourceManager, StaticResourceManager, StatusManager,
};
pub use node::{GenericNodeProvider, K8sNodeProvider, NodeHealth, NodeProvider};
pub use pod::{CriProvider, K8sProvider, PodProvider};
