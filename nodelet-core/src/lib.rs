//! Nodelet Core - Foundation types, configuration, and errors
//!
//! This crate provides the core abstractions shared by the cgroup,
//! provider and CLI crates.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod resources;
pub mod types;

pub use config::AgentConfig;
pub use error::{Error, Result};
pub use resources::{CpuCores, MemorySize};
pub use types::{ProcessId, RuntimeKind};
