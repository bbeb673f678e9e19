//! Error types for Nodelet

use std::path::PathBuf;

use thiserror::Error;

/// Nodelet error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `CGroup` operation failed
    #[error("CGroup error: {message}")]
    CGroup {
        /// Error message
        message: String,
    },

    /// A filesystem path the operation depends on does not exist (yet)
    #[error("Path does not exist: {}", path.display())]
    NotFound {
        /// Missing path
        path: PathBuf,
    },

    /// Permission denied
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Node capacity could not be resolved
    #[error("Capacity error: {message}")]
    Capacity {
        /// Error message
        message: String,
    },

    /// Client to the delegated cluster could not be built
    #[error("Backend client error: {message}")]
    BackendClient {
        /// Error message
        message: String,
    },

    /// Node or pod provider construction failed
    #[error("Provider error: {message}")]
    Provider {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Shorthand for [`Error::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the failure means "the target path does not exist yet".
    ///
    /// This is the only failure class the cgroup initializer retries.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::System(errno) => *errno == nix::errno::Errno::ENOENT,
            _ => false,
        }
    }
}

/// Result type alias for Nodelet operations
pub type Result<T> = std::result::Result<T, Error>;
