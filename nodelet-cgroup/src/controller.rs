//! CGroup controller implementation

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use nodelet_core::{Error, ProcessId, Result};

use crate::config::CgroupConfig;

/// Controllers the agent needs delegated to its groups
const REQUIRED_CONTROLLERS: [&str; 2] = ["cpu", "memory"];

/// Controller for one group in the cgroup v2 hierarchy
///
/// `create` is used for groups the agent owns, `update` for groups that
/// another component (the container runtime) creates.
#[derive(Debug)]
pub struct CgroupController {
    /// Limits and group name
    pub(crate) config: CgroupConfig,

    /// Full path to this group directory
    /// example: /sys/fs/cgroup/nodelet.apps
    pub(crate) path: PathBuf,
}

impl CgroupController {
    /// Create a controller for `config.group` under `root`
    ///
    /// Nothing is touched on the filesystem yet.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid
    pub fn new(root: impl AsRef<Path>, config: CgroupConfig) -> Result<Self> {
        config.validate()?;
        let path = root.as_ref().join(&config.group);
        Ok(Self { config, path })
    }

    /// Group directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration applied by this controller
    #[must_use]
    pub const fn config(&self) -> &CgroupConfig {
        &self.config
    }

    /// Create the group, apply limits and attach the configured process
    ///
    /// The parent directory must already exist; if it does not,
    /// [`Error::NotFound`] is returned. An existing group is reused.
    pub async fn create(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::invalid_config("Invalid cgroup path"))?;

        if !parent.is_dir() {
            return Err(Error::NotFound {
                path: parent.to_path_buf(),
            });
        }

        self.enable_controllers(parent).await?;

        match fs::create_dir(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Created cgroup directory"),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "Cgroup directory already exists");
            }
            Err(e) => return Err(io_error(&self.path, "create cgroup directory", e)),
        }

        self.apply_limits().await?;

        if self.config.pid.is_set() {
            self.add_process(self.config.pid).await?;
        }

        debug!(path = %self.path.display(), "CGroup created successfully");
        Ok(())
    }

    /// Apply limits to a group that already exists
    ///
    /// Returns [`Error::NotFound`] while the group has not been created.
    pub async fn update(&self) -> Result<()> {
        if !self.path.is_dir() {
            return Err(Error::NotFound {
                path: self.path.clone(),
            });
        }

        self.apply_limits().await?;

        debug!(path = %self.path.display(), "CGroup limits updated");
        Ok(())
    }

    /// Move a process into this group
    pub async fn add_process(&self, pid: ProcessId) -> Result<()> {
        let procs_file = self.path.join("cgroup.procs");

        debug!("Adding process {} to cgroup", pid);

        fs::write(&procs_file, pid.as_raw().to_string())
            .await
            .map_err(|e| io_error(&procs_file, "add process to cgroup", e))
    }

    /// Enable necessary controllers in parent cgroup
    ///
    /// Best effort: a parent we may not write to usually has the
    /// controllers delegated at a higher level already.
    async fn enable_controllers(&self, parent: &Path) -> Result<()> {
        let control_file = parent.join("cgroup.subtree_control");

        if !control_file.exists() {
            debug!("Control file does not exist, skipping controller setup");
            return Ok(());
        }

        let current = match fs::read_to_string(&control_file).await {
            Ok(content) => content,
            Err(e) => {
                debug!("Could not read control file: {}", e);
                String::new()
            }
        };

        let enabled: Vec<&str> = current.split_whitespace().collect();
        let to_enable: String = REQUIRED_CONTROLLERS
            .iter()
            .filter(|c| !enabled.contains(*c))
            .map(|c| format!("+{c}"))
            .collect::<Vec<_>>()
            .join(" ");

        if to_enable.is_empty() {
            debug!(
                "All required controllers already enabled in {}",
                parent.display()
            );
            return Ok(());
        }

        debug!(
            "Enabling controllers in {}: {}",
            parent.display(),
            to_enable
        );

        match fs::write(&control_file, &to_enable).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                debug!("Permission denied is OK - controllers may be managed at higher level");
                Ok(())
            }
            Err(e) => Err(io_error(&control_file, "enable controllers", e)),
        }
    }
}

/// Map a filesystem error, keeping "does not exist" distinguishable
pub(crate) fn io_error(path: &Path, operation: &str, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => Error::PermissionDenied {
            operation: format!("{operation} ({}): {e}", path.display()),
        },
        _ => Error::CGroup {
            message: format!("{operation} ({}): {e}", path.display()),
        },
    }
}
