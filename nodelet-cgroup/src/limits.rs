//! Resource limit implementations
//!
//! Writes CPU and memory limits to the cgroup v2 control files.

use crate::controller::{CgroupController, io_error};
use tokio::fs;
use tracing::debug;
use nodelet_core::{CpuCores, MemorySize, Result};

impl CgroupController {
    /// Write every limit present in the configuration
    pub(crate) async fn apply_limits(&self) -> Result<()> {
        let config = &self.config;

        if config.cpu_quota.is_some() || config.cpu_period.is_some() {
            self.set_cpu_max(
                config.cpu_quota,
                config.cpu_period.unwrap_or(CpuCores::PERIOD_MICROS),
            )
            .await?;
        }

        if let Some(limit) = config.memory_limit {
            self.set_memory_max(limit).await?;
        }

        Ok(())
    }

    /// Set `cpu.max`; a `None` quota means unlimited
    async fn set_cpu_max(&self, quota: Option<i64>, period: i64) -> Result<()> {
        let cpu_max_file = self.path.join("cpu.max");

        // Format: "quota period" (both in microseconds)
        let content = quota.map_or_else(
            || format!("max {period}"),
            |quota| format!("{quota} {period}"),
        );

        debug!(file = %cpu_max_file.display(), %content, "Setting CPU limit");

        fs::write(&cpu_max_file, content)
            .await
            .map_err(|e| io_error(&cpu_max_file, "set CPU limit", e))
    }

    /// Set `memory.max`
    ///
    /// If exceeded, the kernel's OOM killer terminates processes in the group.
    async fn set_memory_max(&self, limit: MemorySize) -> Result<()> {
        let memory_max_file = self.path.join("memory.max");

        debug!("Setting memory limit to {}", limit);

        fs::write(&memory_max_file, limit.as_bytes().to_string())
            .await
            .map_err(|e| io_error(&memory_max_file, "set memory limit", e))
    }
}

#[cfg(test)]
mod tests {
    use crate::{CgroupConfig, CgroupController};

    #[tokio::test]
    async fn unlimited_quota_writes_max() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("k8s.io")).unwrap();

        let config = CgroupConfig::new("k8s.io").with_cpu(None, Some(50_000));
        let controller = CgroupController::new(root.path(), config).unwrap();
        controller.apply_limits().await.unwrap();

        let cpu_max = std::fs::read_to_string(root.path().join("k8s.io/cpu.max")).unwrap();
        assert_eq!(cpu_max, "max 50000");
        assert!(!root.path().join("k8s.io/memory.max").exists());
    }

    #[tokio::test]
    async fn no_limits_touches_nothing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("k8s.io")).unwrap();

        let controller = CgroupController::new(root.path(), CgroupConfig::new("k8s.io")).unwrap();
        controller.apply_limits().await.unwrap();

        let entries = std::fs::read_dir(root.path().join("k8s.io")).unwrap().count();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn missing_group_surfaces_not_found() {
        let root = tempfile::tempdir().unwrap();
        let config = CgroupConfig::new("gone").with_cpu(Some(100_000), None);
        let controller = CgroupController::new(root.path(), config).unwrap();

        let err = controller.apply_limits().await.unwrap_err();
        assert!(err.is_not_found());
    }
}
