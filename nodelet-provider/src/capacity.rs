//! Node capacity resolution
//!
//! Local runtimes report capacity themselves and fill unset fields from the
//! host. The delegated runtime only reports what is configured; the remote
//! cluster owns the real accounting.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use nodelet_core::config::CapacityConfig;
use nodelet_core::{CpuCores, Error, MemorySize, Result, RuntimeKind};

/// Pod limit when none is configured
pub const DEFAULT_MAX_PODS: u32 = 500;

/// Amounts of each schedulable resource; `None` when unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceAmounts {
    /// CPU
    pub cpu: Option<CpuCores>,
    /// Memory
    pub memory: Option<MemorySize>,
    /// Maximum pod count
    pub pods: Option<u32>,
    /// Ephemeral storage
    pub storage: Option<MemorySize>,
}

impl ResourceAmounts {
    /// Parse configured quantity strings
    fn parse(config: &CapacityConfig) -> Result<Self> {
        let cpu = config
            .cpu
            .as_deref()
            .map(CpuCores::parse_quantity)
            .transpose()
            .map_err(capacity_error)?;
        let memory = config
            .memory
            .as_deref()
            .map(MemorySize::parse_quantity)
            .transpose()
            .map_err(capacity_error)?;
        let storage = config
            .storage
            .as_deref()
            .map(MemorySize::parse_quantity)
            .transpose()
            .map_err(capacity_error)?;
        let pods = config
            .pods
            .as_deref()
            .map(|p| {
                p.trim().parse::<u32>().map_err(|_| Error::Capacity {
                    message: format!("invalid pods quantity: {p:?}"),
                })
            })
            .transpose()?;

        Ok(Self {
            cpu,
            memory,
            pods,
            storage,
        })
    }

    /// Render as a Kubernetes resource list
    #[must_use]
    pub fn to_quantities(&self) -> BTreeMap<String, Quantity> {
        let mut list = BTreeMap::new();
        if let Some(cpu) = self.cpu {
            list.insert("cpu".to_string(), Quantity(cpu.to_quantity_string()));
        }
        if let Some(memory) = self.memory {
            list.insert("memory".to_string(), Quantity(memory.to_quantity_string()));
        }
        if let Some(pods) = self.pods {
            list.insert("pods".to_string(), Quantity(pods.to_string()));
        }
        if let Some(storage) = self.storage {
            list.insert(
                "ephemeral-storage".to_string(),
                Quantity(storage.to_quantity_string()),
            );
        }
        list
    }
}

/// Computes reportable and enforceable node capacity
#[derive(Debug, Clone)]
pub struct CapacityManager {
    runtime: RuntimeKind,
    self_report: bool,
    capacity: ResourceAmounts,
    allocatable: ResourceAmounts,
}

impl CapacityManager {
    /// Resolve capacity for `runtime`
    ///
    /// With `self_report`, unset cpu/memory/storage are detected from the
    /// host (storage from the filesystem holding `root_dir`).
    ///
    /// # Errors
    /// Returns [`Error::Capacity`] for malformed quantities, failed host
    /// detection, or a reservation larger than the capacity.
    pub fn new(
        runtime: RuntimeKind,
        capacity: &CapacityConfig,
        reserved: &CapacityConfig,
        root_dir: &Path,
        self_report: bool,
    ) -> Result<Self> {
        let mut total = ResourceAmounts::parse(capacity)?;
        let reserved = ResourceAmounts::parse(reserved)?;

        if self_report {
            if total.cpu.is_none() {
                total.cpu = Some(host_cpus()?);
            }
            if total.memory.is_none() {
                total.memory = Some(host_memory()?);
            }
            if total.storage.is_none() {
                total.storage = Some(filesystem_size(root_dir)?);
            }
            if total.pods.is_none() {
                total.pods = Some(DEFAULT_MAX_PODS);
            }
        }

        let allocatable = ResourceAmounts {
            cpu: subtract("cpu", total.cpu, reserved.cpu, CpuCores::checked_sub)?,
            memory: subtract(
                "memory",
                total.memory,
                reserved.memory,
                MemorySize::checked_sub,
            )?,
            pods: subtract("pods", total.pods, reserved.pods, u32::checked_sub)?,
            storage: subtract(
                "storage",
                total.storage,
                reserved.storage,
                MemorySize::checked_sub,
            )?,
        };

        info!(
            %runtime,
            self_report,
            cpu = ?allocatable.cpu.map(CpuCores::to_quantity_string),
            memory = ?allocatable.memory.map(MemorySize::to_quantity_string),
            pods = ?allocatable.pods,
            "Resolved node capacity"
        );

        Ok(Self {
            runtime,
            self_report,
            capacity: total,
            allocatable,
        })
    }

    /// Runtime the capacity was resolved for
    #[must_use]
    pub const fn runtime(&self) -> RuntimeKind {
        self.runtime
    }

    /// Whether the agent reports capacity itself
    #[must_use]
    pub const fn self_report(&self) -> bool {
        self.self_report
    }

    /// Total node capacity
    #[must_use]
    pub const fn capacity(&self) -> &ResourceAmounts {
        &self.capacity
    }

    /// Capacity minus reservations
    #[must_use]
    pub const fn allocatable(&self) -> &ResourceAmounts {
        &self.allocatable
    }

    /// CPU quota for the workload cgroup, in microseconds per period
    #[must_use]
    pub fn cgroup_cpu_quota(&self) -> Option<i64> {
        if !self.self_report {
            return None;
        }
        self.allocatable.cpu.map(|cpu| cpu.to_quota().0)
    }

    /// CPU period for the workload cgroup, in microseconds
    #[must_use]
    pub fn cgroup_cpu_period(&self) -> Option<i64> {
        if !self.self_report {
            return None;
        }
        self.allocatable.cpu.map(|cpu| cpu.to_quota().1)
    }

    /// Memory limit for the workload cgroup
    #[must_use]
    pub const fn cgroup_memory_limit(&self) -> Option<MemorySize> {
        if !self.self_report {
            return None;
        }
        self.allocatable.memory
    }
}

#[allow(clippy::needless_pass_by_value)]
fn capacity_error(e: Error) -> Error {
    Error::Capacity {
        message: e.to_string(),
    }
}

fn subtract<T: Copy + std::fmt::Debug>(
    name: &str,
    total: Option<T>,
    reserved: Option<T>,
    checked_sub: impl Fn(T, T) -> Option<T>,
) -> Result<Option<T>> {
    match (total, reserved) {
        (Some(total), Some(reserved)) => checked_sub(total, reserved)
            .map(Some)
            .ok_or_else(|| Error::Capacity {
                message: format!("reserved {name} {reserved:?} exceeds capacity {total:?}"),
            }),
        (total, _) => Ok(total),
    }
}

fn host_cpus() -> Result<CpuCores> {
    // SAFETY: sysconf has no preconditions
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online <= 0 {
        return Err(Error::Capacity {
            message: "could not detect online CPUs".to_string(),
        });
    }

    #[allow(clippy::cast_sign_loss)]
    let cores = CpuCores::new(online as u64);
    debug!(%cores, "Detected host CPUs");
    Ok(cores)
}

fn host_memory() -> Result<MemorySize> {
    // SAFETY: sysconf has no preconditions
    let (pages, page_size) = unsafe {
        (
            libc::sysconf(libc::_SC_PHYS_PAGES),
            libc::sysconf(libc::_SC_PAGESIZE),
        )
    };
    if pages <= 0 || page_size <= 0 {
        return Err(Error::Capacity {
            message: "could not detect physical memory".to_string(),
        });
    }

    #[allow(clippy::cast_sign_loss)]
    let memory = MemorySize::from_bytes((pages as u64).saturating_mul(page_size as u64));
    debug!(%memory, "Detected host memory");
    Ok(memory)
}

fn filesystem_size(path: &Path) -> Result<MemorySize> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|errno| Error::Capacity {
        message: format!("stat filesystem of {}: {errno}", path.display()),
    })?;

    #[allow(clippy::unnecessary_cast, clippy::useless_conversion)]
    let bytes = (stat.blocks() as u64).saturating_mul(stat.fragment_size() as u64);
    Ok(MemorySize::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(cpu: &str, memory: &str) -> CapacityConfig {
        CapacityConfig {
            cpu: Some(cpu.to_string()),
            memory: Some(memory.to_string()),
            pods: Some("100".to_string()),
            storage: Some("100Gi".to_string()),
        }
    }

    #[test]
    fn local_capacity_drives_cgroup_limits() {
        let reserved = CapacityConfig {
            cpu: Some("500m".to_string()),
            memory: Some("512Mi".to_string()),
            ..Default::default()
        };
        let cm = CapacityManager::new(
            RuntimeKind::Process,
            &spec("2500m", "1Gi"),
            &reserved,
            Path::new("/nonexistent"),
            true,
        )
        .unwrap();

        assert_eq!(cm.allocatable().cpu, Some(CpuCores::new(2)));
        assert_eq!(cm.allocatable().memory, Some(MemorySize::from_mb(512)));
        assert_eq!(cm.cgroup_cpu_quota(), Some(200_000));
        assert_eq!(cm.cgroup_cpu_period(), Some(100_000));
        assert_eq!(cm.cgroup_memory_limit(), Some(MemorySize::from_mb(512)));
    }

    #[test]
    fn delegated_capacity_reports_only_configuration() {
        let cm = CapacityManager::new(
            RuntimeKind::K8s,
            &CapacityConfig {
                cpu: Some("8".to_string()),
                ..Default::default()
            },
            &CapacityConfig::default(),
            Path::new("/nonexistent"),
            false,
        )
        .unwrap();

        assert_eq!(cm.capacity().cpu, Some(CpuCores::new(8)));
        assert_eq!(cm.capacity().memory, None);
        assert_eq!(cm.capacity().pods, None);
        assert_eq!(cm.cgroup_cpu_quota(), None);
        assert_eq!(cm.cgroup_cpu_period(), None);
        assert_eq!(cm.cgroup_memory_limit(), None);
    }

    #[test]
    fn detects_missing_fields_from_host() {
        let root = tempfile::tempdir().unwrap();
        let cm = CapacityManager::new(
            RuntimeKind::Container,
            &CapacityConfig::default(),
            &CapacityConfig::default(),
            root.path(),
            true,
        )
        .unwrap();

        let capacity = cm.capacity();
        assert!(capacity.cpu.unwrap() >= CpuCores::new(1));
        assert!(capacity.memory.unwrap() > MemorySize::default());
        assert!(capacity.storage.unwrap() > MemorySize::default());
        assert_eq!(capacity.pods, Some(DEFAULT_MAX_PODS));
    }

    #[test]
    fn missing_root_dir_fails_storage_detection() {
        let err = CapacityManager::new(
            RuntimeKind::Process,
            &CapacityConfig::default(),
            &CapacityConfig::default(),
            Path::new("/definitely/not/here"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Capacity { .. }));
    }

    #[test]
    fn over_reservation_is_rejected() {
        let reserved = CapacityConfig {
            memory: Some("2Gi".to_string()),
            ..Default::default()
        };
        let err = CapacityManager::new(
            RuntimeKind::Process,
            &spec("2", "1Gi"),
            &reserved,
            Path::new("/"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Capacity { .. }));
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn malformed_quantity_is_capacity_error() {
        let err = CapacityManager::new(
            RuntimeKind::Process,
            &spec("lots", "1Gi"),
            &CapacityConfig::default(),
            Path::new("/"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Capacity { .. }));
    }

    #[test]
    fn quantities_for_node_status() {
        let cm = CapacityManager::new(
            RuntimeKind::Process,
            &spec("4", "8Gi"),
            &CapacityConfig::default(),
            Path::new("/"),
            true,
        )
        .unwrap();

        let list = cm.capacity().to_quantities();
        assert_eq!(list["cpu"], Quantity("4".to_string()));
        assert_eq!(list["memory"], Quantity("8Gi".to_string()));
        assert_eq!(list["pods"], Quantity("100".to_string()));
        assert_eq!(list["ephemeral-storage"], Quantity("100Gi".to_string()));
    }
}
