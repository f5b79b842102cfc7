//! The raw telemetry sources that the samplers query.
//!
//! Samplers only ever talk to these traits, so that tests can swap in fakes and
//! so that platform-specific code stays in one place.

pub mod identity;
#[cfg(feature = "nvidia")]
pub mod nvidia;
pub mod sysinfo;

use std::sync::Arc;

use super::{calculators::CpuTimes, error::CollectionResult, Pid, Uid};

/// A single process as reported by a [`HostSource`].
#[derive(Debug, Clone, Default)]
pub struct ProcessEntry {
    pub pid: Pid,

    /// Cumulative user and system CPU time.
    pub cpu_times: CpuTimes,

    /// Memory used as a percentage of total system memory.
    pub mem_usage_percent: f64,

    /// The executable/command name.
    pub name: String,
}

/// Host (CPU, memory, process) telemetry.
///
/// All methods take `&self` and may be called concurrently from different
/// threads within a single poll.
pub trait HostSource: Send + Sync {
    /// Usage percentage per logical core, indexed by core id.
    fn per_core_usage(&self) -> CollectionResult<Vec<f64>>;

    /// Aggregate usage percentage over all cores.
    fn total_usage(&self) -> CollectionResult<f64>;

    /// Used memory as a percentage of total memory.
    fn memory_usage(&self) -> CollectionResult<f64>;

    /// Lists the currently visible processes.
    fn pids(&self) -> CollectionResult<Vec<Pid>>;

    /// Reads a process listed by the last call to [`HostSource::pids`].
    ///
    /// Returns [`CollectionError::ProcessGone`](super::error::CollectionError::ProcessGone)
    /// if the process has exited in the meantime.
    fn process(&self, pid: Pid) -> CollectionResult<ProcessEntry>;
}

impl<H: HostSource + ?Sized> HostSource for Arc<H> {
    fn per_core_usage(&self) -> CollectionResult<Vec<f64>> {
        (**self).per_core_usage()
    }

    fn total_usage(&self) -> CollectionResult<f64> {
        (**self).total_usage()
    }

    fn memory_usage(&self) -> CollectionResult<f64> {
        (**self).memory_usage()
    }

    fn pids(&self) -> CollectionResult<Vec<Pid>> {
        (**self).pids()
    }

    fn process(&self, pid: Pid) -> CollectionResult<ProcessEntry> {
        (**self).process(pid)
    }
}

/// Device memory, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuMemory {
    pub used: u64,
    pub total: u64,
}

/// A per-process streaming multiprocessor utilization sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuProcessUtilization {
    pub pid: Pid,
    pub sm_util: u32,
}

/// A process holding a graphics or compute context, with its memory use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuProcessMemory {
    pub pid: Pid,
    pub used_bytes: u64,
}

/// Accelerator telemetry for a single device.
///
/// "Nothing found" conditions are reported as
/// [`CollectionError::NotFound`](super::error::CollectionError::NotFound).
pub trait AcceleratorSource: Send + Sync {
    /// The number of devices present.
    fn device_count(&self) -> CollectionResult<u32>;

    /// Device utilization, nominally 0 to 100.
    fn utilization(&self) -> CollectionResult<u32>;

    /// Device memory.
    fn memory_info(&self) -> CollectionResult<GpuMemory>;

    /// Per-process SM utilization.
    fn process_utilization(&self) -> CollectionResult<Vec<GpuProcessUtilization>>;

    /// Processes with a graphics context on the device.
    fn graphics_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>>;

    /// Processes with a compute context on the device.
    fn compute_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>>;
}

/// Resolves processes to their owning user.
pub trait IdentitySource: Send + Sync {
    /// The real user id of a process. Expected to be cheap and local.
    fn uid_of(&self, pid: Pid) -> Option<Uid>;

    /// The username for a user id. This may be network-backed (e.g. LDAP) and
    /// has no latency bound of its own.
    fn username_of(&self, uid: Uid) -> Option<String>;
}

impl<A: AcceleratorSource + ?Sized> AcceleratorSource for Box<A> {
    fn device_count(&self) -> CollectionResult<u32> {
        (**self).device_count()
    }

    fn utilization(&self) -> CollectionResult<u32> {
        (**self).utilization()
    }

    fn memory_info(&self) -> CollectionResult<GpuMemory> {
        (**self).memory_info()
    }

    fn process_utilization(&self) -> CollectionResult<Vec<GpuProcessUtilization>> {
        (**self).process_utilization()
    }

    fn graphics_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>> {
        (**self).graphics_processes()
    }

    fn compute_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>> {
        (**self).compute_processes()
    }
}
