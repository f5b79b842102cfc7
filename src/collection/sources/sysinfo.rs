//! Host telemetry through sysinfo.

use std::sync::Mutex;

use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use super::{HostSource, ProcessEntry};
use crate::collection::{
    calculators::{memory_percent, CpuTimes},
    error::{CollectionError, CollectionResult},
    Pid,
};

/// A [`HostSource`] backed by sysinfo.
///
/// Each query gets its own [`System`] so that the fan-out workers of a poll do
/// not contend on one lock. CPU usage in sysinfo is computed between two
/// refreshes, so the very first reading after construction is relative to the
/// baseline taken in [`SysinfoHost::new`].
#[derive(Debug)]
pub struct SysinfoHost {
    per_core: Mutex<System>,
    total: Mutex<System>,
    memory: Mutex<System>,
    processes: Mutex<System>,
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoHost {
    pub fn new() -> Self {
        let cpu_baseline = || {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            Mutex::new(sys)
        };

        Self {
            per_core: cpu_baseline(),
            total: cpu_baseline(),
            memory: Mutex::new(System::new()),
            processes: Mutex::new(System::new()),
        }
    }
}

fn lock(sys: &Mutex<System>) -> std::sync::MutexGuard<'_, System> {
    sys.lock().expect("sysinfo lock should not be poisoned")
}

/// Kernel threads have no command line; show them the way `ps` does so the
/// process filter can recognize them.
#[cfg(target_os = "linux")]
fn display_name(process: &sysinfo::Process) -> String {
    let name = process.name().to_string_lossy();
    if process.cmd().is_empty() {
        format!("[{name}]")
    } else {
        name.into_owned()
    }
}

#[cfg(not(target_os = "linux"))]
fn display_name(process: &sysinfo::Process) -> String {
    process.name().to_string_lossy().into_owned()
}

impl HostSource for SysinfoHost {
    fn per_core_usage(&self) -> CollectionResult<Vec<f64>> {
        let mut sys = lock(&self.per_core);
        sys.refresh_cpu_usage();

        let usages = sys
            .cpus()
            .iter()
            .map(|cpu| f64::from(cpu.cpu_usage()))
            .collect::<Vec<_>>();

        if usages.is_empty() {
            Err("no CPUs were reported".into())
        } else {
            Ok(usages)
        }
    }

    fn total_usage(&self) -> CollectionResult<f64> {
        let mut sys = lock(&self.total);
        sys.refresh_cpu_usage();

        Ok(f64::from(sys.global_cpu_usage()))
    }

    fn memory_usage(&self) -> CollectionResult<f64> {
        let mut sys = lock(&self.memory);
        sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());

        Ok(memory_percent(sys.used_memory(), sys.total_memory()))
    }

    fn pids(&self) -> CollectionResult<Vec<Pid>> {
        let mut sys = lock(&self.processes);
        sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );

        Ok(sys.processes().keys().map(|pid| pid.as_u32()).collect())
    }

    fn process(&self, pid: Pid) -> CollectionResult<ProcessEntry> {
        let sys = lock(&self.processes);
        let process = sys
            .process(sysinfo::Pid::from_u32(pid))
            .ok_or(CollectionError::ProcessGone(pid))?;

        // sysinfo only exposes the combined user + system time, in milliseconds.
        let cpu_times = CpuTimes {
            user: process.accumulated_cpu_time() as f64 / 1000.0,
            system: 0.0,
        };

        Ok(ProcessEntry {
            pid,
            cpu_times,
            mem_usage_percent: memory_percent(process.memory(), sys.total_memory()),
            name: display_name(process),
        })
    }
}
