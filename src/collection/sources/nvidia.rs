//! Accelerator telemetry from NVIDIA cards through NVML.

use std::sync::OnceLock;

use nvml_wrapper::{enums::device::UsedGpuMemory, error::NvmlError, Device, Nvml};

use super::{AcceleratorSource, GpuMemory, GpuProcessMemory, GpuProcessUtilization};
use crate::collection::error::{CollectionError, CollectionResult};

static NVML_DATA: OnceLock<Result<Nvml, NvmlError>> = OnceLock::new();

/// Wrapper around Nvml::init
///
/// On Linux, if `Nvml::init()` fails, this function attempts to explicitly load
/// the library from `libnvidia-ml.so.1`. On other platforms, it simply calls `Nvml::init`.
fn init_nvml() -> Result<Nvml, NvmlError> {
    #[cfg(not(target_os = "linux"))]
    let res = Nvml::init();

    #[cfg(target_os = "linux")]
    let res = match Nvml::init() {
        Ok(nvml) => Ok(nvml),
        Err(_) => Nvml::builder()
            .lib_path(std::ffi::OsStr::new("libnvidia-ml.so.1"))
            .init(),
    };

    if let Err(e) = &res {
        log::error!("Failed to initialize NVML: {e}");
    }

    res
}

fn nvml() -> CollectionResult<&'static Nvml> {
    NVML_DATA
        .get_or_init(init_nvml)
        .as_ref()
        .map_err(|_| CollectionError::NoDevice)
}

/// Returns whether NVML is usable and reports at least one device.
///
/// This is meant to be checked once, up front, to decide whether a GPU
/// sampler should run at all.
pub fn has_nvidia_gpu() -> bool {
    match nvml().and_then(|nvml| nvml.device_count().map_err(CollectionError::from)) {
        Ok(count) => count > 0,
        Err(_) => false,
    }
}

impl From<NvmlError> for CollectionError {
    fn from(err: NvmlError) -> Self {
        match err {
            NvmlError::NotFound => CollectionError::NotFound,
            NvmlError::Uninitialized | NvmlError::GpuLost | NvmlError::LibraryNotFound => {
                CollectionError::NoDevice
            }
            err => CollectionError::General(err.into()),
        }
    }
}

#[inline]
fn used_bytes(used: &UsedGpuMemory) -> u64 {
    match used {
        UsedGpuMemory::Used(val) => *val,
        UsedGpuMemory::Unavailable => 0,
    }
}

/// An [`AcceleratorSource`] for the first NVIDIA device in the system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmlSource {
    index: u32,
}

impl NvmlSource {
    /// Creates a source for the device at `index`.
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    fn device(&self) -> CollectionResult<Device<'static>> {
        Ok(nvml()?.device_by_index(self.index)?)
    }
}

impl AcceleratorSource for NvmlSource {
    fn device_count(&self) -> CollectionResult<u32> {
        Ok(nvml()?.device_count()?)
    }

    fn utilization(&self) -> CollectionResult<u32> {
        Ok(self.device()?.utilization_rates()?.gpu)
    }

    fn memory_info(&self) -> CollectionResult<GpuMemory> {
        let mem = self.device()?.memory_info()?;

        Ok(GpuMemory {
            used: mem.used,
            total: mem.total,
        })
    }

    fn process_utilization(&self) -> CollectionResult<Vec<GpuProcessUtilization>> {
        let samples = self.device()?.process_utilization_stats(None)?;

        Ok(samples
            .into_iter()
            .map(|sample| GpuProcessUtilization {
                pid: sample.pid,
                sm_util: sample.sm_util,
            })
            .collect())
    }

    fn graphics_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>> {
        let procs = self.device()?.running_graphics_processes()?;

        Ok(procs
            .iter()
            .map(|proc| GpuProcessMemory {
                pid: proc.pid,
                used_bytes: used_bytes(&proc.used_gpu_memory),
            })
            .collect())
    }

    fn compute_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>> {
        let procs = self.device()?.running_compute_processes()?;

        Ok(procs
            .iter()
            .map(|proc| GpuProcessMemory {
                pid: proc.pid,
                used_bytes: used_bytes(&proc.used_gpu_memory),
            })
            .collect())
    }
}
