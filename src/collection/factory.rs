//! Builds the pollers for whatever hardware is present.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{
    cpu_memory::{CpuMemSnapshot, CpuMemorySampler},
    gpu::{GpuSampler, GpuSnapshot},
    poller::MetricPoller,
    sources::{sysinfo::SysinfoHost, AcceleratorSource, HostSource},
    username_cache::UsernameCache,
};
use crate::options::PipelineConfig;

pub type CpuMemPoller<H = SysinfoHost> = MetricPoller<CpuMemorySampler<H>>;
pub type GpuPoller = MetricPoller<GpuSampler<Box<dyn AcceleratorSource>>>;

/// The pollers for one pipeline, and the streams they publish on.
#[derive(Debug)]
pub struct Pollers<H: HostSource + 'static = SysinfoHost> {
    pub cpu_memory: CpuMemPoller<H>,
    pub cpu_memory_stream: mpsc::Receiver<CpuMemSnapshot>,
    pub gpu: Option<(GpuPoller, mpsc::Receiver<GpuSnapshot>)>,
}

impl<H: HostSource + 'static> Pollers<H> {
    /// Stops every poller.
    pub fn stop(&self) {
        self.cpu_memory.stop();
        if let Some((gpu, _)) = &self.gpu {
            gpu.stop();
        }
    }
}

/// Builds the pollers for this system. The CPU/memory poller always exists;
/// the GPU poller only does if GPU collection is enabled and a device is
/// found.
pub fn build_pollers(config: &PipelineConfig, usernames: Arc<UsernameCache>) -> Pollers {
    let accelerator = if config.enable_gpu {
        detect_accelerator()
    } else {
        log::debug!("GPU collection is disabled.");
        None
    };

    build_pollers_with(SysinfoHost::new(), accelerator, config, usernames)
}

/// Builds pollers over the given sources.
pub fn build_pollers_with<H: HostSource + 'static>(
    host: H, accelerator: Option<Box<dyn AcceleratorSource>>, config: &PipelineConfig,
    usernames: Arc<UsernameCache>,
) -> Pollers<H> {
    let (cpu_memory, cpu_memory_stream) =
        MetricPoller::new(CpuMemorySampler::new(host), config.update_rate);

    let gpu = accelerator
        .map(|source| MetricPoller::new(GpuSampler::new(source, usernames), config.update_rate));

    Pollers {
        cpu_memory,
        cpu_memory_stream,
        gpu,
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "nvidia")] {
        fn detect_accelerator() -> Option<Box<dyn AcceleratorSource>> {
            use super::sources::nvidia::{has_nvidia_gpu, NvmlSource};

            if has_nvidia_gpu() {
                log::info!("Found an NVIDIA GPU, enabling GPU collection.");
                Some(Box::new(NvmlSource::new(0)))
            } else {
                log::info!("No NVIDIA GPU found, skipping GPU collection.");
                None
            }
        }
    } else {
        fn detect_accelerator() -> Option<Box<dyn AcceleratorSource>> {
            log::info!("Built without GPU support, skipping GPU collection.");
            None
        }
    }
}
