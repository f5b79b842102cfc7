//! Metric collection: the sources metrics are read from, the samplers that
//! turn them into snapshots, and the pollers that run those samplers.

pub mod calculators;
pub mod cpu_memory;
pub mod error;
pub mod factory;
pub mod filter;
pub mod gpu;
pub mod poller;
pub mod sources;
pub mod username_cache;

/// A process id.
pub type Pid = u32;

/// A user id.
pub type Uid = u32;

pub use cpu_memory::{CpuMemSnapshot, CpuMemorySampler, ProcessSample};
pub use error::{CollectionError, CollectionResult};
pub use factory::{build_pollers, Pollers};
pub use gpu::{GpuProcessSample, GpuSampler, GpuSnapshot};
pub use poller::{MetricPoller, Sampler};
pub use username_cache::UsernameCache;
