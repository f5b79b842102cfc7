//! Accelerator sampling.

use std::{
    sync::{mpsc, Arc},
    thread,
};

use hashbrown::HashMap;
use itertools::Itertools;

use super::{
    calculators::{memory_percent, utilization_percent},
    error::{CollectionError, CollectionResult},
    poller::Sampler,
    sources::{AcceleratorSource, GpuMemory, GpuProcessMemory, GpuProcessUtilization},
    username_cache::UsernameCache,
    Pid,
};

/// A process using the accelerator in one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuProcessSample {
    pub pid: Pid,

    /// Streaming multiprocessor utilization, from 0 to 100.
    pub sm_util_percent: f64,

    /// Device memory used, as a percentage of the device's total memory.
    pub mem_usage_percent: f64,

    /// The owning user.
    pub user: Arc<str>,
}

/// The result of one accelerator poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuSnapshot {
    /// Device utilization.
    pub utilization: f64,

    /// Device memory used, as a percentage.
    pub mem_usage_percent: f64,

    /// Processes on the device, ordered by pid.
    pub processes: Vec<GpuProcessSample>,
}

impl GpuSnapshot {
    /// The `n` processes with the highest SM utilization, highest first.
    pub fn top_by_sm(&self, n: usize) -> Vec<&GpuProcessSample> {
        self.processes
            .iter()
            .sorted_by(|a, b| b.sm_util_percent.total_cmp(&a.sm_util_percent))
            .take(n)
            .collect()
    }

    /// The `n` processes using the most device memory, highest first.
    pub fn top_by_memory(&self, n: usize) -> Vec<&GpuProcessSample> {
        self.processes
            .iter()
            .sorted_by(|a, b| b.mem_usage_percent.total_cmp(&a.mem_usage_percent))
            .take(n)
            .collect()
    }
}

/// A process after merging the utilization and memory lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MergedProcess {
    pub(crate) sm_util: u32,
    pub(crate) used_bytes: u64,
}

/// Merges the per-process utilization list with the graphics and compute
/// process lists. A process may show up in any subset of the three; anything
/// missing defaults to 0. If a process is in both the graphics and compute
/// lists, the later (compute) reading wins.
pub(crate) fn merge_processes(
    utilization: &[GpuProcessUtilization], graphics: &[GpuProcessMemory],
    compute: &[GpuProcessMemory],
) -> HashMap<Pid, MergedProcess> {
    let mut merged: HashMap<Pid, MergedProcess> = utilization
        .iter()
        .map(|proc| {
            (
                proc.pid,
                MergedProcess {
                    sm_util: proc.sm_util,
                    used_bytes: 0,
                },
            )
        })
        .collect();

    for proc in graphics.iter().chain(compute) {
        merged.entry(proc.pid).or_default().used_bytes = proc.used_bytes;
    }

    merged
}

/// Treats an explicit "not found" as an empty result.
fn tolerate_not_found<T: Default>(result: CollectionResult<T>) -> CollectionResult<T> {
    match result {
        Err(err) if err.is_not_found() => Ok(T::default()),
        result => result,
    }
}

enum Partial {
    Utilization(f64),
    Memory(GpuMemory),
    Processes(Vec<(Pid, MergedProcess, Arc<str>)>),
}

const WORKERS: usize = 3;

/// Samples device utilization, memory, and per-process usage from an
/// [`AcceleratorSource`].
pub struct GpuSampler<A> {
    source: A,
    usernames: Arc<UsernameCache>,
}

impl<A> std::fmt::Debug for GpuSampler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuSampler")
            .field("usernames", &self.usernames)
            .finish_non_exhaustive()
    }
}

impl<A: AcceleratorSource> GpuSampler<A> {
    pub fn new(source: A, usernames: Arc<UsernameCache>) -> Self {
        Self { source, usernames }
    }

    /// Runs one poll. Any failing query fails the whole poll, except for "not
    /// found" results from the process lists, which just mean there are no
    /// processes.
    pub fn collect(&self) -> CollectionResult<GpuSnapshot> {
        if self.source.device_count()? == 0 {
            return Err(CollectionError::NoDevice);
        }

        let source = &self.source;
        let usernames = &*self.usernames;

        // As with the CPU sampler, the channel holds every result so an early
        // return never leaves a worker stuck.
        let (utilization, memory, processes) = thread::scope(|s| -> CollectionResult<_> {
            let (sender, receiver) = mpsc::sync_channel::<CollectionResult<Partial>>(WORKERS);

            let tx = sender.clone();
            s.spawn(move || {
                let res = source
                    .utilization()
                    .map(|raw| Partial::Utilization(utilization_percent(raw)));
                let _ = tx.send(res);
            });

            let tx = sender.clone();
            s.spawn(move || {
                let _ = tx.send(source.memory_info().map(Partial::Memory));
            });

            s.spawn(move || {
                let _ = sender.send(collect_processes(source, usernames).map(Partial::Processes));
            });

            let mut utilization = None;
            let mut memory = None;
            let mut processes = None;

            for _ in 0..WORKERS {
                match receiver.recv() {
                    Ok(Ok(Partial::Utilization(util))) => utilization = Some(util),
                    Ok(Ok(Partial::Memory(mem))) => memory = Some(mem),
                    Ok(Ok(Partial::Processes(procs))) => processes = Some(procs),
                    Ok(Err(err)) => return Err(err),
                    Err(_) => return Err(CollectionError::Worker("gpu")),
                }
            }

            Ok((
                utilization.ok_or(CollectionError::Worker("utilization"))?,
                memory.ok_or(CollectionError::Worker("memory"))?,
                processes.ok_or(CollectionError::Worker("processes"))?,
            ))
        })?;

        let processes = processes
            .into_iter()
            .map(|(pid, merged, user)| GpuProcessSample {
                pid,
                sm_util_percent: utilization_percent(merged.sm_util),
                mem_usage_percent: memory_percent(merged.used_bytes, memory.total),
                user,
            })
            .collect();

        Ok(GpuSnapshot {
            utilization,
            mem_usage_percent: memory_percent(memory.used, memory.total),
            processes,
        })
    }
}

/// Queries the three process lists, merges them, and attaches usernames.
fn collect_processes<A: AcceleratorSource>(
    source: &A, usernames: &UsernameCache,
) -> CollectionResult<Vec<(Pid, MergedProcess, Arc<str>)>> {
    let utilization = tolerate_not_found(source.process_utilization())?;
    let graphics = tolerate_not_found(source.graphics_processes())?;
    let compute = tolerate_not_found(source.compute_processes())?;

    let merged = merge_processes(&utilization, &graphics, &compute);
    log::trace!("Found {} GPU processes.", merged.len());

    Ok(merged
        .into_iter()
        .sorted_by_key(|(pid, _)| *pid)
        .map(|(pid, proc)| (pid, proc, usernames.get_username(pid)))
        .collect())
}

impl<A: AcceleratorSource + 'static> Sampler for GpuSampler<A> {
    type Snapshot = GpuSnapshot;

    fn name(&self) -> &'static str {
        "gpu"
    }

    fn sample(&mut self) -> CollectionResult<GpuSnapshot> {
        self.collect()
    }
}
