//! CPU, memory and per-process sampling.

use std::{
    sync::{mpsc, Arc},
    thread,
    time::Instant,
};

use hashbrown::HashMap;
use itertools::Itertools;

use super::{
    calculators::{cpu_percent, CpuTimes},
    error::{CollectionError, CollectionResult},
    filter::should_include,
    poller::Sampler,
    sources::HostSource,
    username_cache::UsernameCache,
    Pid,
};

/// A process as seen in one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub pid: Pid,

    /// CPU usage as a percentage of one core, derived from the change in
    /// cumulative CPU time since the last poll.
    pub cpu_usage_percent: f64,

    /// Memory usage as a percentage of total memory.
    pub mem_usage_percent: f64,

    /// The command name.
    pub command: String,

    /// The owning user. Left empty by the sampler; the consumer fills it in
    /// through a [`UsernameCache`] for the rows it actually shows.
    pub user: Option<Arc<str>>,
}

impl ProcessSample {
    /// Returns the owning user, resolving and remembering it if needed.
    pub fn resolve_user(&mut self, usernames: &UsernameCache) -> Arc<str> {
        self.user
            .get_or_insert_with(|| usernames.get_username(self.pid))
            .clone()
    }
}

/// The result of one CPU/memory poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuMemSnapshot {
    /// Usage per core, indexed by core id.
    pub per_core_usage: Vec<f64>,

    /// Usage over all cores.
    pub total_usage: f64,

    /// Used memory as a percentage.
    pub mem_usage_percent: f64,

    /// Displayable processes.
    pub processes: Vec<ProcessSample>,
}

impl CpuMemSnapshot {
    /// The `n` processes using the most CPU, highest first.
    pub fn top_by_cpu(&self, n: usize) -> Vec<&ProcessSample> {
        self.processes
            .iter()
            .sorted_by(|a, b| b.cpu_usage_percent.total_cmp(&a.cpu_usage_percent))
            .take(n)
            .collect()
    }

    /// The `n` processes using the most memory, highest first.
    pub fn top_by_memory(&self, n: usize) -> Vec<&ProcessSample> {
        self.processes
            .iter()
            .sorted_by(|a, b| b.mem_usage_percent.total_cmp(&a.mem_usage_percent))
            .take(n)
            .collect()
    }

    /// The `n` busiest cores as `(core id, usage)`, busiest first. Ties keep
    /// core order.
    pub fn busiest_cores(&self, n: usize) -> Vec<(usize, f64)> {
        self.per_core_usage
            .iter()
            .copied()
            .enumerate()
            .sorted_by(|(_, a), (_, b)| b.total_cmp(a))
            .take(n)
            .collect()
    }

    /// The command of a process in this snapshot, if it was shown.
    pub fn command_of(&self, pid: Pid) -> Option<&str> {
        self.processes
            .iter()
            .find(|process| process.pid == pid)
            .map(|process| process.command.as_str())
    }
}

/// The cumulative CPU time of a process at the time of a poll.
#[derive(Debug, Clone, Copy)]
struct ProcessTimesRecord {
    cpu_times: CpuTimes,
    collected_at: Instant,
}

/// One fan-out worker's result.
enum Partial {
    PerCore(Vec<f64>),
    Total(f64),
    Memory(f64),
    Processes(Vec<ProcessSample>, HashMap<Pid, ProcessTimesRecord>),
}

const WORKERS: usize = 4;

/// Samples CPU, memory and processes from a [`HostSource`].
///
/// Each poll queries the source from four threads at once. Per-process CPU
/// usage needs the cumulative CPU time from the previous poll, which this
/// keeps between polls; a process not seen last time reports 0%.
#[derive(Debug)]
pub struct CpuMemorySampler<H> {
    host: H,
    process_times: HashMap<Pid, ProcessTimesRecord>,
    last_collection_time: Option<Instant>,
}

impl<H: HostSource> CpuMemorySampler<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            process_times: HashMap::new(),
            last_collection_time: None,
        }
    }

    /// When the last successful poll happened.
    pub fn last_collection_time(&self) -> Option<Instant> {
        self.last_collection_time
    }

    /// The pids whose CPU times are remembered for the next poll.
    pub fn tracked_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.process_times.keys().copied()
    }

    /// Runs one poll. Any failing query fails the whole poll, and leaves the
    /// remembered CPU times untouched.
    pub fn collect(&mut self) -> CollectionResult<CpuMemSnapshot> {
        let now = Instant::now();
        let host = &self.host;
        let prev_times = &self.process_times;

        // The channel can hold every result, so workers never block on send even
        // if we bail early. The scope joins all of them before returning.
        let (snapshot, process_times) = thread::scope(|s| -> CollectionResult<(_, _)> {
            let (sender, receiver) = mpsc::sync_channel::<CollectionResult<Partial>>(WORKERS);

            let tx = sender.clone();
            s.spawn(move || {
                let _ = tx.send(host.per_core_usage().map(Partial::PerCore));
            });

            let tx = sender.clone();
            s.spawn(move || {
                let _ = tx.send(host.total_usage().map(Partial::Total));
            });

            let tx = sender.clone();
            s.spawn(move || {
                let _ = tx.send(host.memory_usage().map(Partial::Memory));
            });

            s.spawn(move || {
                let res = collect_processes(host, prev_times, now);
                let _ = sender.send(res.map(|(samples, times)| Partial::Processes(samples, times)));
            });

            let mut per_core_usage = None;
            let mut total_usage = None;
            let mut mem_usage_percent = None;
            let mut processes = None;

            for _ in 0..WORKERS {
                match receiver.recv() {
                    Ok(Ok(Partial::PerCore(usage))) => per_core_usage = Some(usage),
                    Ok(Ok(Partial::Total(usage))) => total_usage = Some(usage),
                    Ok(Ok(Partial::Memory(usage))) => mem_usage_percent = Some(usage),
                    Ok(Ok(Partial::Processes(samples, times))) => processes = Some((samples, times)),
                    Ok(Err(err)) => return Err(err),
                    Err(_) => return Err(CollectionError::Worker("cpu/memory")),
                }
            }

            let (processes, process_times) =
                processes.ok_or(CollectionError::Worker("processes"))?;

            Ok((
                CpuMemSnapshot {
                    per_core_usage: per_core_usage.ok_or(CollectionError::Worker("per-core"))?,
                    total_usage: total_usage.ok_or(CollectionError::Worker("total"))?,
                    mem_usage_percent: mem_usage_percent
                        .ok_or(CollectionError::Worker("memory"))?,
                    processes,
                },
                process_times,
            ))
        })?;

        self.process_times = process_times;
        self.last_collection_time = Some(now);

        Ok(snapshot)
    }
}

/// Reads every process, recording the CPU times of all of them but only
/// returning samples for displayable ones.
fn collect_processes<H: HostSource>(
    host: &H, prev_times: &HashMap<Pid, ProcessTimesRecord>, now: Instant,
) -> CollectionResult<(Vec<ProcessSample>, HashMap<Pid, ProcessTimesRecord>)> {
    let pids = host.pids()?;
    let mut samples = Vec::with_capacity(pids.len());
    let mut times = HashMap::with_capacity(pids.len());

    for pid in pids {
        let entry = match host.process(pid) {
            Ok(entry) => entry,
            Err(CollectionError::ProcessGone(_)) => continue,
            Err(err) => return Err(err),
        };

        times.insert(
            pid,
            ProcessTimesRecord {
                cpu_times: entry.cpu_times,
                collected_at: now,
            },
        );

        if !should_include(&entry.name) {
            continue;
        }

        let cpu_usage_percent = match prev_times.get(&pid) {
            Some(prev) => cpu_percent(
                entry.cpu_times,
                prev.cpu_times,
                now.saturating_duration_since(prev.collected_at)
                    .as_secs_f64(),
            ),
            None => 0.0,
        };

        samples.push(ProcessSample {
            pid,
            cpu_usage_percent,
            mem_usage_percent: entry.mem_usage_percent,
            command: entry.name,
            user: None,
        });
    }

    Ok((samples, times))
}

impl<H: HostSource + 'static> Sampler for CpuMemorySampler<H> {
    type Snapshot = CpuMemSnapshot;

    fn name(&self) -> &'static str {
        "cpu/memory"
    }

    fn sample(&mut self) -> CollectionResult<CpuMemSnapshot> {
        self.collect()
    }
}
