use std::{
    collections::HashSet,
    path::Path,
    process::Command,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use assert_cmd::prelude::*;
use hashbrown::HashMap;
use mim::collection::{
    calculators::CpuTimes,
    error::{CollectionError, CollectionResult},
    sources::{
        AcceleratorSource, GpuMemory, GpuProcessMemory, GpuProcessUtilization, HostSource,
        IdentitySource, ProcessEntry,
    },
    Pid, Uid,
};

/// Returns the [`Command`] of a binary invocation of mim with the given
/// arguments. Config paths are made absolute.
pub fn mim_command(args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("mim").unwrap();

    let mut prev = "";
    for arg in args {
        if prev == "-C" && Path::new(arg).exists() {
            cmd.arg(Path::new(arg).canonicalize().unwrap());
        } else {
            cmd.arg(arg);
        }
        prev = arg;
    }

    cmd
}

/// Like [`mim_command`], but with the empty config file.
pub fn no_cfg_mim_command() -> Command {
    mim_command(&["-C", "./tests/valid_configs/empty_config.toml"])
}

pub fn process(pid: Pid, name: &str, cpu_secs: f64, mem_usage_percent: f64) -> ProcessEntry {
    ProcessEntry {
        pid,
        cpu_times: CpuTimes {
            user: cpu_secs,
            system: 0.0,
        },
        mem_usage_percent,
        name: name.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct HostState {
    pub per_core: Vec<f64>,
    pub total: f64,
    pub memory: f64,
    pub processes: Vec<ProcessEntry>,

    /// Pids that are listed, but gone by the time they are read.
    pub gone: HashSet<Pid>,

    /// Pids that fail to be read for some other reason.
    pub broken: HashSet<Pid>,

    /// The names of queries that should fail.
    pub failing: HashSet<&'static str>,
}

/// A [`HostSource`] whose readings are set by the test.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new(per_core: Vec<f64>, total: f64, memory: f64, processes: Vec<ProcessEntry>) -> Self {
        Self {
            state: Mutex::new(HostState {
                per_core,
                total,
                memory,
                processes,
                ..Default::default()
            }),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut self.state.lock().unwrap());
    }

    fn check(&self, query: &'static str) -> CollectionResult<()> {
        if self.state.lock().unwrap().failing.contains(query) {
            Err(CollectionError::General(anyhow::anyhow!("{query} failed")))
        } else {
            Ok(())
        }
    }
}

impl HostSource for FakeHost {
    fn per_core_usage(&self) -> CollectionResult<Vec<f64>> {
        self.check("per_core")?;
        Ok(self.state.lock().unwrap().per_core.clone())
    }

    fn total_usage(&self) -> CollectionResult<f64> {
        self.check("total")?;
        Ok(self.state.lock().unwrap().total)
    }

    fn memory_usage(&self) -> CollectionResult<f64> {
        self.check("memory")?;
        Ok(self.state.lock().unwrap().memory)
    }

    fn pids(&self) -> CollectionResult<Vec<Pid>> {
        self.check("pids")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .processes
            .iter()
            .map(|p| p.pid)
            .collect())
    }

    fn process(&self, pid: Pid) -> CollectionResult<ProcessEntry> {
        let state = self.state.lock().unwrap();
        if state.gone.contains(&pid) {
            return Err(CollectionError::ProcessGone(pid));
        }
        if state.broken.contains(&pid) {
            return Err("unreadable process entry".into());
        }

        state
            .processes
            .iter()
            .find(|p| p.pid == pid)
            .cloned()
            .ok_or(CollectionError::ProcessGone(pid))
    }
}

/// What a [`FakeAccelerator`] query returns.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    NotFound,
    Fail,
}

impl<T: Clone> Reply<T> {
    fn get(&self) -> CollectionResult<T> {
        match self {
            Reply::Ok(val) => Ok(val.clone()),
            Reply::NotFound => Err(CollectionError::NotFound),
            Reply::Fail => Err(CollectionError::General(anyhow::anyhow!("device error"))),
        }
    }
}

/// An [`AcceleratorSource`] with fixed readings.
#[derive(Debug, Clone)]
pub struct FakeAccelerator {
    pub devices: u32,
    pub utilization: Reply<u32>,
    pub memory: Reply<GpuMemory>,
    pub process_utilization: Reply<Vec<GpuProcessUtilization>>,
    pub graphics: Reply<Vec<GpuProcessMemory>>,
    pub compute: Reply<Vec<GpuProcessMemory>>,
}

impl Default for FakeAccelerator {
    fn default() -> Self {
        Self {
            devices: 1,
            utilization: Reply::Ok(0),
            memory: Reply::Ok(GpuMemory { used: 0, total: 0 }),
            process_utilization: Reply::Ok(vec![]),
            graphics: Reply::Ok(vec![]),
            compute: Reply::Ok(vec![]),
        }
    }
}

impl AcceleratorSource for FakeAccelerator {
    fn device_count(&self) -> CollectionResult<u32> {
        Ok(self.devices)
    }

    fn utilization(&self) -> CollectionResult<u32> {
        self.utilization.get()
    }

    fn memory_info(&self) -> CollectionResult<GpuMemory> {
        self.memory.get()
    }

    fn process_utilization(&self) -> CollectionResult<Vec<GpuProcessUtilization>> {
        self.process_utilization.get()
    }

    fn graphics_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>> {
        self.graphics.get()
    }

    fn compute_processes(&self) -> CollectionResult<Vec<GpuProcessMemory>> {
        self.compute.get()
    }
}

/// An [`IdentitySource`] with fixed users.
#[derive(Debug, Default)]
pub struct FakeIdentity {
    pub uids: HashMap<Pid, Uid>,
    pub names: HashMap<Uid, String>,
    pub lookups: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(uids: &[(Pid, Uid)], names: &[(Uid, &str)]) -> Self {
        Self {
            uids: uids.iter().copied().collect(),
            names: names
                .iter()
                .map(|(uid, name)| (*uid, name.to_string()))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl IdentitySource for FakeIdentity {
    fn uid_of(&self, pid: Pid) -> Option<Uid> {
        self.uids.get(&pid).copied()
    }

    fn username_of(&self, uid: Uid) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.names.get(&uid).cloned()
    }
}
