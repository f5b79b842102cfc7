//! Tests for sampling an accelerator through a fake source.

use std::sync::Arc;

use mim::collection::{
    error::CollectionError,
    gpu::GpuSampler,
    sources::{GpuMemory, GpuProcessMemory, GpuProcessUtilization},
    username_cache::UsernameCache,
};

use crate::util::{FakeAccelerator, FakeIdentity, Reply};

const GIB: u64 = 1 << 30;

fn identity() -> Arc<FakeIdentity> {
    Arc::new(FakeIdentity::new(
        &[(100, 1000), (200, 1000), (300, 1001)],
        &[(1000, "alice"), (1001, "bob")],
    ))
}

fn sampler(source: FakeAccelerator) -> GpuSampler<FakeAccelerator> {
    GpuSampler::new(source, Arc::new(UsernameCache::new(identity())))
}

fn busy_device() -> FakeAccelerator {
    FakeAccelerator {
        utilization: Reply::Ok(73),
        memory: Reply::Ok(GpuMemory {
            used: 4 * GIB,
            total: 16 * GIB,
        }),
        process_utilization: Reply::Ok(vec![
            GpuProcessUtilization {
                pid: 100,
                sm_util: 60,
            },
            GpuProcessUtilization {
                pid: 200,
                sm_util: 5,
            },
        ]),
        graphics: Reply::Ok(vec![GpuProcessMemory {
            pid: 200,
            used_bytes: GIB,
        }]),
        compute: Reply::Ok(vec![GpuProcessMemory {
            pid: 300,
            used_bytes: 2 * GIB,
        }]),
        ..Default::default()
    }
}

#[test]
fn device_readings() {
    let snapshot = sampler(busy_device()).collect().unwrap();

    assert_eq!(snapshot.utilization, 73.0);
    assert_eq!(snapshot.mem_usage_percent, 25.0);
}

#[test]
fn processes_are_merged_by_pid() {
    let snapshot = sampler(busy_device()).collect().unwrap();

    let rows = snapshot
        .processes
        .iter()
        .map(|p| (p.pid, p.sm_util_percent, p.mem_usage_percent, &*p.user))
        .collect::<Vec<_>>();

    assert_eq!(
        rows,
        vec![
            (100, 60.0, 0.0, "alice"),
            (200, 5.0, 6.25, "alice"),
            (300, 0.0, 12.5, "bob"),
        ]
    );
}

#[test]
fn utilization_is_clamped() {
    let snapshot = sampler(FakeAccelerator {
        utilization: Reply::Ok(180),
        process_utilization: Reply::Ok(vec![GpuProcessUtilization {
            pid: 100,
            sm_util: 250,
        }]),
        ..Default::default()
    })
    .collect()
    .unwrap();

    assert_eq!(snapshot.utilization, 100.0);
    assert_eq!(snapshot.processes[0].sm_util_percent, 100.0);
}

#[test]
fn zero_total_memory() {
    let snapshot = sampler(FakeAccelerator {
        graphics: Reply::Ok(vec![GpuProcessMemory {
            pid: 100,
            used_bytes: GIB,
        }]),
        ..Default::default()
    })
    .collect()
    .unwrap();

    assert_eq!(snapshot.mem_usage_percent, 0.0);
    assert_eq!(snapshot.processes[0].mem_usage_percent, 0.0);
}

#[test]
fn not_found_process_lists_are_empty() {
    let snapshot = sampler(FakeAccelerator {
        process_utilization: Reply::NotFound,
        graphics: Reply::NotFound,
        ..busy_device()
    })
    .collect()
    .unwrap();

    let pids = snapshot.processes.iter().map(|p| p.pid).collect::<Vec<_>>();
    assert_eq!(pids, vec![300]);
    assert_eq!(snapshot.utilization, 73.0);
}

#[test]
fn other_failures_fail_the_poll() {
    let sampler_with = |source| sampler(source).collect();

    assert!(sampler_with(FakeAccelerator {
        compute: Reply::Fail,
        ..busy_device()
    })
    .is_err());
    assert!(sampler_with(FakeAccelerator {
        utilization: Reply::Fail,
        ..busy_device()
    })
    .is_err());
    assert!(sampler_with(FakeAccelerator {
        memory: Reply::NotFound,
        ..busy_device()
    })
    .is_err());
}

#[test]
fn no_device() {
    let res = sampler(FakeAccelerator {
        devices: 0,
        ..busy_device()
    })
    .collect();

    assert!(matches!(res, Err(CollectionError::NoDevice)));
}

#[test]
fn unknown_owner() {
    let snapshot = sampler(FakeAccelerator {
        compute: Reply::Ok(vec![GpuProcessMemory {
            pid: 999,
            used_bytes: 0,
        }]),
        ..Default::default()
    })
    .collect()
    .unwrap();

    assert_eq!(&*snapshot.processes[0].user, "?");
}

#[test]
fn top_processes() {
    let snapshot = sampler(busy_device()).collect().unwrap();

    let by_sm = snapshot.top_by_sm(1).iter().map(|p| p.pid).collect::<Vec<_>>();
    assert_eq!(by_sm, vec![100]);

    let by_memory = snapshot
        .top_by_memory(2)
        .iter()
        .map(|p| p.pid)
        .collect::<Vec<_>>();
    assert_eq!(by_memory, vec![300, 200]);
}
