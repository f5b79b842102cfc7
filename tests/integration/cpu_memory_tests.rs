//! Tests for sampling the host through a fake source.

use std::{sync::Arc, thread, time::Duration};

use itertools::Itertools;
use mim::collection::{
    cpu_memory::CpuMemorySampler, error::CollectionError, username_cache::UsernameCache,
};

use crate::util::{process, FakeHost, FakeIdentity};

fn host() -> FakeHost {
    FakeHost::new(
        vec![10.0, 80.0],
        45.0,
        62.5,
        vec![
            process(1, "init", 1.0, 0.5),
            process(2, "[kthreadd]", 3.0, 0.0),
            process(3, "", 2.0, 0.0),
            process(40, "postgres", 10.0, 12.0),
        ],
    )
}

fn sampler() -> CpuMemorySampler<Arc<FakeHost>> {
    CpuMemorySampler::new(Arc::new(host()))
}

#[test]
fn aggregates_are_passed_through() {
    let mut sampler = sampler();
    let snapshot = sampler.collect().unwrap();

    assert_eq!(snapshot.per_core_usage, vec![10.0, 80.0]);
    assert_eq!(snapshot.total_usage, 45.0);
    assert_eq!(snapshot.mem_usage_percent, 62.5);
}

#[test]
fn first_poll_reports_zero_cpu() {
    let mut sampler = sampler();
    let snapshot = sampler.collect().unwrap();

    assert!(snapshot.processes.iter().all(|p| p.cpu_usage_percent == 0.0));
    assert_eq!(snapshot.processes.len(), 2);
}

#[test]
fn filtered_processes_are_still_tracked() {
    let mut sampler = sampler();
    let snapshot = sampler.collect().unwrap();

    let shown = snapshot.processes.iter().map(|p| p.pid).sorted().collect_vec();
    assert_eq!(shown, vec![1, 40]);

    let tracked = sampler.tracked_pids().sorted().collect_vec();
    assert_eq!(tracked, vec![1, 2, 3, 40]);
}

#[test]
fn cpu_usage_from_time_deltas() {
    let host = Arc::new(host());
    let mut sampler = CpuMemorySampler::new(host.clone());
    sampler.collect().unwrap();

    let wait = Duration::from_millis(100);
    thread::sleep(wait);
    host.update(|state| {
        for p in &mut state.processes {
            if p.pid == 40 {
                p.cpu_times.user += 0.05;
            }
        }
    });

    let snapshot = sampler.collect().unwrap();
    let postgres = snapshot.processes.iter().find(|p| p.pid == 40).unwrap();
    let init = snapshot.processes.iter().find(|p| p.pid == 1).unwrap();

    // 0.05s of CPU over at least 0.1s of wall time.
    assert!(postgres.cpu_usage_percent > 0.0);
    assert!(postgres.cpu_usage_percent <= 0.05 / wait.as_secs_f64() * 100.0 + 1e-9);
    assert_eq!(init.cpu_usage_percent, 0.0);
}

#[test]
fn exited_processes_are_forgotten() {
    let host = Arc::new(host());
    let mut sampler = CpuMemorySampler::new(host.clone());
    sampler.collect().unwrap();

    host.update(|state| state.processes.retain(|p| p.pid != 40));
    sampler.collect().unwrap();

    let tracked = sampler.tracked_pids().sorted().collect_vec();
    assert_eq!(tracked, vec![1, 2, 3]);
}

#[test]
fn new_processes_start_at_zero() {
    let host = Arc::new(host());
    let mut sampler = CpuMemorySampler::new(host.clone());
    sampler.collect().unwrap();

    host.update(|state| state.processes.push(process(99, "cargo", 500.0, 3.0)));
    let snapshot = sampler.collect().unwrap();

    let cargo = snapshot.processes.iter().find(|p| p.pid == 99).unwrap();
    assert_eq!(cargo.cpu_usage_percent, 0.0);
    assert_eq!(cargo.mem_usage_percent, 3.0);
    assert_eq!(cargo.command, "cargo");
    assert!(cargo.user.is_none());
}

#[test]
fn vanished_process_is_skipped() {
    let host = Arc::new(host());
    host.update(|state| {
        state.gone.insert(40);
    });
    let mut sampler = CpuMemorySampler::new(host);

    let snapshot = sampler.collect().unwrap();
    assert_eq!(snapshot.processes.iter().map(|p| p.pid).collect_vec(), vec![1]);
    assert!(!sampler.tracked_pids().contains(&40));
}

#[test]
fn other_process_errors_fail_the_poll() {
    let host = Arc::new(host());
    let mut sampler = CpuMemorySampler::new(host.clone());
    sampler.collect().unwrap();
    let last = sampler.last_collection_time();

    host.update(|state| {
        state.broken.insert(1);
    });

    let err = sampler.collect().unwrap_err();
    assert!(matches!(err, CollectionError::General(_)));
    assert_eq!(err.to_string(), "unreadable process entry");
    assert_eq!(sampler.last_collection_time(), last);
}

#[test]
fn any_failing_query_fails_the_poll() {
    for query in ["per_core", "total", "memory", "pids"] {
        let host = Arc::new(host());
        let mut sampler = CpuMemorySampler::new(host.clone());
        sampler.collect().unwrap();
        let tracked = sampler.tracked_pids().sorted().collect_vec();

        host.update(|state| {
            state.failing.insert(query);
            state.processes.push(process(500, "new", 0.0, 0.0));
        });

        assert!(sampler.collect().is_err(), "{query} failing should fail the poll");
        assert_eq!(sampler.tracked_pids().sorted().collect_vec(), tracked);

        // And it recovers once the query works again.
        host.update(|state| {
            state.failing.clear();
        });
        assert!(sampler.collect().is_ok());
    }
}

#[test]
fn users_resolve_lazily() {
    let identity = Arc::new(FakeIdentity::new(&[(1, 0), (40, 70)], &[(0, "root"), (70, "postgres")]));
    let usernames = UsernameCache::new(identity.clone());

    let mut sampler = sampler();
    let mut snapshot = sampler.collect().unwrap();
    assert_eq!(identity.lookups(), 0);

    let postgres = snapshot.processes.iter_mut().find(|p| p.pid == 40).unwrap();
    assert_eq!(&*postgres.resolve_user(&usernames), "postgres");
    assert_eq!(&*postgres.resolve_user(&usernames), "postgres");
    assert_eq!(postgres.user.as_deref(), Some("postgres"));
    assert_eq!(identity.lookups(), 1);
}
