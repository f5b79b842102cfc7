use std::{future, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use mim::{
    args::Args,
    collection::{
        factory::build_pollers, sources::identity::OsIdentity, CpuMemSnapshot, GpuSnapshot, Pid,
        UsernameCache,
    },
    constants::TOP_PROCESS_COUNT,
    options::{get_pipeline_config, read_config},
    symbols::SymbolAllocator,
    utils::cancellation_token::CancellationToken,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(log_file) = &args.log_file {
        #[cfg(feature = "logging")]
        mim::utils::logging::init_logger(log::LevelFilter::Debug, log_file)
            .context("Unable to set up logging to the given file.")?;

        #[cfg(not(feature = "logging"))]
        eprintln!(
            "mim was built without logging support, ignoring --log_file {}.",
            log_file.display()
        );
    }

    let config = read_config(args.config_location.as_deref())
        .context("Unable to read or parse the config file.")?;
    let pipeline =
        get_pipeline_config(&args, &config).context("Found an issue with the given options.")?;
    log::debug!("Running with {pipeline:?}");

    let usernames = Arc::new(UsernameCache::with_limits(
        Arc::new(OsIdentity::default()),
        pipeline.lookup_timeout,
        pipeline.max_cache_entries,
    ));
    let symbols = SymbolAllocator::new(pipeline.glyphs.clone());

    let pollers = build_pollers(&pipeline, usernames.clone());
    let mut cpu_stream = pollers.cpu_memory_stream;
    let (gpu_poller, mut gpu_stream) = pollers.gpu.unzip();

    // Set termination hook
    let cancellation = Arc::new(CancellationToken::default());
    {
        let cancellation = cancellation.clone();
        ctrlc::set_handler(move || cancellation.cancel())
            .context("Unable to set the termination hook.")?;
    }

    pollers
        .cpu_memory
        .start()
        .context("Unable to start the CPU/memory poller.")?;
    if let Some(gpu) = &gpu_poller {
        gpu.start().context("Unable to start the GPU poller.")?;
    }

    let mut last_cpu_snapshot: Option<CpuMemSnapshot> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            snapshot = cpu_stream.recv() => {
                let Some(mut snapshot) = snapshot else {
                    log::warn!("The CPU/memory stream closed unexpectedly.");
                    break;
                };

                println!("{}", cpu_summary(&mut snapshot, &usernames, &symbols));
                usernames.clear();
                last_cpu_snapshot = Some(snapshot);
            }
            snapshot = next_gpu_snapshot(&mut gpu_stream) => {
                match snapshot {
                    Some(snapshot) => {
                        println!("{}", gpu_summary(&snapshot, last_cpu_snapshot.as_ref(), &symbols));
                    }
                    None => {
                        log::warn!("The GPU stream closed, continuing without it.");
                        gpu_stream = None;
                    }
                }
            }
        }
    }

    pollers.cpu_memory.stop();
    if let Some(gpu) = &gpu_poller {
        gpu.stop();
    }

    Ok(())
}

/// Waits for the next GPU snapshot, or forever if there is no GPU poller.
async fn next_gpu_snapshot(stream: &mut Option<mpsc::Receiver<GpuSnapshot>>) -> Option<GpuSnapshot> {
    match stream {
        Some(stream) => stream.recv().await,
        None => future::pending().await,
    }
}

fn glyph(symbols: &SymbolAllocator, pid: Pid) -> char {
    symbols.access_pid(pid).map_or(' ', |(glyph, _)| glyph)
}

fn cpu_summary(
    snapshot: &mut CpuMemSnapshot, usernames: &UsernameCache, symbols: &SymbolAllocator,
) -> String {
    let top = snapshot
        .top_by_cpu(TOP_PROCESS_COUNT)
        .iter()
        .map(|process| process.pid)
        .collect::<Vec<_>>();

    // Only resolve owners for the rows that are shown.
    for process in snapshot
        .processes
        .iter_mut()
        .filter(|process| top.contains(&process.pid))
    {
        process.resolve_user(usernames);
    }

    let cores = snapshot
        .busiest_cores(3)
        .into_iter()
        .map(|(core, usage)| format!("{core}:{usage:.0}%"))
        .join(" ");

    let processes = snapshot
        .top_by_cpu(TOP_PROCESS_COUNT)
        .into_iter()
        .map(|process| {
            format!(
                "{} {} {} {} {:.1}%",
                glyph(symbols, process.pid),
                process.pid,
                process.user.as_deref().unwrap_or("?"),
                process.command,
                process.cpu_usage_percent
            )
        })
        .join(", ");

    format!(
        "cpu {:.1}% mem {:.1}% | cores {cores} | {processes}",
        snapshot.total_usage, snapshot.mem_usage_percent
    )
}

fn gpu_summary(
    snapshot: &GpuSnapshot, cpu_snapshot: Option<&CpuMemSnapshot>, symbols: &SymbolAllocator,
) -> String {
    let processes = snapshot
        .top_by_sm(TOP_PROCESS_COUNT)
        .into_iter()
        .map(|process| {
            let command = cpu_snapshot
                .and_then(|cpu| cpu.command_of(process.pid))
                .unwrap_or("-");

            format!(
                "{} {} {} {} sm {:.0}% mem {:.1}%",
                glyph(symbols, process.pid),
                process.pid,
                process.user,
                command,
                process.sm_util_percent,
                process.mem_usage_percent
            )
        })
        .join(", ");

    format!(
        "gpu {:.0}% mem {:.1}% | {processes}",
        snapshot.utilization, snapshot.mem_usage_percent
    )
}
