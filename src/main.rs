//! fleet-dispatch - Ride Dispatch Simulator
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use fleet_dispatch::config::{parse_args, usage, DispatchConfig};
use fleet_dispatch::dispatch::{DispatchStats, Dispatcher, JobQueue};
use fleet_dispatch::error::DispatchError;
use fleet_dispatch::mq::Namespace;
use fleet_dispatch::progress::{print_header, print_summary, DispatchProgress, ProgressReporter};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse and validate; nothing exists yet if this fails
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            if e.is_usage() {
                eprintln!("{}", usage(env!("CARGO_BIN_NAME")));
            }
            return Err(e).context("Invalid arguments");
        }
    };

    // Setup logging
    setup_logging(config.verbose)?;

    if config.show_progress {
        print_header(config.worker_count, config.run_for, config.queue_capacity);
    }

    let namespace = Namespace::global().clone();
    let dispatcher = Dispatcher::new(config.clone(), namespace.clone());

    // Setup signal handler for graceful shutdown
    let shutdown_flag = dispatcher.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.trigger();
    })
    .context("Failed to set signal handler")?;

    // Create progress reporter
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let monitor = if config.show_progress {
        let stats = dispatcher.stats();
        let workers = config.worker_count;
        let namespace = namespace.clone();
        Some(
            thread::Builder::new()
                .name("progress".into())
                .spawn(move || monitor_progress(stats, namespace, workers, stop_rx))
                .context("Failed to start progress reporter")?,
        )
    } else {
        None
    };

    // Run the dispatcher
    let result = dispatcher.run();

    drop(stop_tx);
    if let Some(monitor) = monitor {
        let _ = monitor.join();
    }

    let report = result.context("Dispatch failed")?;

    if config.show_progress {
        print_summary(&report);
    }

    if report.stats.jobs_dropped > 0 {
        info!(dropped = report.stats.jobs_dropped, "Some jobs were dropped on a full queue");
    }

    Ok(())
}

fn load_config() -> Result<DispatchConfig, DispatchError> {
    let args = parse_args(std::env::args_os())?;
    Ok(DispatchConfig::from_args(args)?)
}

/// Refresh the spinner until `stop` disconnects
fn monitor_progress(
    stats: Arc<DispatchStats>,
    namespace: Namespace,
    workers: usize,
    stop: crossbeam_channel::Receiver<()>,
) {
    let reporter = ProgressReporter::new();
    reporter.set_status("Spawning drivers...");
    let start = Instant::now();

    loop {
        match stop.recv_timeout(Duration::from_millis(200)) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let queue_depth = JobQueue::open(&namespace).map(|q| q.len()).unwrap_or(0);
        reporter.update(&DispatchProgress {
            stats: stats.snapshot(),
            queue_depth,
            workers,
            elapsed: start.elapsed(),
        });
    }

    reporter.finish("Dispatch finished");
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("fleet_dispatch=debug,warn")
    } else {
        EnvFilter::new("fleet_dispatch=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(verbose)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
