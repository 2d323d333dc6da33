//! Dispatcher - owns the job queue and the driver roster
//!
//! The dispatcher is responsible for:
//! - Creating the job queue and one result channel per driver
//! - Spawning the drivers and their collectors
//! - Producing jobs until the shutdown flag is set
//! - Sending one sentinel per driver and joining every driver
//! - Removing every queue it created
//!
//! Lifecycle: `Running -> Draining -> Terminated`. Any error other than
//! would-block is fatal: the dispatcher stops every driver it already
//! started, removes its queues and returns the error.

use crate::config::DispatchConfig;
use crate::dispatch::collector::{Collector, CollectorSummary, LogSink, ReportSink};
use crate::dispatch::queue::{JobQueue, ResultChannel, JOB_QUEUE_NAME};
use crate::dispatch::shutdown::{ShutdownFlag, ShutdownTimer};
use crate::dispatch::source::{JobSource, RandomJobSource};
use crate::dispatch::spawner::{Spawner, ThreadSpawner};
use crate::dispatch::worker::{Worker, WorkerSummary};
use crate::error::{DispatchError, IpcResult, ProcessError, Result};
use crate::mq::{Namespace, SendOutcome, WorkerId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// System state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Producing jobs
    Running,

    /// Sentinels sent, waiting for drivers to exit
    Draining,

    /// Queues removed
    Terminated,
}

/// Live counters shared with collectors and progress reporting
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Jobs produced
    pub jobs_generated: AtomicU64,

    /// Jobs the queue accepted
    pub jobs_accepted: AtomicU64,

    /// Jobs dropped because the queue was full
    pub jobs_dropped: AtomicU64,

    /// Sentinels sent
    pub sentinels_sent: AtomicU64,

    /// Reports drained by collectors
    pub reports_collected: AtomicU64,

    /// Sum of drained distances
    pub distance_collected: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn record_report(&self, distance: u32) {
        self.reports_collected.fetch_add(1, Ordering::Relaxed);
        self.distance_collected
            .fetch_add(u64::from(distance), Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            jobs_generated: self.jobs_generated.load(Ordering::Relaxed),
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_dropped: self.jobs_dropped.load(Ordering::Relaxed),
            sentinels_sent: self.sentinels_sent.load(Ordering::Relaxed),
            reports_collected: self.reports_collected.load(Ordering::Relaxed),
            distance_collected: self.distance_collected.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub jobs_generated: u64,
    pub jobs_accepted: u64,
    pub jobs_dropped: u64,
    pub sentinels_sent: u64,
    pub reports_collected: u64,
    pub distance_collected: u64,
}

/// Result of a completed run
#[derive(Debug)]
pub struct DispatchReport {
    /// Final counters
    pub stats: StatsSnapshot,

    /// One entry per driver, in id order
    pub workers: Vec<WorkerSummary>,

    /// One entry per result channel, in id order
    pub collectors: Vec<CollectorSummary>,

    /// Queues removed during teardown
    pub teardown: TeardownReport,

    /// Time taken for the run
    pub duration: Duration,
}

/// Outcome of removing named queues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Names that were linked and are now removed
    pub removed: Vec<String>,

    /// Names that were already gone
    pub already_absent: Vec<String>,
}

/// Remove `names` from `namespace`
///
/// Names that are already gone are recorded, not treated as errors, so the
/// call can be repeated safely.
pub fn remove_channels<S: AsRef<str>>(namespace: &Namespace, names: &[S]) -> TeardownReport {
    let mut report = TeardownReport::default();

    for name in names {
        let name = name.as_ref();
        match namespace.unlink(name) {
            Ok(()) => report.removed.push(name.to_string()),
            Err(e) if e.is_not_found() => {
                debug!(queue = name, "Queue already absent");
                report.already_absent.push(name.to_string());
            }
            Err(e) => {
                warn!(queue = name, error = %e, "Failed to remove queue");
            }
        }
    }

    report
}

/// Pause between sentinel attempts while the urgent class is full
const SENTINEL_RETRY: Duration = Duration::from_millis(1);

/// The dispatcher's record of one driver
struct WorkerHandle {
    worker_id: WorkerId,
    channel_name: String,
    worker: Option<Worker>,
    collector: Option<Collector>,

    /// A sentinel has been queued on this driver's behalf
    signalled: bool,
}

impl WorkerHandle {
    /// Spawned, not yet joined, and still running
    fn is_live(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

/// Coordinates producer, drivers and collectors
pub struct Dispatcher {
    /// Configuration
    config: Arc<DispatchConfig>,

    /// Where the queues live
    namespace: Namespace,

    /// Producer side of the job queue
    job_queue: Option<JobQueue>,

    /// One entry per spawned driver
    roster: Vec<WorkerHandle>,

    /// Names of every queue this dispatcher created
    created: Vec<String>,

    /// Shutdown signal
    shutdown: ShutdownFlag,

    /// Counters
    stats: Arc<DispatchStats>,

    spawner: Box<dyn Spawner>,
    source: Box<dyn JobSource>,
    sink: Arc<dyn ReportSink>,

    state: DispatchState,
}

impl Dispatcher {
    /// Create a dispatcher with random jobs, thread drivers and a logging sink
    pub fn new(config: DispatchConfig, namespace: Namespace) -> Self {
        let source = RandomJobSource::from_config(&config);

        Self {
            config: Arc::new(config),
            namespace,
            job_queue: None,
            roster: Vec::new(),
            created: Vec::new(),
            shutdown: ShutdownFlag::new(),
            stats: Arc::new(DispatchStats::default()),
            spawner: Box::new(ThreadSpawner),
            source: Box::new(source),
            sink: Arc::new(LogSink),
            state: DispatchState::Running,
        }
    }

    /// Replace how drivers are started
    pub fn with_spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Box::new(spawner);
        self
    }

    /// Replace where jobs come from
    pub fn with_source(mut self, source: impl JobSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Replace where collected reports go
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Get a clone of the shutdown flag (for timers and signal handlers)
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Get the live counters
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Run until shutdown, then drain and tear down
    pub fn run(mut self) -> Result<DispatchReport> {
        let start_time = Instant::now();

        info!(
            workers = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            run_for_secs = self.config.run_for.map(|d| d.as_secs_f64()),
            "Starting dispatch"
        );

        let timer = match self.config.run_for {
            Some(duration) => Some(
                ShutdownTimer::arm(self.shutdown.clone(), duration).map_err(ProcessError::Timer)?,
            ),
            None => None,
        };

        let outcome = self.execute();
        if let Some(timer) = timer {
            timer.disarm();
        }

        let (workers, collectors) = match outcome {
            Ok(summaries) => summaries,
            Err(e) => {
                error!(error = %e, "Fatal error, stopping all drivers");
                self.abort();
                return Err(e);
            }
        };

        let teardown = self.teardown();
        let duration = start_time.elapsed();
        let stats = self.stats.snapshot();

        info!(
            generated = stats.jobs_generated,
            dropped = stats.jobs_dropped,
            reports = stats.reports_collected,
            distance = stats.distance_collected,
            duration_secs = duration.as_secs(),
            "Dispatch completed"
        );

        Ok(DispatchReport {
            stats,
            workers,
            collectors,
            teardown,
            duration,
        })
    }

    fn execute(&mut self) -> Result<(Vec<WorkerSummary>, Vec<CollectorSummary>)> {
        let job_queue = JobQueue::create(&self.namespace, self.config.queue_capacity)?;
        self.created.push(job_queue.name().to_string());
        self.job_queue = Some(job_queue);

        self.spawn_pool()?;
        self.produce()?;
        self.drain()
    }

    /// Create each result channel, then its driver and collector
    fn spawn_pool(&mut self) -> Result<()> {
        for n in 1..=self.config.worker_count {
            let worker_id = WorkerId(n as i32);

            let channel = ResultChannel::open_or_create(
                &self.namespace,
                worker_id,
                self.config.result_capacity,
            )?;
            self.created.push(channel.name().to_string());

            let mut handle = WorkerHandle {
                worker_id,
                channel_name: channel.name().to_string(),
                worker: None,
                collector: None,
                signalled: false,
            };

            // Reader side first, so no report can sit unobserved
            handle.collector = Some(Collector::spawn(
                channel.clone(),
                Arc::clone(&self.sink),
                Arc::clone(&self.stats),
            )?);

            let spawned: Result<Worker> = JobQueue::open(&self.namespace)
                .map_err(DispatchError::from)
                .and_then(|jobs| {
                    Worker::spawn(worker_id, jobs, channel, self.spawner.as_ref())
                        .map_err(DispatchError::from)
                });

            match spawned {
                Ok(worker) => {
                    handle.worker = Some(worker);
                    self.roster.push(handle);
                }
                Err(e) => {
                    self.roster.push(handle);
                    return Err(e);
                }
            }

            debug!(worker = %worker_id, "Driver spawned");
        }

        info!(count = self.roster.len(), "Drivers spawned");
        Ok(())
    }

    /// Producer loop: runs while the shutdown flag is clear
    fn produce(&mut self) -> Result<()> {
        let Some(queue) = self.job_queue.clone() else {
            return Ok(());
        };

        while !self.shutdown.is_triggered() {
            thread::sleep(self.source.next_interval());

            if self.shutdown.is_triggered() {
                break;
            }
            self.check_pool()?;

            let job = self.source.next_job();
            self.stats.jobs_generated.fetch_add(1, Ordering::Relaxed);

            match queue.try_send(&job)? {
                SendOutcome::Accepted => {
                    self.stats.jobs_accepted.fetch_add(1, Ordering::Relaxed);
                    trace!(job = %job, depth = queue.len(), "Job queued");
                }
                SendOutcome::WouldBlock => {
                    self.stats.jobs_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(job = %job, "Queue full. Dropping job");
                }
            }
        }

        info!("Shutdown signal received");
        Ok(())
    }

    /// Fail fast if a driver or collector ended while running
    fn check_pool(&self) -> Result<()> {
        for handle in &self.roster {
            if handle.worker.as_ref().map_or(false, Worker::is_finished) {
                return Err(ProcessError::UnexpectedExit {
                    role: "driver",
                    id: handle.worker_id.0,
                }
                .into());
            }
            if handle.collector.as_ref().map_or(false, Collector::is_finished) {
                return Err(ProcessError::UnexpectedExit {
                    role: "collector",
                    id: handle.worker_id.0,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Send one sentinel per driver, join drivers, then stop collectors
    fn drain(&mut self) -> Result<(Vec<WorkerSummary>, Vec<CollectorSummary>)> {
        self.state = DispatchState::Draining;

        let sent = self.broadcast_sentinels()?;
        info!(sentinels = sent, "Sentinels sent");

        let mut workers = Vec::with_capacity(self.roster.len());
        for handle in &mut self.roster {
            if let Some(worker) = handle.worker.take() {
                workers.push(worker.join()?);
            }
        }

        let mut collectors = Vec::with_capacity(self.roster.len());
        for handle in &mut self.roster {
            if let Some(collector) = handle.collector.take() {
                collectors.push(collector.finish()?);
            }
        }

        info!(count = workers.len(), "All drivers exited");
        Ok((workers, collectors))
    }

    /// Queue one sentinel for every spawned driver not yet signalled
    ///
    /// The urgent class holds only `queue_capacity` records, so with more
    /// drivers than that a full class is retried until running drivers
    /// make room. Retrying stops once no driver is left running.
    fn broadcast_sentinels(&mut self) -> IpcResult<usize> {
        let Some(queue) = self.job_queue.clone() else {
            return Ok(0);
        };

        let mut sent = 0;
        for i in 0..self.roster.len() {
            // Sentinels are not addressed; skipping an exited driver here could
            // starve one that is still running.
            if self.roster[i].signalled || self.roster[i].worker.is_none() {
                continue;
            }

            loop {
                match queue.try_send_sentinel()? {
                    SendOutcome::Accepted => break,
                    SendOutcome::WouldBlock => {
                        if !self.roster.iter().any(WorkerHandle::is_live) {
                            warn!(sent, "No driver left to take sentinels");
                            return Ok(sent);
                        }
                        thread::sleep(SENTINEL_RETRY);
                    }
                }
            }

            self.roster[i].signalled = true;
            self.stats.sentinels_sent.fetch_add(1, Ordering::Relaxed);
            sent += 1;
        }

        Ok(sent)
    }

    /// Best-effort stop of everything already started, then teardown
    fn abort(&mut self) {
        self.state = DispatchState::Draining;

        match self.broadcast_sentinels() {
            Ok(sent) => debug!(sentinels = sent, "Sentinels sent while aborting"),
            Err(e) => warn!(error = %e, "Failed to send sentinel while aborting"),
        }

        for handle in &mut self.roster {
            if let Some(worker) = handle.worker.take() {
                if let Err(e) = worker.join() {
                    warn!(worker = %handle.worker_id, error = %e, "Driver failed to stop cleanly");
                }
            }
        }
        for handle in &mut self.roster {
            if let Some(collector) = handle.collector.take() {
                if let Err(e) = collector.finish() {
                    warn!(worker = %handle.worker_id, error = %e, "Collector failed to stop cleanly");
                }
            }
        }

        self.teardown();
    }

    /// Remove every queue this dispatcher created
    fn teardown(&mut self) -> TeardownReport {
        self.job_queue = None;

        let mut names: Vec<String> = self
            .roster
            .drain(..)
            .map(|h| h.channel_name)
            .collect();
        names.extend(self.created.drain(..));
        names.sort();
        names.dedup();

        let report = remove_channels(&self.namespace, &names);
        self.state = DispatchState::Terminated;

        debug!(
            removed = report.removed.len(),
            absent = report.already_absent.len(),
            job_queue = JOB_QUEUE_NAME,
            "Teardown complete"
        );
        report
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.state != DispatchState::Terminated && !self.created.is_empty() {
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_channels_is_idempotent() {
        let ns = Namespace::new();
        JobQueue::create(&ns, 2).unwrap();
        ResultChannel::open_or_create(&ns, WorkerId(1), 2).unwrap();

        let names = [JOB_QUEUE_NAME.to_string(), ResultChannel::name_for(WorkerId(1))];
        let first = remove_channels(&ns, &names);
        assert_eq!(first.removed.len(), 2);
        assert!(first.already_absent.is_empty());
        assert!(ns.is_empty());

        let second = remove_channels(&ns, &names);
        assert!(second.removed.is_empty());
        assert_eq!(second.already_absent.len(), 2);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = DispatchStats::default();
        stats.jobs_generated.fetch_add(3, Ordering::Relaxed);
        stats.record_report(7);
        stats.record_report(5);

        let snap = stats.snapshot();
        assert_eq!(snap.jobs_generated, 3);
        assert_eq!(snap.reports_collected, 2);
        assert_eq!(snap.distance_collected, 12);
    }

    #[test]
    fn test_new_dispatcher_is_running() {
        let dispatcher = Dispatcher::new(DispatchConfig::new(2), Namespace::new());
        assert_eq!(dispatcher.state(), DispatchState::Running);
        assert!(!dispatcher.shutdown_flag().is_triggered());
    }
}
