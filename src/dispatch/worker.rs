//! Driver logic
//!
//! Each driver:
//! - Blocks on the shared job queue
//! - Simulates the drive by sleeping one millisecond per distance unit
//!   (pickup leg plus trip)
//! - Posts a completion report to its own result channel
//! - Exits when it receives the sentinel
//!
//! A driver holds nothing but its two queue handles; it never sees the
//! dispatcher's roster or another driver's channel.

use crate::dispatch::queue::{Envelope, JobQueue, ResultChannel};
use crate::dispatch::spawner::Spawner;
use crate::error::{DispatchError, IpcError, IpcResult, ProcessError};
use crate::mq::{CompletionReport, Job, Position, WorkerId};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace};

/// What a driver's unit of execution returns
pub type WorkerOutcome = Result<WorkerSummary, IpcError>;

/// Totals a driver hands back when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: WorkerId,

    /// Jobs driven and reported
    pub jobs_completed: u64,

    /// Sum of reported trip distances
    pub distance_reported: u64,

    /// Sum of pickup and trip distances actually driven
    pub distance_driven: u64,
}

/// Timing of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrivePlan {
    /// From the previous drop-off to this job's start
    pub pickup: u32,

    /// From this job's start to its finish
    pub trip: u32,
}

impl DrivePlan {
    pub fn new(from: Position, job: &Job) -> Self {
        Self {
            pickup: from.manhattan(&job.start),
            trip: job.trip_distance(),
        }
    }

    /// Distance units driven in total
    pub fn total(&self) -> u64 {
        u64::from(self.pickup) + u64::from(self.trip)
    }

    /// Simulated drive time: one millisecond per distance unit, unscaled
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.total())
    }
}

/// State owned by one driver's unit of execution
pub struct Driver {
    id: WorkerId,
    position: Position,
    jobs: JobQueue,
    results: ResultChannel,
    summary: WorkerSummary,
}

impl Driver {
    pub fn new(id: WorkerId, jobs: JobQueue, results: ResultChannel) -> Self {
        Self {
            id,
            position: Position::ORIGIN,
            jobs,
            results,
            summary: WorkerSummary {
                worker_id: id,
                ..Default::default()
            },
        }
    }

    /// Last drop-off location, the origin before the first job
    pub fn position(&self) -> Position {
        self.position
    }

    /// Process jobs until the sentinel arrives
    pub fn run(mut self) -> WorkerOutcome {
        info!(worker = %self.id, channel = self.results.name(), "Driver starting");

        loop {
            match self.jobs.receive()? {
                Envelope::Sentinel => break,
                Envelope::Job(job) => {
                    self.drive(&job)?;
                }
            }
        }

        info!(
            worker = %self.id,
            jobs = self.summary.jobs_completed,
            distance = self.summary.distance_reported,
            "Driver received sentinel, exiting"
        );
        Ok(self.summary)
    }

    /// Drive one job and report it
    ///
    /// The pickup leg counts towards the drive time but only the trip
    /// distance is reported.
    pub fn drive(&mut self, job: &Job) -> IpcResult<CompletionReport> {
        let plan = DrivePlan::new(self.position, job);
        debug!(
            worker = %self.id,
            job = %job,
            pickup = plan.pickup,
            trip = plan.trip,
            "Read task"
        );

        thread::sleep(plan.duration());

        let report = CompletionReport::new(self.id, plan.trip);
        self.results.post(&report)?;
        trace!(worker = %self.id, distance = report.distance, "Report posted");

        self.position = job.finish;
        self.summary.jobs_completed += 1;
        self.summary.distance_reported += u64::from(plan.trip);
        self.summary.distance_driven += plan.total();
        Ok(report)
    }
}

/// The dispatcher's handle to a running driver
pub struct Worker {
    id: WorkerId,
    handle: Option<JoinHandle<WorkerOutcome>>,
}

impl Worker {
    /// Start a driver on its own unit of execution
    ///
    /// The driver receives its own handles only; `results` must already
    /// exist so the channel is in place before the driver can post.
    pub fn spawn(
        id: WorkerId,
        jobs: JobQueue,
        results: ResultChannel,
        spawner: &dyn Spawner,
    ) -> Result<Self, ProcessError> {
        let driver = Driver::new(id, jobs, results);

        let handle = spawner
            .spawn(format!("driver-{}", id), Box::new(move || driver.run()))
            .map_err(|e| ProcessError::SpawnFailed {
                role: "driver",
                id: id.0,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Whether the driver's unit of execution has ended
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the driver to exit
    pub fn join(mut self) -> Result<WorkerSummary, DispatchError> {
        let Some(handle) = self.handle.take() else {
            return Ok(WorkerSummary {
                worker_id: self.id,
                ..Default::default()
            });
        };

        match handle.join() {
            Ok(outcome) => outcome.map_err(DispatchError::from),
            Err(_) => Err(ProcessError::Panicked {
                role: "driver",
                id: self.id.0,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::spawner::ThreadSpawner;
    use crate::mq::Namespace;

    #[test]
    fn test_drive_plan() {
        let job = Job::new(Position::new(0, 0), Position::new(3, 4));
        let plan = DrivePlan::new(Position::ORIGIN, &job);
        assert_eq!(plan.pickup, 0);
        assert_eq!(plan.trip, 7);
        assert_eq!(plan.duration(), Duration::from_millis(7));

        let plan = DrivePlan::new(Position::new(-2, 1), &job);
        assert_eq!(plan.pickup, 3);
        assert_eq!(plan.total(), 10);
    }

    #[test]
    fn test_driver_reports_trip_and_moves() {
        let ns = Namespace::new();
        let jobs = JobQueue::create(&ns, 4).unwrap();
        let results = ResultChannel::open_or_create(&ns, WorkerId(1), 4).unwrap();
        let mut driver = Driver::new(WorkerId(1), jobs, results.clone());

        let first = Job::new(Position::new(2, 0), Position::new(2, 3));
        let report = driver.drive(&first).unwrap();
        assert_eq!(report, CompletionReport::new(WorkerId(1), 3));
        assert_eq!(driver.position(), Position::new(2, 3));

        // Second pickup is measured from the first drop-off
        let second = Job::new(Position::new(0, 3), Position::new(0, 0));
        driver.drive(&second).unwrap();
        assert_eq!(driver.summary.jobs_completed, 2);
        assert_eq!(driver.summary.distance_reported, 6);
        assert_eq!(driver.summary.distance_driven, 2 + 3 + 2 + 3);

        assert_eq!(results.try_take().unwrap().unwrap().distance, 3);
        assert_eq!(results.try_take().unwrap().unwrap().distance, 3);
    }

    #[test]
    fn test_worker_exits_on_sentinel() {
        let ns = Namespace::new();
        let jobs = JobQueue::create(&ns, 4).unwrap();
        let results = ResultChannel::open_or_create(&ns, WorkerId(5), 4).unwrap();

        let worker = Worker::spawn(
            WorkerId(5),
            JobQueue::open(&ns).unwrap(),
            results.clone(),
            &ThreadSpawner,
        )
        .unwrap();

        jobs.try_send(&Job::new(Position::new(0, 0), Position::new(1, 1)))
            .unwrap();
        // Let the driver take the job before the sentinel overtakes it
        while !jobs.is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        jobs.send_sentinel().unwrap();

        let summary = worker.join().unwrap();
        assert_eq!(summary.worker_id, WorkerId(5));
        assert_eq!(summary.jobs_completed, 1);
        assert_eq!(results.try_take().unwrap().unwrap().distance, 2);
    }
}
