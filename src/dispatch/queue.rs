//! Typed queues on top of the named message-queue substrate
//!
//! - [`JobQueue`]: the single shared queue the dispatcher fills with jobs and
//!   every driver drains. Ordinary jobs travel on the normal class; the
//!   termination sentinel travels on the urgent class.
//! - [`ResultChannel`]: one private queue per driver carrying its
//!   completion reports back to the dispatcher.

use crate::error::{IpcError, IpcResult, ResourceError};
use crate::mq::{
    CompletionReport, Job, MessageQueue, Namespace, Priority, QueueAttributes, SendOutcome,
    WorkerId, JOB_RECORD_SIZE, REPORT_RECORD_SIZE,
};
use crossbeam_channel::Receiver;
use tracing::debug;

/// Well-known name of the shared job queue
pub const JOB_QUEUE_NAME: &str = "/fleet_jobs";

/// Prefix of every result channel name; the worker id follows it
pub const RESULT_CHANNEL_PREFIX: &str = "/fleet_results_";

/// What a driver pulled off the job queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// An ordinary job
    Job(Job),

    /// Instruction to stop
    Sentinel,
}

/// Handle to the shared job queue
#[derive(Debug, Clone)]
pub struct JobQueue {
    queue: MessageQueue,
}

impl JobQueue {
    /// Create the job queue with `capacity` slots
    ///
    /// A stale queue left under the well-known name is unlinked first, so a
    /// fresh run never inherits old jobs.
    pub fn create(namespace: &Namespace, capacity: usize) -> Result<Self, ResourceError> {
        match namespace.unlink(JOB_QUEUE_NAME) {
            Ok(()) => debug!(queue = JOB_QUEUE_NAME, "Removed stale job queue"),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let queue = namespace.create(
            JOB_QUEUE_NAME,
            QueueAttributes::new(capacity, JOB_RECORD_SIZE),
        )?;
        Ok(Self { queue })
    }

    /// Open the existing job queue by its well-known name
    pub fn open(namespace: &Namespace) -> Result<Self, ResourceError> {
        Ok(Self {
            queue: namespace.open(JOB_QUEUE_NAME)?,
        })
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    pub fn capacity(&self) -> usize {
        self.queue.attributes().capacity
    }

    /// Records currently pending
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Offer a job without blocking
    ///
    /// Returns [`SendOutcome::WouldBlock`] when `capacity` jobs are already
    /// pending; the job is not queued and nothing already queued is lost.
    pub fn try_send(&self, job: &Job) -> IpcResult<SendOutcome> {
        self.queue.try_send(&job.encode(), Priority::Normal)
    }

    /// Queue one sentinel on the urgent class, blocking while it is full
    pub fn send_sentinel(&self) -> IpcResult<()> {
        self.queue.send(&Job::default().encode(), Priority::Urgent)
    }

    /// Queue one sentinel without blocking
    pub fn try_send_sentinel(&self) -> IpcResult<SendOutcome> {
        self.queue.try_send(&Job::default().encode(), Priority::Urgent)
    }

    /// Take the next envelope, blocking until one arrives
    ///
    /// The sentinel is recognised by its delivery class only, never by the
    /// record contents.
    pub fn receive(&self) -> IpcResult<Envelope> {
        let delivery = self.queue.receive()?;
        match delivery.priority {
            Priority::Urgent => Ok(Envelope::Sentinel),
            Priority::Normal => Job::decode(&delivery.record)
                .map(Envelope::Job)
                .map_err(|source| IpcError::Malformed {
                    queue: self.queue.name().to_string(),
                    source,
                }),
        }
    }
}

/// Handle to one driver's private result channel
#[derive(Debug, Clone)]
pub struct ResultChannel {
    worker_id: WorkerId,
    queue: MessageQueue,
}

impl ResultChannel {
    /// Deterministic channel name for a worker
    pub fn name_for(worker_id: WorkerId) -> String {
        format!("{}{}", RESULT_CHANNEL_PREFIX, worker_id)
    }

    /// Open the worker's channel, creating it with `capacity` slots if needed
    pub fn open_or_create(
        namespace: &Namespace,
        worker_id: WorkerId,
        capacity: usize,
    ) -> Result<Self, ResourceError> {
        let queue = namespace.open_or_create(
            &Self::name_for(worker_id),
            QueueAttributes::new(capacity, REPORT_RECORD_SIZE),
        )?;
        Ok(Self { worker_id, queue })
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Post a report, blocking until the channel accepts it
    pub fn post(&self, report: &CompletionReport) -> IpcResult<()> {
        self.queue.send(&report.encode(), Priority::Normal)
    }

    /// Take one report without blocking
    pub fn try_take(&self) -> IpcResult<Option<CompletionReport>> {
        let Some(delivery) = self.queue.try_receive()? else {
            return Ok(None);
        };

        CompletionReport::decode(&delivery.record)
            .map(Some)
            .map_err(|source| IpcError::Malformed {
                queue: self.queue.name().to_string(),
                source,
            })
    }

    /// Block until a report is pending or `cancel` fires
    pub fn wait_readable(&self, cancel: &Receiver<()>) -> bool {
        self.queue.wait_readable(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mq::Position;

    fn job(n: i32) -> Job {
        Job::new(Position::new(0, 0), Position::new(n, 0))
    }

    #[test]
    fn test_job_queue_backpressure() {
        let ns = Namespace::new();
        let queue = JobQueue::create(&ns, 2).unwrap();

        assert!(queue.try_send(&job(1)).unwrap().is_accepted());
        assert!(queue.try_send(&job(2)).unwrap().is_accepted());
        assert_eq!(queue.try_send(&job(3)).unwrap(), SendOutcome::WouldBlock);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.receive().unwrap(), Envelope::Job(job(1)));
        assert_eq!(queue.receive().unwrap(), Envelope::Job(job(2)));
    }

    #[test]
    fn test_sentinel_overtakes_backlog() {
        let ns = Namespace::new();
        let producer = JobQueue::create(&ns, 4).unwrap();
        let consumer = JobQueue::open(&ns).unwrap();

        producer.try_send(&job(1)).unwrap();
        producer.try_send(&job(2)).unwrap();
        producer.send_sentinel().unwrap();

        assert_eq!(consumer.receive().unwrap(), Envelope::Sentinel);
        assert_eq!(consumer.receive().unwrap(), Envelope::Job(job(1)));
    }

    #[test]
    fn test_zeroed_normal_record_is_a_job() {
        let ns = Namespace::new();
        let queue = JobQueue::create(&ns, 1).unwrap();

        queue.try_send(&Job::default()).unwrap();
        assert_eq!(queue.receive().unwrap(), Envelope::Job(Job::default()));
    }

    #[test]
    fn test_create_replaces_stale_queue() {
        let ns = Namespace::new();
        let stale = JobQueue::create(&ns, 3).unwrap();
        stale.try_send(&job(9)).unwrap();

        let fresh = JobQueue::create(&ns, 3).unwrap();
        assert!(fresh.is_empty());
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_result_channel_naming() {
        assert_eq!(ResultChannel::name_for(WorkerId(12)), "/fleet_results_12");

        let ns = Namespace::new();
        let writer = ResultChannel::open_or_create(&ns, WorkerId(3), 4).unwrap();
        let reader = ResultChannel::open_or_create(&ns, WorkerId(3), 4).unwrap();
        assert_eq!(ns.names(), vec!["/fleet_results_3".to_string()]);

        writer.post(&CompletionReport::new(WorkerId(3), 11)).unwrap();
        let report = reader.try_take().unwrap().unwrap();
        assert_eq!(report.distance, 11);
        assert_eq!(report.worker_id, WorkerId(3));
        assert!(reader.try_take().unwrap().is_none());
    }
}
