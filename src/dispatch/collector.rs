//! Result collection
//!
//! One collector thread per result channel. The loop blocks until the
//! channel holds at least one report, drains every report currently
//! buffered, and goes back to waiting. There is no notification to re-arm,
//! so a report that lands during a drain is either taken by that drain or
//! wakes the next wait.
//!
//! A collector stops when its stop handle is dropped, after one final drain.
//! The dispatcher drops it only once the owning driver has been joined, so
//! every report the driver posted is already in the channel by then.

use crate::dispatch::coordinator::DispatchStats;
use crate::dispatch::queue::ResultChannel;
use crate::error::{DispatchError, IpcError, IpcResult, ProcessError};
use crate::mq::{CompletionReport, WorkerId};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace};

/// Destination for collected reports
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &CompletionReport);
}

/// Logs every report
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&self, report: &CompletionReport) {
        info!(
            worker = %report.worker_id,
            distance = report.distance,
            "The driver [{}] drove a distance of [{}]",
            report.worker_id,
            report.distance
        );
    }
}

/// Forwards reports to a channel; reports are discarded once the receiver
/// is gone
impl ReportSink for Sender<CompletionReport> {
    fn emit(&self, report: &CompletionReport) {
        let _ = self.send(*report);
    }
}

/// Totals for one result channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    pub worker_id: WorkerId,

    /// Reports drained
    pub reports: u64,

    /// Sum of drained distances
    pub distance: u64,

    /// Times the channel woke the collector
    pub wakeups: u64,
}

/// Handle to a running collector thread
pub struct Collector {
    worker_id: WorkerId,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<IpcResult<CollectorSummary>>>,
}

impl Collector {
    /// Start draining `channel` on a dedicated thread
    pub fn spawn(
        channel: ResultChannel,
        sink: Arc<dyn ReportSink>,
        stats: Arc<DispatchStats>,
    ) -> Result<Self, ProcessError> {
        let worker_id = channel.worker_id();
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(format!("collector-{}", worker_id))
            .spawn(move || collect_loop(channel, sink, stats, stop_rx))
            .map_err(|e| ProcessError::SpawnFailed {
                role: "collector",
                id: worker_id.0,
                reason: e.to_string(),
            })?;

        Ok(Self {
            worker_id,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Whether the collector thread has ended
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Drain what is left, stop the thread and return its totals
    pub fn finish(mut self) -> Result<CollectorSummary, DispatchError> {
        drop(self.stop.take());

        let Some(handle) = self.handle.take() else {
            return Ok(CollectorSummary {
                worker_id: self.worker_id,
                ..Default::default()
            });
        };

        match handle.join() {
            Ok(outcome) => outcome.map_err(DispatchError::from),
            Err(_) => Err(ProcessError::Panicked {
                role: "collector",
                id: self.worker_id.0,
            }
            .into()),
        }
    }
}

fn collect_loop(
    channel: ResultChannel,
    sink: Arc<dyn ReportSink>,
    stats: Arc<DispatchStats>,
    stop: Receiver<()>,
) -> IpcResult<CollectorSummary> {
    let mut summary = CollectorSummary {
        worker_id: channel.worker_id(),
        ..Default::default()
    };
    debug!(channel = channel.name(), "Collector starting");

    loop {
        let readable = channel.wait_readable(&stop);
        if readable {
            summary.wakeups += 1;
        }

        let drained = drain(&channel, sink.as_ref(), &stats, &mut summary)?;
        trace!(channel = channel.name(), drained, "Drained result channel");

        if !readable {
            break;
        }
    }

    debug!(
        channel = channel.name(),
        reports = summary.reports,
        "Collector stopped"
    );
    Ok(summary)
}

/// Take every report currently buffered
fn drain(
    channel: &ResultChannel,
    sink: &dyn ReportSink,
    stats: &DispatchStats,
    summary: &mut CollectorSummary,
) -> Result<u64, IpcError> {
    let mut drained = 0;
    while let Some(report) = channel.try_take()? {
        sink.emit(&report);
        stats.record_report(report.distance);
        summary.reports += 1;
        summary.distance += u64::from(report.distance);
        drained += 1;
    }
    Ok(drained)
}
