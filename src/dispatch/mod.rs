//! Job dispatch: producer, driver pool and result collection
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │        Dispatcher         │
//!                  │  - random jobs, try_send  │
//!                  │  - drops on WouldBlock    │
//!                  └────────────┬─────────────┘
//!                               │
//!                               ▼
//!                  ┌──────────────────────────┐
//!                  │   Job Queue (capacity K)  │
//!                  │  - normal: jobs (FIFO)    │
//!                  │  - urgent: sentinels      │
//!                  └────────────┬─────────────┘
//!       ┌───────────────────────┼───────────────────────┐
//!       │                       │                       │
//! ┌─────▼─────┐           ┌─────▼─────┐           ┌─────▼─────┐
//! │ Driver 1  │           │ Driver 2  │           │ Driver N  │
//! └─────┬─────┘           └─────┬─────┘           └─────┬─────┘
//!       │ results_1             │ results_2             │ results_N
//! ┌─────▼─────┐           ┌─────▼─────┐           ┌─────▼─────┐
//! │Collector 1│           │Collector 2│           │Collector N│
//! └───────────┘           └───────────┘           └───────────┘
//! ```

pub mod collector;
pub mod coordinator;
pub mod queue;
pub mod shutdown;
pub mod source;
pub mod spawner;
pub mod worker;

pub use collector::{Collector, CollectorSummary, LogSink, ReportSink};
pub use coordinator::{
    remove_channels, DispatchReport, DispatchState, DispatchStats, Dispatcher, StatsSnapshot,
    TeardownReport,
};
pub use queue::{Envelope, JobQueue, ResultChannel, JOB_QUEUE_NAME, RESULT_CHANNEL_PREFIX};
pub use shutdown::{ShutdownFlag, ShutdownTimer};
pub use source::{JobSource, RandomJobSource};
pub use spawner::{Spawner, ThreadSpawner, WorkerTask};
pub use worker::{DrivePlan, Driver, Worker, WorkerOutcome, WorkerSummary};
