//! fleet-dispatch - Ride Dispatch Simulator
//!
//! A dispatcher produces randomized transport jobs at random intervals and
//! hands them to a fixed pool of drivers through a shared, bounded job
//! queue. Drivers simulate each drive by sleeping one millisecond per unit
//! of Manhattan distance and report completions on a private result
//! channel, which a dedicated collector drains as reports arrive.
//!
//! # Features
//!
//! - **Named Bounded Queues**: Every queue lives in a [`mq::Namespace`] under
//!   a well-known name, with fixed capacity and fixed-size records.
//!
//! - **Backpressure by Drop**: The producer never blocks; a job offered to a
//!   full queue is dropped and counted.
//!
//! - **Priority Sentinels**: Shutdown sends one sentinel per driver on the
//!   urgent class, so a backlog of jobs never delays termination.
//!
//! - **Clean Teardown**: Every queue the dispatcher created is removed, on
//!   success and on failure alike.
//!
//! # Example
//!
//! ```bash
//! # 4 drivers for 10 seconds
//! fleet-dispatch 4 10
//!
//! # 2 drivers until Ctrl-C, with per-job logging
//! fleet-dispatch 2 -v
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod mq;
pub mod progress;

pub use config::{CliArgs, DispatchConfig};
pub use dispatch::{DispatchReport, Dispatcher, ShutdownFlag};
pub use error::{DispatchError, Result};
