//! Message-queue substrate
//!
//! Named, bounded queues that deliver fixed-size records whole, plus the
//! wire records the dispatcher and its drivers exchange over them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Namespace                        │
//! │  - name -> queue object registry                    │
//! │  - create / open / unlink, idempotent names         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   MessageQueue                       │
//! │  - Urgent lane (bounded, served first)              │
//! │  - Normal lane (bounded FIFO)                       │
//! │  - try_send never blocks: Accepted | WouldBlock     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use fleet_dispatch::mq::{Namespace, Priority, QueueAttributes};
//!
//! let ns = Namespace::new();
//! let queue = ns.create("/demo", QueueAttributes::new(4, 16)).unwrap();
//! queue.send(b"normal", Priority::Normal).unwrap();
//! queue.send(b"urgent", Priority::Urgent).unwrap();
//!
//! assert_eq!(queue.receive().unwrap().record, b"urgent");
//! ns.unlink("/demo").unwrap();
//! ```

pub mod namespace;
pub mod types;

pub use namespace::{
    Delivery, MessageQueue, Namespace, Priority, QueueAttributes, SendOutcome, NAME_MAX,
};
pub use types::{
    CompletionReport, Job, Position, WorkerId, JOB_RECORD_SIZE, REPORT_RECORD_SIZE,
};
