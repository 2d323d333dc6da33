//! Starting units of execution for drivers
//!
//! The dispatcher never spawns a driver directly; it goes through a
//! [`Spawner`] so the mechanism can be swapped (and failures injected).

use crate::dispatch::worker::WorkerOutcome;
use std::io;
use std::thread::{self, JoinHandle};

/// Body of a driver, run to completion on its own unit of execution
pub type WorkerTask = Box<dyn FnOnce() -> WorkerOutcome + Send + 'static>;

/// Starts a driver's unit of execution
pub trait Spawner: Send + Sync {
    /// Start `task` under `name`
    fn spawn(&self, name: String, task: WorkerTask) -> io::Result<JoinHandle<WorkerOutcome>>;
}

/// Runs each driver on a dedicated, named OS thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, name: String, task: WorkerTask) -> io::Result<JoinHandle<WorkerOutcome>> {
        thread::Builder::new().name(name).spawn(task)
    }
}
