//! Shutdown signalling
//!
//! A single atomic flag, set once by a timer or a signal handler and only
//! ever read by the dispatcher loop.

use crossbeam_channel::{after, bounded, select, Sender};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Process-wide "stop producing" flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag; further calls have no effect
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sets a [`ShutdownFlag`] once a duration has elapsed
pub struct ShutdownTimer {
    disarm: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ShutdownTimer {
    /// Start a timer that triggers `flag` after `duration`
    pub fn arm(flag: ShutdownFlag, duration: Duration) -> io::Result<Self> {
        let (disarm_tx, disarm_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("shutdown-timer".into())
            .spawn(move || {
                select! {
                    recv(after(duration)) -> _ => {
                        info!(after_ms = duration.as_millis() as u64, "Run time elapsed, requesting shutdown");
                        flag.trigger();
                    },
                    recv(disarm_rx) -> _ => debug!("Shutdown timer disarmed"),
                }
            })?;

        Ok(Self {
            disarm: Some(disarm_tx),
            handle: Some(handle),
        })
    }

    /// Stop the timer if it has not fired yet and wait for its thread
    pub fn disarm(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.disarm.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ShutdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
