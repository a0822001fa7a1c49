// (C) 2025 - Enzo Lombardi

//! The uniform event-source contract and its shared plumbing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};

use crate::core::error::Result;
use crate::core::event::Event;

/// How many events one source may push per scheduling cycle before it
/// yields. Bounds monopolisation under input floods.
pub(crate) const MAX_DRAIN_PER_CYCLE: usize = 64;

/// Nap length for a cycle that produced nothing.
pub(crate) const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// A producer of events running on its own task.
///
/// `start` and `stop` are idempotent: both flip an atomic flag with
/// compare-and-set, so a double start is a no-op and a double stop is
/// harmless. After `stop` returns, `is_running` is false and the source
/// emits nothing further. A stopped source may be started again; each
/// run re-acquires whatever platform resources the previous run
/// released.
pub trait EventSource: Send {
    /// Begins producing into `output`. A second call while running is a
    /// no-op.
    fn start(&mut self, output: Sender<Event>) -> Result<()>;

    /// Stops the task and releases its platform resources.
    fn stop(&mut self);

    /// Whether the task is currently producing.
    fn is_running(&self) -> bool;
}

/// Running flag plus join handle, shared by every source implementation.
pub(crate) struct SourceState {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SourceState {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Flips stopped -> running. False means the source already runs.
    pub(crate) fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Flips running -> stopped. False means it was not running.
    pub(crate) fn request_stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub(crate) fn set_handle(&mut self, handle: JoinHandle<()>) {
        self.handle = Some(handle);
    }

    /// Waits for the task to wind down. Source loops poll with finite
    /// timeouts, so this terminates promptly.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("event source task panicked");
            }
        }
    }
}

/// Clears the running flag when the task winds down, however it winds
/// down - a clean break, an error, or a panic unwinding the task.
pub(crate) struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sends while the running flag holds, without ever blocking forever on
/// a full channel.
///
/// Returns false when the source was stopped or the consumer went away;
/// the caller's loop should exit.
pub(crate) fn send_while_running(
    tx: &Sender<Event>,
    running: &AtomicBool,
    mut event: Event,
) -> bool {
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        match tx.send_timeout(event, Duration::from_millis(10)) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => event = back,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}
