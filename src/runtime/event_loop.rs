// (C) 2025 - Enzo Lombardi

//! The event multiplexer: many sources, one ordered output channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::core::event::Event;

use super::source::EventSource;

/// Default output-channel capacity.
const DEFAULT_CAPACITY: usize = 128;

/// Fans events from heterogeneous sources into one bounded channel.
///
/// Each source keeps its own send order; the order *between* sources is
/// whatever the channel's send interleaving produced, which carries no
/// causal meaning. Consumers must not assume a key observed before a
/// tick was typed before the tick fired.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use termgrid::runtime::{EventLoop, SleepSource};
///
/// let mut events = EventLoop::new();
/// events.add_source(Box::new(SleepSource::new(Duration::from_millis(33))));
/// events.start();
/// while let Some(event) = events.wait_for_event(Duration::from_secs(1)) {
///     println!("{}", event);
/// }
/// events.stop();
/// ```
pub struct EventLoop {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    sources: Vec<Box<dyn EventSource>>,
    running: AtomicBool,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A loop whose output channel holds at most `capacity` undelivered
    /// events; producers block (with stop checks) beyond that.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            sources: Vec::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Registers a source. Sources added while running are started
    /// immediately.
    pub fn add_source(&mut self, mut source: Box<dyn EventSource>) {
        if self.running.load(Ordering::SeqCst) {
            if let Err(e) = source.start(self.tx.clone()) {
                log::warn!("event source failed to start: {}", e);
            }
        }
        self.sources.push(source);
    }

    /// A producer handle for callers that want to inject their own
    /// events into the stream.
    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    /// Starts every source. Idempotent: a second call is a no-op.
    ///
    /// A source that fails to start is logged and skipped; the loop runs
    /// with whatever did come up.
    pub fn start(&mut self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        for source in &mut self.sources {
            if let Err(e) = source.start(self.tx.clone()) {
                log::warn!("event source failed to start: {}", e);
            }
        }
    }

    /// Stops every source and waits for their tasks. Idempotent.
    pub fn stop(&mut self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        for source in &mut self.sources {
            source.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Waits for the next event, up to `timeout`. `None` means no event
    /// arrived in time.
    pub fn wait_for_event(&self, timeout: Duration) -> Option<Event> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Returns an event only if one is already queued.
    pub fn try_event(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
