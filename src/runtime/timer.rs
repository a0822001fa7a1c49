// (C) 2025 - Enzo Lombardi

//! Tick producers: a plain sleeping timer and a kernel-timer fast path.
//!
//! [`SleepSource`] just sleeps the interval on its task; it can drift
//! under load and always reports zero missed ticks. [`TimerSource`]
//! registers a repeating kernel timer with the platform [`Poller`]
//! (timerfd on Linux, `EVFILT_TIMER` on the BSDs), which keeps counting
//! while the consumer stalls: every expiration that did not get its own
//! event shows up in the `missed` field of the next one, so frame
//! accounting never loses time silently.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};

use crate::core::error::Result;
use crate::core::event::Event;

use super::poller::{Poller, Wake};
use super::source::{send_while_running, EventSource, SourceState};

/// Sleep slice bounding how long `stop` can lag behind a long interval.
const STOP_CHECK: Duration = Duration::from_millis(50);

/// Periodic ticks from a sleeping task.
pub struct SleepSource {
    interval: Duration,
    state: SourceState,
}

impl SleepSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SourceState::new(),
        }
    }
}

impl EventSource for SleepSource {
    fn start(&mut self, output: Sender<Event>) -> Result<()> {
        if !self.state.try_start() {
            return Ok(());
        }
        let running = self.state.flag();
        let interval = self.interval;
        let handle = thread::spawn(move || {
            let _guard = super::source::RunningGuard::new(Arc::clone(&running));
            let started = Instant::now();
            let mut last = started;
            let mut frame: u64 = 0;
            'outer: while running.load(Ordering::SeqCst) {
                // sleep in slices so stop() never waits a whole interval
                let wake_at = last + interval;
                while Instant::now() < wake_at {
                    if !running.load(Ordering::SeqCst) {
                        break 'outer;
                    }
                    let remaining = wake_at.saturating_duration_since(Instant::now());
                    thread::sleep(remaining.min(STOP_CHECK));
                }
                let now = Instant::now();
                let event = Event::Tick {
                    frame,
                    elapsed: now.duration_since(started),
                    delta: now.duration_since(last),
                    missed: 0,
                };
                if !send_while_running(&output, &running, event) {
                    break;
                }
                frame += 1;
                last = now;
            }
        });
        self.state.set_handle(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.request_stop();
        self.state.join();
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

impl Drop for SleepSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Periodic ticks from a kernel timer, with missed-expiration
/// accounting.
pub struct TimerSource {
    interval: Duration,
    state: SourceState,
}

impl TimerSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SourceState::new(),
        }
    }
}

impl EventSource for TimerSource {
    fn start(&mut self, output: Sender<Event>) -> Result<()> {
        if !self.state.try_start() {
            return Ok(());
        }
        let running = self.state.flag();
        let interval = self.interval;

        // fail fast if the platform poller cannot come up
        let mut poller = match Poller::new().and_then(|mut p| {
            p.add_timer(interval)?;
            Ok(p)
        }) {
            Ok(poller) => poller,
            Err(e) => {
                self.state.request_stop();
                return Err(e);
            }
        };

        let handle = thread::spawn(move || {
            let _guard = super::source::RunningGuard::new(Arc::clone(&running));
            let started = Instant::now();
            let mut last = started;
            let mut frame: u64 = 0;
            // expirations owed to the consumer from ticks that found the
            // channel full
            let mut carried: u64 = 0;

            while running.load(Ordering::SeqCst) {
                let wakes = match poller.wait(STOP_CHECK) {
                    Ok(wakes) => wakes,
                    Err(e) => {
                        log::debug!("kernel timer wait failed: {}", e);
                        break;
                    }
                };
                for wake in wakes {
                    let Wake::Timer { expirations, .. } = wake else {
                        continue;
                    };
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let total = expirations + carried;
                    let now = Instant::now();
                    let event = Event::Tick {
                        frame,
                        elapsed: now.duration_since(started),
                        delta: now.duration_since(last),
                        missed: total.saturating_sub(1),
                    };
                    match output.try_send(event) {
                        Ok(()) => {
                            carried = 0;
                            frame += 1;
                            last = now;
                        }
                        Err(TrySendError::Full(_)) => {
                            // the consumer owes us this whole tick
                            carried = total;
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return;
                        }
                    }
                }
            }
        });
        self.state.set_handle(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.request_stop();
        self.state.join();
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

impl Drop for TimerSource {
    fn drop(&mut self) {
        self.stop();
    }
}
