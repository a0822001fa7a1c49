// (C) 2025 - Enzo Lombardi

//! Event runtime: sources, the platform poller, and the multiplexing
//! loop.
//!
//! Every producer - terminal input, SIGWINCH resize, sleeping and
//! kernel timers - implements the same small [`EventSource`] contract
//! (`start` / `stop` / `is_running`, all idempotent) and runs on its own
//! task. The [`EventLoop`] hands each source one bounded output channel
//! and the application consumes the merged stream.
//!
//! Blocking syscalls live inside source tasks, never on the consumer
//! side, and every wait carries a finite timeout so `stop` cannot hang
//! on a task parked in the kernel.

mod event_loop;
mod input;
mod poller;
mod resize;
mod source;
mod timer;

pub use event_loop::EventLoop;
pub use input::InputSource;
pub use poller::{Poller, TimerId, Wake};
pub use resize::ResizeSource;
pub use source::EventSource;
pub use timer::{SleepSource, TimerSource};
