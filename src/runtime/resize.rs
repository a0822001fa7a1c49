// (C) 2025 - Enzo Lombardi

//! Window-resize event source driven by SIGWINCH.
//!
//! The signal handler must stay async-signal-safe, so it does exactly
//! one thing: write a byte into a self-pipe (non-blocking, drop on
//! full). A worker task owns the pipe's read end, and on every wake
//! re-reads the window size and reports it - but only when the
//! dimensions actually changed, so signal storms collapse into a single
//! event per distinct size.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use signal_hook::consts::SIGWINCH;
use signal_hook::low_level::pipe;
use signal_hook::SigId;

use crate::core::error::{Error, Result};
use crate::core::event::Event;

use super::source::{send_while_running, EventSource, SourceState};

/// How often the worker re-checks the running flag while parked on the
/// self-pipe.
const WAKE_POLL: Duration = Duration::from_millis(100);

/// Emits [`Event::Resize`] whenever the window dimensions change.
///
/// Restarting after a stop wires up a fresh self-pipe; the worker and
/// the handler registration from the previous run are already gone.
pub struct ResizeSource {
    state: SourceState,
    sig_id: Option<SigId>,
    pipe_read: Option<UnixStream>,
    pipe_write: Option<UnixStream>,
}

impl ResizeSource {
    /// Wires up the self-pipe. The SIGWINCH handler is not installed
    /// until [`start`](EventSource::start).
    pub fn new() -> Result<Self> {
        let (read_half, write_half) = self_pipe()?;
        Ok(Self {
            state: SourceState::new(),
            sig_id: None,
            pipe_read: Some(read_half),
            pipe_write: Some(write_half),
        })
    }
}

/// A non-blocking socketpair for the signal handler to poke.
fn self_pipe() -> Result<(UnixStream, UnixStream)> {
    let (read_half, write_half) =
        UnixStream::pair().map_err(|e| Error::io("socketpair", e))?;
    read_half
        .set_nonblocking(true)
        .map_err(|e| Error::io("fcntl", e))?;
    write_half
        .set_nonblocking(true)
        .map_err(|e| Error::io("fcntl", e))?;
    Ok((read_half, write_half))
}

impl EventSource for ResizeSource {
    fn start(&mut self, output: Sender<Event>) -> Result<()> {
        if !self.state.try_start() {
            return Ok(());
        }
        // the previous run's worker owned the old pipe halves
        let (mut read_half, write_half) =
            match (self.pipe_read.take(), self.pipe_write.take()) {
                (Some(read_half), Some(write_half)) => (read_half, write_half),
                _ => match self_pipe() {
                    Ok(pair) => pair,
                    Err(e) => {
                        self.state.request_stop();
                        return Err(e);
                    }
                },
            };

        // non-blocking write with drop-on-full semantics, safe in a
        // signal handler
        let sig_id = match pipe::register(SIGWINCH, write_half) {
            Ok(sig_id) => sig_id,
            Err(e) => {
                self.state.request_stop();
                return Err(Error::io("sigaction", e));
            }
        };
        self.sig_id = Some(sig_id);

        let running = self.state.flag();
        let handle = thread::spawn(move || {
            let _guard = super::source::RunningGuard::new(Arc::clone(&running));
            let size_fd = SizeFd::open();
            let mut last = size_fd.query();

            while running.load(Ordering::SeqCst) {
                match wait_readable(&read_half, WAKE_POLL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(_) => break,
                }
                // collapse a burst of signals into one wake
                let mut sink = [0u8; 16];
                while matches!(read_half.read(&mut sink), Ok(n) if n > 0) {}

                let size = size_fd.query();
                if size == last {
                    continue;
                }
                let (old_width, old_height) = match last {
                    Some((w, h)) => (Some(w), Some(h)),
                    None => (None, None),
                };
                if let Some((width, height)) = size {
                    let event = Event::Resize {
                        width,
                        height,
                        old_width,
                        old_height,
                    };
                    if !send_while_running(&output, &running, event) {
                        break;
                    }
                }
                last = size;
            }
        });
        self.state.set_handle(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.request_stop();
        if let Some(sig_id) = self.sig_id.take() {
            signal_hook::low_level::unregister(sig_id);
        }
        self.state.join();
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

impl Drop for ResizeSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The descriptor the worker measures the window against.
struct SizeFd {
    tty: Option<File>,
}

impl SizeFd {
    fn open() -> Self {
        Self {
            tty: File::open("/dev/tty").ok(),
        }
    }

    fn query(&self) -> Option<(u16, u16)> {
        let fd = match &self.tty {
            Some(file) => file.as_raw_fd(),
            None => libc::STDOUT_FILENO,
        };
        let mut ws = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: TIOCGWINSZ only writes into the winsize out-parameter.
        let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
        if rc == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
            Some((ws.ws_col, ws.ws_row))
        } else {
            None
        }
    }
}

fn wait_readable(stream: &UnixStream, timeout: Duration) -> io::Result<bool> {
    let mut fds = [libc::pollfd {
        fd: stream.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    }];
    let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    // SAFETY: fds points at a live array of one initialized pollfd.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0 && fds[0].revents & libc::POLLIN != 0)
}
