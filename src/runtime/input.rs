// (C) 2025 - Enzo Lombardi

//! Input event source: drives the reader and parser on a background task.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::core::error::Result;
use crate::core::event::Event;
use crate::input::{InputParser, Reader};

use super::source::{send_while_running, EventSource, SourceState, IDLE_SLEEP, MAX_DRAIN_PER_CYCLE};

/// Polls the terminal input descriptor and emits decoded key and mouse
/// events.
///
/// Per cycle the task waits for data (bounded by the escape timeout so a
/// lone ESC can be resolved), decodes what arrived, and pushes at most
/// [`MAX_DRAIN_PER_CYCLE`] events before yielding. End of file on the
/// descriptor winds the task down and flips `is_running` to false.
///
/// Restarting after a stop builds a fresh reader over the same
/// descriptor.
pub struct InputSource {
    fd: std::os::fd::RawFd,
    reader: Option<Reader>,
    escape_timeout: Duration,
    state: SourceState,
}

impl InputSource {
    pub fn new(reader: Reader, escape_timeout: Duration) -> Self {
        Self {
            fd: reader.fd(),
            reader: Some(reader),
            escape_timeout,
            state: SourceState::new(),
        }
    }

    /// Reads from an already-open descriptor (typically the terminal's).
    pub fn from_fd(fd: std::os::fd::RawFd, escape_timeout: Duration) -> Self {
        Self::new(Reader::new(fd), escape_timeout)
    }
}

impl EventSource for InputSource {
    fn start(&mut self, output: Sender<Event>) -> Result<()> {
        if !self.state.try_start() {
            return Ok(());
        }
        // the previous task consumed the reader; a restart gets a new one
        let mut reader = self
            .reader
            .take()
            .unwrap_or_else(|| Reader::new(self.fd));

        let running = self.state.flag();
        let escape_timeout = self.escape_timeout;
        let handle = thread::spawn(move || {
            let _guard = super::source::RunningGuard::new(Arc::clone(&running));
            let mut parser = InputParser::new();
            let mut queue: VecDeque<Event> = VecDeque::new();
            let mut bytes = Vec::with_capacity(256);

            while running.load(Ordering::SeqCst) {
                if queue.is_empty() {
                    let got_data = match reader.wait_for_data(escape_timeout) {
                        Ok(ready) => ready,
                        Err(e) => {
                            log::debug!("input source read error: {}", e);
                            break;
                        }
                    };
                    if got_data {
                        bytes.clear();
                        if reader.read_available(&mut bytes).is_err() {
                            break;
                        }
                        queue.extend(parser.feed(&bytes));
                    } else if parser.has_pending() {
                        // escape timeout expired with a sequence half-read
                        queue.extend(parser.flush());
                    }
                    if reader.is_eof() && queue.is_empty() && !parser.has_pending() {
                        break;
                    }
                }

                let mut emitted = 0;
                while emitted < MAX_DRAIN_PER_CYCLE {
                    let Some(event) = queue.pop_front() else { break };
                    if !send_while_running(&output, &running, event) {
                        return;
                    }
                    emitted += 1;
                }
                if emitted > 0 {
                    thread::yield_now();
                } else {
                    thread::sleep(IDLE_SLEEP);
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

impl Drop for InputSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Key;
    use crossbeam_channel::bounded;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn decodes_bytes_from_the_descriptor() {
        let (mut tx_stream, rx_stream) = UnixStream::pair().unwrap();
        let mut source = InputSource::from_fd(
            rx_stream.as_raw_fd(),
            Duration::from_millis(20),
        );
        let (tx, rx) = bounded(16);
        source.start(tx).unwrap();

        tx_stream.write_all(b"a\x1b[A").unwrap();
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, Event::key(Key::Char('a')));
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second, Event::key(Key::Up));

        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn lone_escape_resolves_after_timeout() {
        let (mut tx_stream, rx_stream) = UnixStream::pair().unwrap();
        let mut source = InputSource::from_fd(
            rx_stream.as_raw_fd(),
            Duration::from_millis(20),
        );
        let (tx, rx) = bounded(16);
        source.start(tx).unwrap();

        tx_stream.write_all(b"\x1b").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, Event::key(Key::Escape));
        source.stop();
    }

    #[test]
    fn eof_winds_the_source_down() {
        let (tx_stream, rx_stream) = UnixStream::pair().unwrap();
        let mut source = InputSource::from_fd(
            rx_stream.as_raw_fd(),
            Duration::from_millis(10),
        );
        let (tx, _rx) = bounded(16);
        source.start(tx).unwrap();
        drop(tx_stream);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while source.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!source.is_running());
        source.stop();
    }

    #[test]
    fn restarts_after_stop() {
        let (mut tx_stream, rx_stream) = UnixStream::pair().unwrap();
        let mut source = InputSource::from_fd(
            rx_stream.as_raw_fd(),
            Duration::from_millis(20),
        );
        let (tx, rx) = bounded(16);
        source.start(tx.clone()).unwrap();
        source.stop();
        assert!(!source.is_running());

        source.start(tx).unwrap();
        assert!(source.is_running());
        tx_stream.write_all(b"z").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, Event::key(Key::Char('z')));
        source.stop();
    }

    #[test]
    fn double_start_is_a_no_op() {
        let (_tx_stream, rx_stream) = UnixStream::pair().unwrap();
        let mut source = InputSource::from_fd(
            rx_stream.as_raw_fd(),
            Duration::from_millis(10),
        );
        let (tx, _rx) = bounded(16);
        source.start(tx.clone()).unwrap();
        assert!(source.is_running());
        source.start(tx).unwrap();
        assert!(source.is_running());
        source.stop();
        assert!(!source.is_running());
    }
}
