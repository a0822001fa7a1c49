// (C) 2025 - Enzo Lombardi

//! Byte-level reader over the terminal input descriptor.
//!
//! All syscalls retry EINTR internally. Readiness comes from `poll(2)`
//! rather than `select`, so descriptors above 1023 work. A descriptor
//! that reports readable and then reads zero bytes is at end of file,
//! which the reader records rather than treating as an error.

use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::core::error::{Error, Result};

const BUF_SIZE: usize = 64;

/// Buffered non-blocking reader over a raw descriptor.
///
/// The descriptor is borrowed, not owned: the Terminal (or stdin) keeps
/// it open, and only the input path reads from it.
pub struct Reader {
    fd: RawFd,
    buf: [u8; BUF_SIZE],
    start: usize,
    len: usize,
    eof: bool,
}

impl Reader {
    pub fn new(fd: RawFd) -> Self {
        Self {
            fd,
            buf: [0; BUF_SIZE],
            start: 0,
            len: 0,
            eof: false,
        }
    }

    pub fn from_stdin() -> Self {
        Self::new(libc::STDIN_FILENO)
    }

    /// The descriptor this reader polls.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Whether the descriptor has reached end of file.
    pub fn is_eof(&self) -> bool {
        self.eof && self.len == 0
    }

    /// Blocks until input is available or the timeout passes.
    ///
    /// Returns `true` when at least one byte can be read. EINTR restarts
    /// the wait with the remaining time.
    pub fn wait_for_data(&mut self, timeout: Duration) -> Result<bool> {
        if self.len > 0 {
            return Ok(true);
        }
        if self.eof {
            return Ok(false);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match poll_readable(self.fd, Some(remaining)) {
                Ok(ready) => return Ok(ready),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io("poll", e)),
            }
        }
    }

    /// Returns the next byte without consuming it.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.len == 0 {
            self.fill()?;
        }
        if self.len == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf[self.start]))
    }

    /// Consumes and returns the next byte.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.start += 1;
            self.len -= 1;
        }
        Ok(byte)
    }

    /// Drains everything currently readable into `out`.
    ///
    /// Returns the number of bytes appended. Does not wait.
    pub fn read_available(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut total = 0;
        loop {
            if self.len > 0 {
                out.extend_from_slice(&self.buf[self.start..self.start + self.len]);
                total += self.len;
                self.start = 0;
                self.len = 0;
            }
            if self.fill()? == 0 {
                return Ok(total);
            }
        }
    }

    /// Refills the internal buffer with whatever is ready right now.
    fn fill(&mut self) -> Result<usize> {
        if self.eof || self.len == BUF_SIZE {
            return Ok(0);
        }
        // only read once poll confirms readiness, so a zero-byte read
        // really is end of file and not an empty VMIN=0 queue
        match poll_readable(self.fd, Some(Duration::ZERO)) {
            Ok(false) => return Ok(0),
            Ok(true) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(Error::io("poll", e)),
        }

        if self.start > 0 {
            self.buf.copy_within(self.start..self.start + self.len, 0);
            self.start = 0;
        }
        loop {
            let spare = &mut self.buf[self.len..];
            // SAFETY: the pointer/length pair comes from a live slice.
            let n = unsafe { libc::read(self.fd, spare.as_mut_ptr().cast(), spare.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::Interrupted => continue,
                    io::ErrorKind::WouldBlock => return Ok(0),
                    _ => return Err(Error::io("read", err)),
                }
            }
            if n == 0 {
                self.eof = true;
                return Ok(0);
            }
            self.len += n as usize;
            return Ok(n as usize);
        }
    }
}

/// `poll(2)` for readability, honoring the timeout. `None` waits forever.
fn poll_readable(fd: RawFd, timeout: Option<Duration>) -> io::Result<bool> {
    let mut fds = [libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }];
    let ms = match timeout {
        None => -1,
        Some(d) => i32::try_from(d.as_millis()).unwrap_or(i32::MAX),
    };
    // SAFETY: fds points at a live array of one initialized pollfd.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, ms) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc > 0 && fds[0].revents & (libc::POLLIN | libc::POLLHUP) != 0)
}
