// (C) 2025 - Enzo Lombardi

//! Controlling-terminal file descriptor and termios plumbing.
//!
//! Prefers stdin/stdout when both are terminals (so shell redirection of
//! one still works through `/dev/tty`), otherwise opens `/dev/tty`
//! directly. The termios snapshot taken at open time lives with the
//! instance; every mode application starts from that snapshot, so
//! restoring a mode is just applying an earlier one.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use nix::sys::termios::{
    tcgetattr, tcsetattr, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices, Termios,
};

use crate::core::error::{Error, Result};

use super::mode::TerminalMode;

pub(crate) struct Tty {
    /// Keeps `/dev/tty` open when stdio is not a terminal.
    _dev: Option<File>,
    input: RawFd,
    output: RawFd,
    saved: Termios,
}

impl Tty {
    /// Opens the controlling terminal and snapshots its termios.
    ///
    /// # Errors
    ///
    /// `NotATty` when neither stdio nor `/dev/tty` is available.
    pub(crate) fn open() -> Result<Self> {
        // SAFETY: isatty only inspects the descriptor.
        let stdin_tty = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
        // SAFETY: as above.
        let stdout_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };

        let (dev, input, output) = if stdin_tty && stdout_tty {
            (None, libc::STDIN_FILENO, libc::STDOUT_FILENO)
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open("/dev/tty")
                .map_err(|_| Error::not_a_tty())?;
            let fd = file.as_raw_fd();
            (Some(file), fd, fd)
        };

        let saved = tcgetattr(borrow_fd(output)).map_err(|e| {
            Error::io("tcgetattr", io::Error::from_raw_os_error(e as i32))
        })?;

        Ok(Self {
            _dev: dev,
            input,
            output,
            saved,
        })
    }

    pub(crate) fn input_fd(&self) -> RawFd {
        self.input
    }

    /// Applies a processing mode, starting from the saved snapshot.
    pub(crate) fn apply(&self, mode: TerminalMode) -> Result<()> {
        let mut t = self.saved.clone();

        if mode.is_character_mode() {
            t.input_flags.remove(
                InputFlags::IXON
                    | InputFlags::ICRNL
                    | InputFlags::INLCR
                    | InputFlags::IGNCR
                    | InputFlags::ISTRIP
                    | InputFlags::BRKINT
                    | InputFlags::PARMRK
                    | InputFlags::IGNBRK,
            );
            t.output_flags.remove(OutputFlags::OPOST);
            t.local_flags.remove(LocalFlags::ICANON | LocalFlags::IEXTEN);
            t.control_flags.remove(ControlFlags::CSIZE | ControlFlags::PARENB);
            t.control_flags.insert(ControlFlags::CS8);
            // reads return immediately; readiness comes from poll(2)
            t.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
            t.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        }
        if !mode.contains(TerminalMode::ECHO) {
            t.local_flags.remove(LocalFlags::ECHO | LocalFlags::ECHONL);
        }
        if !mode.contains(TerminalMode::SIGNALS) {
            t.local_flags.remove(LocalFlags::ISIG);
        }

        tcsetattr(borrow_fd(self.output), SetArg::TCSAFLUSH, &t)
            .map_err(|e| Error::io("tcsetattr", io::Error::from_raw_os_error(e as i32)))
    }

    /// Puts the terminal back exactly as it was at open time.
    pub(crate) fn restore(&self) -> Result<()> {
        tcsetattr(borrow_fd(self.output), SetArg::TCSAFLUSH, &self.saved)
            .map_err(|e| Error::io("tcsetattr", io::Error::from_raw_os_error(e as i32)))
    }

    /// Queries the kernel for the window size. `None` when the ioctl is
    /// unsupported (serial lines, some containers).
    pub(crate) fn window_size(&self) -> Option<(u16, u16)> {
        let mut ws = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: TIOCGWINSZ only writes into the winsize out-parameter.
        let rc = unsafe { libc::ioctl(self.output, libc::TIOCGWINSZ, &mut ws) };
        if rc == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
            Some((ws.ws_col, ws.ws_row))
        } else {
            None
        }
    }

    /// Writes the whole buffer, retrying on EINTR.
    pub(crate) fn write_all(&self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            // SAFETY: the pointer/length pair comes from a live slice.
            let n = unsafe {
                libc::write(self.output, buf.as_ptr().cast(), buf.len())
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::io("write", err));
            }
            buf = &buf[n as usize..];
        }
        Ok(())
    }
}

fn borrow_fd(fd: RawFd) -> BorrowedFd<'static> {
    // SAFETY: the descriptors handed to this module (stdio or the held
    // /dev/tty file) stay open for the life of the Tty.
    unsafe { BorrowedFd::borrow_raw(fd) }
}
