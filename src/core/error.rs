// (C) 2025 - Enzo Lombardi

//! Error types for termgrid operations.
//!
//! This module provides the main error type used throughout the library,
//! with proper backtrace support and context preservation.

use std::backtrace::Backtrace;
use std::fmt::{Display, Formatter};

/// The category of a terminfo parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The leading magic number is neither the 16-bit nor the 32-bit format.
    InvalidMagic,
    /// The input ended before a section it promised.
    TruncatedData,
    /// A header field is negative or exceeds its sanity limit.
    InvalidHeader,
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::InvalidMagic => f.write_str("invalid magic"),
            ParseErrorKind::TruncatedData => f.write_str("truncated data"),
            ParseErrorKind::InvalidHeader => f.write_str("invalid header"),
        }
    }
}

/// Error type for termgrid operations.
///
/// Wraps error kinds with backtrace support for debugging.
///
/// # Examples
///
/// ```rust,no_run
/// use termgrid::core::error::Result;
///
/// fn init_app() -> Result<()> {
///     // Operations that can fail
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    backtrace: Backtrace,
}

/// The specific kind of error that occurred.
#[derive(Debug)]
pub(crate) enum ErrorKind {
    /// A read, write, or ioctl failed. Carries the operation name.
    Io {
        op: &'static str,
        source: std::io::Error,
    },

    /// A terminfo blob is malformed.
    Parse {
        kind: ParseErrorKind,
        details: String,
    },

    /// The process is not attached to a terminal.
    NotATty,

    /// A capability was neither in the database nor the built-in table.
    CapabilityMissing(String),

    /// Operation on a terminal, channel, or source that was already closed.
    Closed(&'static str),

    /// A second Terminal was constructed while one is still active.
    AlreadyActive,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an I/O error tagged with the name of the failed operation.
    pub(crate) fn io(op: &'static str, source: std::io::Error) -> Self {
        Self::new(ErrorKind::Io { op, source })
    }

    /// Creates a terminfo parse error.
    pub(crate) fn parse(kind: ParseErrorKind, details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse {
            kind,
            details: details.into(),
        })
    }

    /// Creates a not-a-tty error.
    pub(crate) fn not_a_tty() -> Self {
        Self::new(ErrorKind::NotATty)
    }

    /// Creates a missing-capability error.
    pub(crate) fn capability_missing(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityMissing(name.into()))
    }

    /// Creates a closed-resource error.
    pub(crate) fn closed(what: &'static str) -> Self {
        Self::new(ErrorKind::Closed(what))
    }

    /// Creates an already-active error.
    pub(crate) fn already_active() -> Self {
        Self::new(ErrorKind::AlreadyActive)
    }

    /// Returns `true` if this error is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io { .. })
    }

    /// Returns `true` if this error is a terminfo parse error.
    pub fn is_parse(&self) -> bool {
        matches!(self.kind, ErrorKind::Parse { .. })
    }

    /// Returns `true` if this error means the process has no terminal.
    pub fn is_not_a_tty(&self) -> bool {
        matches!(self.kind, ErrorKind::NotATty)
    }

    /// Returns `true` if this error is a missing capability.
    pub fn is_capability_missing(&self) -> bool {
        matches!(self.kind, ErrorKind::CapabilityMissing(_))
    }

    /// Returns `true` if this error is an operation on a closed resource.
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::Closed(_))
    }

    /// Returns `true` if another Terminal already owns the tty.
    pub fn is_already_active(&self) -> bool {
        matches!(self.kind, ErrorKind::AlreadyActive)
    }

    /// Returns the parse failure category, if this is a parse error.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match &self.kind {
            ErrorKind::Parse { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns the OS error behind an I/O failure, if any.
    pub fn os_error(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Io { op, source } => write!(f, "I/O error in {}: {}", op, source)?,
            ErrorKind::Parse { kind, details } => {
                write!(f, "terminfo parse error ({}): {}", kind, details)?;
            }
            ErrorKind::NotATty => write!(f, "not attached to a terminal")?,
            ErrorKind::CapabilityMissing(name) => {
                write!(f, "terminal capability '{}' is not available", name)?;
            }
            ErrorKind::Closed(what) => write!(f, "{} is closed", what)?,
            ErrorKind::AlreadyActive => {
                write!(f, "a terminal instance is already active in this process")?;
            }
        }

        // Include backtrace if captured
        if self.backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            write!(f, "\n\nBacktrace:\n{}", self.backtrace)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io("io", e)
    }
}

/// Result type for termgrid operations.
///
/// This is a type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
