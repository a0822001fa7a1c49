// (C) 2025 - Enzo Lombardi

//! Input: non-blocking byte reading and escape-sequence decoding.
//!
//! The [`Reader`] owns the input descriptor and never blocks without a
//! deadline; the [`InputParser`] turns its bytes into [`Event`]s. The
//! split matters because a lone ESC is ambiguous - only the passage of
//! time (no follow-up byte within the escape timeout) resolves it, and
//! that timing decision belongs to whoever drives the reader.
//!
//! [`Event`]: crate::core::event::Event

mod parser;
mod reader;

pub use parser::InputParser;
pub use reader::Reader;
