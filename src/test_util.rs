// (C) 2025 - Enzo Lombardi

//! Test utilities for applications building on termgrid.
//!
//! Only compiled for the crate's own tests or when the `test-util`
//! feature is enabled.
//!
//! # Examples
//!
//! ```
//! use termgrid::test_util::CaptureSink;
//! use termgrid::terminal::{Buffer, RenderState};
//! use termgrid::terminfo::Db;
//!
//! let db = Db::fallback("xterm");
//! let mut sink = CaptureSink::new();
//! let mut state = RenderState::new();
//! let mut buffer = Buffer::new(10, 2);
//! buffer.put_str(0, 0, "hi", Default::default());
//! buffer.render_to(&mut sink, &mut state, &db).unwrap();
//! assert!(sink.text().contains("hi"));
//! ```

use std::io::{self, Write};

/// An in-memory sink that records every byte rendered into it.
#[derive(Debug, Default)]
pub struct CaptureSink {
    bytes: Vec<u8>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The captured output, lossily decoded for assertions.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Discards the capture.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Splits the capture into the escape sequences it contains,
    /// dropping plain text. Handy for asserting on emitted control
    /// sequences without matching every glyph in between.
    pub fn sequences(&self) -> Vec<Vec<u8>> {
        let mut sequences = Vec::new();
        let mut i = 0;
        while i < self.bytes.len() {
            if self.bytes[i] != 0x1b {
                i += 1;
                continue;
            }
            let start = i;
            i += 1;
            if self.bytes.get(i) == Some(&b'[') {
                i += 1;
                while i < self.bytes.len() && !(0x40..=0x7e).contains(&self.bytes[i]) {
                    i += 1;
                }
                i = (i + 1).min(self.bytes.len());
            } else if i < self.bytes.len() {
                i += 1;
            }
            sequences.push(self.bytes[start..i].to_vec());
        }
        sequences
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_and_splits_sequences() {
        let mut sink = CaptureSink::new();
        sink.write_all(b"\x1b[1;2Hab\x1b[31mc").unwrap();
        assert_eq!(sink.text(), "\x1b[1;2Hab\x1b[31mc");
        assert_eq!(
            sink.sequences(),
            vec![b"\x1b[1;2H".to_vec(), b"\x1b[31m".to_vec()]
        );
    }
}
