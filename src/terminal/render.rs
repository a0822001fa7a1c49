// (C) 2025 - Enzo Lombardi

//! Render-state cache - elides redundant style and cursor sequences.
//!
//! The terminal remembers the last SGR state it was given, so re-sending
//! it is pure waste. [`RenderState`] mirrors what the terminal currently
//! has (colors, attributes, cursor) and turns setter calls that match the
//! cache into no-ops. The cache must be invalidated whenever something
//! else may have touched the terminal: alternate-screen toggles, mode
//! transitions that do not preserve the screen, the end of a synchronized
//! update, and suspend/resume for shell-out.

use std::io::{self, Write};

use crate::core::color::Color;
use crate::core::style::{Attribute, Style};
use crate::terminfo::param::Param;
use crate::terminfo::Db;

/// Last-emitted terminal state.
///
/// Every field is `Option`: `None` means "unknown", which forces the next
/// setter to emit unconditionally.
#[derive(Debug, Default)]
pub struct RenderState {
    fg: Option<Color>,
    bg: Option<Color>,
    attrs: Option<Attribute>,
    cursor: Option<(u16, u16)>,
    cursor_visible: Option<bool>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything without touching the terminal.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Emits a full SGR reset and forgets everything else.
    pub fn reset<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        sink.write_all(b"\x1b[0m")?;
        self.invalidate();
        // the terminal is now in the default rendition
        self.fg = Some(Color::Default);
        self.bg = Some(Color::Default);
        self.attrs = Some(Attribute::empty());
        Ok(())
    }

    /// Brings the terminal to `style`, emitting as little as possible.
    ///
    /// Attribute additions are emitted incrementally; removing any
    /// attribute forces a full reset followed by re-application of what
    /// remains, because SGR has no per-attribute "off" that is reliable
    /// across terminals.
    pub fn set_style<W: Write>(&mut self, sink: &mut W, style: Style) -> io::Result<()> {
        let needs_reset = match self.attrs {
            Some(current) => !current.difference(style.attrs).is_empty(),
            None => true,
        };

        if needs_reset {
            sink.write_all(b"\x1b[0m")?;
            self.fg = Some(Color::Default);
            self.bg = Some(Color::Default);
            self.attrs = Some(Attribute::empty());
        }

        let current = self.attrs.unwrap_or_else(Attribute::empty);
        for flag in style.attrs.difference(current).iter() {
            if let Some(code) = flag.sgr_code() {
                write!(sink, "\x1b[{}m", code)?;
            }
        }
        self.attrs = Some(style.attrs);

        if self.fg != Some(style.fg) {
            emit_color(sink, style.fg, true)?;
            self.fg = Some(style.fg);
        }
        if self.bg != Some(style.bg) {
            emit_color(sink, style.bg, false)?;
            self.bg = Some(style.bg);
        }
        Ok(())
    }

    /// Moves the cursor to `(x, y)`, 0-based.
    ///
    /// Uses a column-absolute move when staying on the same row and the
    /// database's `cup` otherwise, with the ECMA-48 sequence as fallback.
    pub fn move_to<W: Write>(&mut self, sink: &mut W, x: u16, y: u16, db: &Db) -> io::Result<()> {
        if self.cursor == Some((x, y)) {
            return Ok(());
        }
        if let Some((_, cy)) = self.cursor {
            if cy == y {
                write!(sink, "\x1b[{}G", x + 1)?;
                self.cursor = Some((x, y));
                return Ok(());
            }
        }
        match db.expand("cup", &[Param::from(y), Param::from(x)]) {
            Ok(bytes) => sink.write_all(&bytes)?,
            Err(_) => write!(sink, "\x1b[{};{}H", y + 1, x + 1)?,
        }
        self.cursor = Some((x, y));
        Ok(())
    }

    /// Records that glyph output advanced the cursor by `cols` columns.
    pub fn advance(&mut self, cols: u16) {
        if let Some((x, y)) = self.cursor {
            self.cursor = Some((x + cols, y));
        }
    }

    /// Shows or hides the cursor.
    pub fn set_cursor_visible<W: Write>(
        &mut self,
        sink: &mut W,
        visible: bool,
        db: &Db,
    ) -> io::Result<()> {
        if self.cursor_visible == Some(visible) {
            return Ok(());
        }
        let name = if visible { "cnorm" } else { "civis" };
        match db.string(name) {
            Some(bytes) => sink.write_all(bytes)?,
            None => sink.write_all(if visible { b"\x1b[?25h" } else { b"\x1b[?25l" })?,
        }
        self.cursor_visible = Some(visible);
        Ok(())
    }
}

fn emit_color<W: Write>(sink: &mut W, color: Color, foreground: bool) -> io::Result<()> {
    let base = if foreground { 30 } else { 40 };
    match color {
        Color::Default => write!(sink, "\x1b[{}m", base + 9),
        Color::Basic(n) => write!(sink, "\x1b[{}m", base + u16::from(n & 0x07)),
        Color::Indexed(n) => write!(sink, "\x1b[{};5;{}m", base + 8, n),
        Color::Rgb(r, g, b) => write!(sink, "\x1b[{};2;{};{};{}m", base + 8, r, g, b),
    }
}
