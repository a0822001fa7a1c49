// (C) 2025 - Enzo Lombardi

//! Terminal abstraction layer for termgrid.
//!
//! This module provides the [`Terminal`] type which handles all
//! interaction with the physical terminal including:
//! - Raw mode management and alternate screen
//! - Double-buffered rendering for flicker-free updates
//! - Mouse tracking and enhanced keyboard reporting
//! - Window-size queries with capability and 80x24 fallbacks
//! - Mode transitions for shelling out
//!
//! # Restoration
//!
//! Whatever happens - a clean [`close`](Terminal::close), a panic during
//! rendering, or the host wiring SIGINT to shutdown - the terminal must
//! come back usable. Restoration always runs in the same strict order:
//! disable mouse, disable enhanced keyboard, end any open synchronized
//! update, leave the alternate screen, restore the saved termios, show
//! the cursor. `Drop` runs the same sequence as a last resort.
//!
//! # Examples
//!
//! ```rust,no_run
//! use termgrid::terminal::Terminal;
//! use termgrid::core::error::Result;
//!
//! fn main() -> Result<()> {
//!     let mut terminal = Terminal::init()?;
//!     terminal.put_str(0, 0, "hello", Default::default());
//!     terminal.present()?;
//!     terminal.close()?;
//!     Ok(())
//! }
//! ```

mod buffer;
mod mode;
mod render;
mod tty;

pub use buffer::Buffer;
pub use mode::TerminalMode;
pub use render::RenderState;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::cell::Cursor;
use crate::core::error::{Error, Result};
use crate::core::event::Event;
use crate::core::style::Style;
use crate::terminfo::Db;

use tty::Tty;

/// There is only one controlling terminal; a second instance would fight
/// the first over termios and escape state.
static ACTIVE: AtomicBool = AtomicBool::new(false);

const MOUSE_ON: &[u8] = b"\x1b[?1000h\x1b[?1006h";
const MOUSE_OFF: &[u8] = b"\x1b[?1006l\x1b[?1000l";
const KITTY_ON: &[u8] = b"\x1b[>1u";
const KITTY_OFF: &[u8] = b"\x1b[<u";
const MODIFY_OTHER_KEYS_ON: &[u8] = b"\x1b[>4;2m";
const MODIFY_OTHER_KEYS_OFF: &[u8] = b"\x1b[>4;0m";
const SYNC_END: &[u8] = b"\x1b[?2026l";
const ALT_SCREEN_ON: &[u8] = b"\x1b[?1049h";
const ALT_SCREEN_OFF: &[u8] = b"\x1b[?1049l";

/// Behaviour knobs fixed at [`Terminal::init`] time.
#[derive(Debug, Clone)]
pub struct TerminalOptions {
    /// Enter the alternate screen when the terminal supports it.
    pub alternate_screen: bool,
    /// Ask the terminal for SGR mouse reports.
    pub mouse: bool,
    /// Enable the kitty keyboard protocol and xterm's modifyOtherKeys.
    pub enhanced_keyboard: bool,
    /// How long the input decoder waits after a lone ESC before treating
    /// it as the Escape key.
    pub escape_timeout: Duration,
    /// Terminal name override; defaults to `$TERM`.
    pub term: Option<String>,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            alternate_screen: true,
            mouse: true,
            enhanced_keyboard: false,
            escape_timeout: Duration::from_millis(50),
            term: None,
        }
    }
}

/// Terminal handle: owns the tty, the cell buffer, and the render cache.
pub struct Terminal {
    tty: Tty,
    db: Db,
    buffer: Buffer,
    state: RenderState,
    cursor: Cursor,
    mode: TerminalMode,
    options: TerminalOptions,
    size: (u16, u16),
    pending: VecDeque<Event>,
    closed: bool,
}

impl Terminal {
    /// Initializes the terminal with default options.
    ///
    /// Puts the terminal into raw mode, enters the alternate screen when
    /// available, enables mouse tracking, hides the cursor, and sizes the
    /// cell buffer to the window.
    ///
    /// # Errors
    ///
    /// `NotATty` when the process has no terminal, `AlreadyActive` when
    /// another instance exists, or any I/O error from mode setup. On
    /// error the termios state is restored before returning.
    pub fn init() -> Result<Self> {
        Self::with_options(TerminalOptions::default())
    }

    /// Initializes with explicit options.
    pub fn with_options(options: TerminalOptions) -> Result<Self> {
        let term = options
            .term
            .clone()
            .or_else(|| std::env::var("TERM").ok())
            .unwrap_or_else(|| "ansi".to_string());
        Self::with_db(Db::fallback(&term), options)
    }

    /// Initializes with a caller-built capability store.
    ///
    /// This is the path for applications that locate and decode terminfo
    /// files themselves.
    pub fn with_db(db: Db, options: TerminalOptions) -> Result<Self> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::already_active());
        }
        match Self::init_inner(db, options) {
            Ok(terminal) => Ok(terminal),
            Err(e) => {
                ACTIVE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn init_inner(db: Db, options: TerminalOptions) -> Result<Self> {
        let tty = Tty::open()?;

        let mut mode = TerminalMode::RAW;
        tty.apply(mode)?;

        let mut out = Vec::new();
        if options.alternate_screen {
            match db.string("smcup") {
                Some(seq) => out.extend_from_slice(seq),
                None => out.extend_from_slice(ALT_SCREEN_ON),
            }
            mode |= TerminalMode::ALT_SCREEN;
        }
        if options.mouse {
            out.extend_from_slice(MOUSE_ON);
        }
        if options.enhanced_keyboard {
            out.extend_from_slice(KITTY_ON);
            out.extend_from_slice(MODIFY_OTHER_KEYS_ON);
        }
        if let Some(seq) = db.string("civis") {
            out.extend_from_slice(seq);
        } else {
            out.extend_from_slice(b"\x1b[?25l");
        }
        let (width, height) = query_size(&tty, &db);

        // a failed write must put back the termios we just changed
        if let Err(e) = tty.write_all(&out) {
            let _ = tty.restore();
            return Err(e);
        }

        Ok(Self {
            tty,
            db,
            buffer: Buffer::new(width, height),
            state: RenderState::new(),
            cursor: Cursor::default(),
            mode,
            options,
            size: (width, height),
            pending: VecDeque::new(),
            closed: false,
        })
    }

    /// The capability store this terminal draws through.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// The mode currently applied.
    pub fn mode(&self) -> TerminalMode {
        self.mode
    }

    /// Current grid size in cells.
    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn width(&self) -> u16 {
        self.size.0
    }

    pub fn height(&self) -> u16 {
        self.size.1
    }

    /// The frame being composed.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Writes one cell into the back buffer.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) {
        self.buffer.set_cell(x, y, ch, style);
    }

    /// Writes a string into the back buffer.
    pub fn put_str(&mut self, x: u16, y: u16, s: &str, style: Style) {
        self.buffer.put_str(x, y, s, style);
    }

    /// Blanks the back buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Moves the logical cursor.
    pub fn set_cursor(&mut self, x: u16, y: u16) {
        self.cursor.x = x;
        self.cursor.y = y;
    }

    /// Shows or hides the cursor on the next present.
    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Renders the pending frame differences and flushes them out.
    ///
    /// After the cells, the cursor is moved to its logical (clamped)
    /// position and its visibility is updated.
    ///
    /// # Errors
    ///
    /// I/O failures propagate, but the frame's synchronized update is
    /// closed first.
    pub fn present(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut out = Vec::new();
        self.buffer
            .render_to(&mut out, &mut self.state, &self.db)
            .map_err(|e| Error::io("render", e))?;

        let clamped = self.cursor.clamped(self.size.0, self.size.1);
        self.state
            .move_to(&mut out, clamped.x, clamped.y, &self.db)
            .map_err(|e| Error::io("render", e))?;
        self.state
            .set_cursor_visible(&mut out, clamped.visible, &self.db)
            .map_err(|e| Error::io("render", e))?;

        self.tty.write_all(&out)
    }

    /// Repaints the whole screen regardless of the diff.
    pub fn redraw(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.buffer.invalidate_front();
        self.state.invalidate();
        self.present()
    }

    /// Checks the window size, rebuilding the buffer when it changed.
    ///
    /// Returns the new size if a change was detected; a matching
    /// [`Event::Resize`] is queued for [`poll_pending`](Self::poll_pending).
    pub fn check_resize(&mut self) -> Result<Option<(u16, u16)>> {
        self.ensure_open()?;
        let (width, height) = query_size(&self.tty, &self.db);
        if (width, height) == self.size {
            return Ok(None);
        }
        let (old_width, old_height) = self.size;
        self.size = (width, height);
        self.buffer = Buffer::new(width, height);
        self.state.invalidate();
        self.pending.push_back(Event::Resize {
            width,
            height,
            old_width: Some(old_width),
            old_height: Some(old_height),
        });
        Ok(Some((width, height)))
    }

    /// Takes the next locally generated event (resize, mode change).
    pub fn poll_pending(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    /// Runs a block under a different processing mode, restoring the
    /// previous mode afterwards even when the block fails.
    ///
    /// With `preserve_screen` the alternate screen is left untouched;
    /// otherwise the screen is switched back for the duration of the
    /// block (the classic shape for shelling out to an editor).
    ///
    /// One [`Event::ModeChange`] is queued entering the block and one
    /// restoring; `previous` is always the state strictly before the
    /// transition.
    pub fn with_mode<T>(
        &mut self,
        mode: TerminalMode,
        preserve_screen: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.ensure_open()?;
        let previous = self.mode;

        let effective = if preserve_screen {
            (mode - TerminalMode::ALT_SCREEN) | (previous & TerminalMode::ALT_SCREEN)
        } else {
            mode
        };

        if !preserve_screen {
            self.switch_screen(previous, effective)?;
        }
        self.tty.apply(effective)?;
        self.mode = effective;
        self.pending.push_back(Event::ModeChange {
            mode: effective,
            previous,
        });

        let result = f(self);

        // restoration is unconditional: every step runs, the mode and the
        // closing event are recorded even when a step fails
        let screen_result = if preserve_screen {
            Ok(())
        } else {
            self.switch_screen(effective, previous)
        };
        let apply_result = self.tty.apply(previous);
        self.mode = previous;
        self.pending.push_back(Event::ModeChange {
            mode: previous,
            previous: effective,
        });

        let restore_result = screen_result.and(apply_result);
        result.and_then(|value| restore_result.map(|()| value))
    }

    fn switch_screen(&mut self, from: TerminalMode, to: TerminalMode) -> Result<()> {
        let from_alt = from.contains(TerminalMode::ALT_SCREEN);
        let to_alt = to.contains(TerminalMode::ALT_SCREEN);
        if from_alt == to_alt {
            return Ok(());
        }
        if to_alt {
            match self.db.string("smcup") {
                Some(seq) => self.tty.write_all(seq)?,
                None => self.tty.write_all(ALT_SCREEN_ON)?,
            }
            // the alternate screen comes up blank
            self.buffer.invalidate_front();
        } else {
            match self.db.string("rmcup") {
                Some(seq) => self.tty.write_all(seq)?,
                None => self.tty.write_all(ALT_SCREEN_OFF)?,
            }
        }
        self.state.invalidate();
        Ok(())
    }

    /// Restores the terminal for shelling out, keeping this instance
    /// alive. Pair with [`resume`](Self::resume).
    pub fn suspend(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.restore_terminal()
    }

    /// Re-enters TUI mode after [`suspend`](Self::suspend) and forces a
    /// full repaint.
    pub fn resume(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.tty.apply(self.mode)?;
        let mut out = Vec::new();
        if self.mode.contains(TerminalMode::ALT_SCREEN) {
            match self.db.string("smcup") {
                Some(seq) => out.extend_from_slice(seq),
                None => out.extend_from_slice(ALT_SCREEN_ON),
            }
        }
        if self.options.mouse {
            out.extend_from_slice(MOUSE_ON);
        }
        if self.options.enhanced_keyboard {
            out.extend_from_slice(KITTY_ON);
            out.extend_from_slice(MODIFY_OTHER_KEYS_ON);
        }
        self.tty.write_all(&out)?;
        self.state.invalidate();
        self.buffer.invalidate_front();
        self.present()
    }

    /// Sounds the terminal bell.
    pub fn bell(&mut self) -> Result<()> {
        self.ensure_open()?;
        match self.db.string("bel") {
            Some(seq) => self.tty.write_all(seq),
            None => self.tty.write_all(b"\x07"),
        }
    }

    /// Sets the window title via OSC 2.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        self.ensure_open()?;
        let mut out = Vec::with_capacity(title.len() + 8);
        out.extend_from_slice(b"\x1b]2;");
        out.extend_from_slice(title.as_bytes());
        out.push(0x07);
        self.tty.write_all(&out)
    }

    /// The raw descriptor the input subsystem should read from.
    pub fn input_fd(&self) -> std::os::fd::RawFd {
        self.tty.input_fd()
    }

    /// How long the input decoder should wait on a lone ESC.
    pub fn escape_timeout(&self) -> Duration {
        self.options.escape_timeout
    }

    /// Restores the terminal and releases the active slot.
    ///
    /// Idempotent; later drawing calls fail with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.restore_terminal();
        self.closed = true;
        ACTIVE.store(false, Ordering::SeqCst);
        result
    }

    /// The restoration sequence, in its strict order.
    fn restore_terminal(&mut self) -> Result<()> {
        let mut out = Vec::new();
        if self.options.mouse {
            out.extend_from_slice(MOUSE_OFF);
        }
        if self.options.enhanced_keyboard {
            out.extend_from_slice(KITTY_OFF);
            out.extend_from_slice(MODIFY_OTHER_KEYS_OFF);
        }
        if self.db.supports_sync() {
            out.extend_from_slice(SYNC_END);
        }
        if self.mode.contains(TerminalMode::ALT_SCREEN) {
            match self.db.string("rmcup") {
                Some(seq) => out.extend_from_slice(seq),
                None => out.extend_from_slice(ALT_SCREEN_OFF),
            }
        }
        let write_result = self.tty.write_all(&out);
        let restore_result = self.tty.restore();
        let cursor_result = match self.db.string("cnorm") {
            Some(seq) => self.tty.write_all(seq),
            None => self.tty.write_all(b"\x1b[?25h"),
        };
        self.state.invalidate();
        write_result.and(restore_result).and(cursor_result)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::closed("terminal"));
        }
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Window size: ioctl, then the `cols`/`lines` capabilities, then
/// 80x24.
fn query_size(tty: &Tty, db: &Db) -> (u16, u16) {
    if let Some(size) = tty.window_size() {
        return size;
    }
    let cols = db.number("cols").and_then(|v| u16::try_from(v).ok());
    let lines = db.number("lines").and_then(|v| u16::try_from(v).ok());
    match (cols, lines) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => (80, 24),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_is_conservative() {
        let options = TerminalOptions::default();
        assert!(options.alternate_screen);
        assert!(options.mouse);
        assert!(!options.enhanced_keyboard);
        assert_eq!(options.escape_timeout, Duration::from_millis(50));
    }

    #[test]
    fn init_without_a_tty_fails_typed() {
        // the test harness runs without a controlling terminal; when it
        // does have one, init succeeds and must release the slot again
        match Terminal::init() {
            Err(e) => assert!(e.is_not_a_tty() || e.is_io()),
            Ok(mut t) => t.close().unwrap(),
        }
        assert!(!ACTIVE.load(Ordering::SeqCst));
    }
}
