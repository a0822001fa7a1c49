// (C) 2025 - Enzo Lombardi

//! Double-buffered cell grid and the minimal-diff renderer.
//!
//! The buffer keeps two grids: the *front* mirrors what the terminal
//! currently shows, the *back* is the frame being composed. Rendering
//! walks both, emits only the cells that differ, batches consecutive
//! same-styled cells into runs, and skips whole rows that were never
//! touched.
//!
//! Wide glyphs occupy a leader cell plus a continuation cell; the pair is
//! written and cleared together, so a continuation can never exist
//! without the leader on its left.

use std::io::{self, Write};

use crate::core::cell::{is_wide, Cell, CellKind};
use crate::core::style::Style;
use crate::terminfo::Db;

use super::render::RenderState;

/// Begin/End synchronized update (DEC private mode 2026).
const SYNC_BEGIN: &[u8] = b"\x1b[?2026h";
const SYNC_END: &[u8] = b"\x1b[?2026l";

/// A double-buffered grid of styled cells.
///
/// Dimensions are fixed for the life of the buffer; a window resize
/// creates a new one.
///
/// # Examples
///
/// ```
/// use termgrid::terminal::Buffer;
/// use termgrid::core::style::Style;
///
/// let mut buffer = Buffer::new(80, 24);
/// buffer.put_str(2, 1, "hello", Style::default());
/// assert_eq!(buffer.get(2, 1).unwrap().ch, 'h');
/// ```
pub struct Buffer {
    width: u16,
    height: u16,
    back: Vec<Cell>,
    front: Vec<Cell>,
    row_dirty: Vec<bool>,
    default_style: Style,
}

impl Buffer {
    pub fn new(width: u16, height: u16) -> Self {
        let cells = usize::from(width) * usize::from(height);
        let blank = Cell::blank(Style::default());
        Self {
            width,
            height,
            back: vec![blank; cells],
            front: vec![blank; cells],
            row_dirty: vec![false; usize::from(height)],
            default_style: Style::default(),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// The style used for blank cells by [`clear`](Self::clear) and when
    /// breaking up wide-cell pairs.
    pub fn set_default_style(&mut self, style: Style) {
        self.default_style = style;
    }

    fn idx(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    /// Reads a cell. Out-of-bounds coordinates yield `None`.
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.back[self.idx(x, y)])
    }

    /// Writes one cell.
    ///
    /// Out-of-bounds writes are silently discarded. Overwriting half of a
    /// wide pair blanks the other half; a wide glyph written into the
    /// last column is downgraded to a blank because wide cells never span
    /// row boundaries.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) {
        if x >= self.width || y >= self.height {
            return;
        }
        let wide = is_wide(ch);
        if wide && x + 1 >= self.width {
            self.break_pair(x, y);
            let i = self.idx(x, y);
            self.back[i] = Cell::blank(style);
            self.row_dirty[usize::from(y)] = true;
            return;
        }

        self.break_pair(x, y);
        if wide {
            self.break_pair(x + 1, y);
            let i = self.idx(x, y);
            self.back[i] = Cell::wide_leader(ch, style);
            self.back[i + 1] = Cell::continuation(style);
        } else {
            let i = self.idx(x, y);
            self.back[i] = Cell::new(ch, style);
        }
        self.row_dirty[usize::from(y)] = true;
    }

    /// Writes a string left to right, clipping at the right edge.
    pub fn put_str(&mut self, x: u16, y: u16, s: &str, style: Style) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            let step = if is_wide(ch) { 2 } else { 1 };
            self.set_cell(cx, y, ch, style);
            cx += step;
        }
    }

    /// Fills the whole back buffer with one character.
    pub fn fill(&mut self, ch: char, style: Style) {
        let cell = Cell::new(ch, style);
        self.back.fill(cell);
        self.row_dirty.fill(true);
    }

    /// Blanks the back buffer with the default style. The cursor is not
    /// touched.
    pub fn clear(&mut self) {
        self.fill(' ', self.default_style);
    }

    /// If `(x, y)` holds half of a wide pair, blank the whole pair.
    fn break_pair(&mut self, x: u16, y: u16) {
        let blank = Cell::blank(self.default_style);
        let i = self.idx(x, y);
        match self.back[i].kind {
            CellKind::WideLeader => {
                self.back[i] = blank;
                let right = self.idx(x + 1, y);
                self.back[right] = blank;
            }
            CellKind::Continuation => {
                self.back[i] = blank;
                let left = self.idx(x - 1, y);
                self.back[left] = blank;
            }
            CellKind::Regular => {}
        }
    }

    /// Emits the difference between the front and back grids, then marks
    /// the back grid as shown.
    ///
    /// On terminals with synchronized updates the whole frame is wrapped
    /// in the begin/end brackets; the end bracket is emitted on every
    /// exit path, panics included, so a failed frame cannot leave the
    /// terminal buffering forever.
    pub fn render_to<W: Write>(
        &mut self,
        sink: &mut W,
        state: &mut RenderState,
        db: &Db,
    ) -> io::Result<()> {
        // an untouched frame emits nothing, not even brackets
        if !self.row_dirty.iter().any(|d| *d) {
            return Ok(());
        }
        let mut sink = SyncGuard::begin(sink, db.supports_sync())?;

        for y in 0..self.height {
            if !self.row_dirty[usize::from(y)] {
                continue;
            }
            self.render_row(&mut sink, state, db, y)?;
            self.row_dirty[usize::from(y)] = false;
        }

        sink.finish()
    }

    /// Forgets what the terminal is showing, so the next render repaints
    /// every cell.
    pub(crate) fn invalidate_front(&mut self) {
        // a char no write path produces, so every comparison fails
        let sentinel = Cell::new('\0', Style::default());
        self.front.fill(sentinel);
        self.row_dirty.fill(true);
    }

    /// Forces a full repaint: every cell is considered dirty.
    pub fn sync_to<W: Write>(
        &mut self,
        sink: &mut W,
        state: &mut RenderState,
        db: &Db,
    ) -> io::Result<()> {
        self.invalidate_front();
        state.invalidate();
        self.render_to(sink, state, db)
    }

    fn render_row<W: Write>(
        &mut self,
        sink: &mut W,
        state: &mut RenderState,
        db: &Db,
        y: u16,
    ) -> io::Result<()> {
        let mut x = 0u16;
        while x < self.width {
            let i = self.idx(x, y);
            // continuations are rendered by their leader
            if self.back[i] == self.front[i] || self.back[i].is_continuation() {
                x += 1;
                continue;
            }

            state.move_to(sink, x, y, db)?;
            let run_style = self.back[i].style;
            state.set_style(sink, run_style)?;

            while x < self.width {
                let i = self.idx(x, y);
                let cell = self.back[i];
                if cell.is_continuation() {
                    x += 1;
                    continue;
                }
                if cell == self.front[i] || cell.style != run_style {
                    break;
                }

                let mut utf8 = [0u8; 4];
                sink.write_all(cell.ch.encode_utf8(&mut utf8).as_bytes())?;
                state.advance(cell.display_width());
                self.front[i] = cell;
                if cell.is_wide_leader() {
                    self.front[i + 1] = self.back[i + 1];
                    x += 2;
                } else {
                    x += 1;
                }
            }
        }
        Ok(())
    }
}

/// Writes the synchronized-update brackets around a frame.
///
/// The end bracket goes out in `Drop` as well, so an unwinding panic or
/// an early `?` return still closes the update.
struct SyncGuard<'a, W: Write> {
    sink: &'a mut W,
    armed: bool,
}

impl<'a, W: Write> SyncGuard<'a, W> {
    fn begin(sink: &'a mut W, sync: bool) -> io::Result<Self> {
        if sync {
            sink.write_all(SYNC_BEGIN)?;
        }
        Ok(Self { sink, armed: sync })
    }

    fn finish(mut self) -> io::Result<()> {
        if self.armed {
            self.armed = false;
            self.sink.write_all(SYNC_END)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for SyncGuard<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W: Write> Drop for SyncGuard<'_, W> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.sink.write_all(SYNC_END);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Color;
    use crate::core::style::Attribute;

    fn plain_db() -> Db {
        // no sync brackets, keeps expected output minimal
        Db::fallback("xterm")
    }

    fn sync_db() -> Db {
        Db::fallback("xterm-256color")
    }

    fn render(buffer: &mut Buffer, db: &Db) -> Vec<u8> {
        let mut out = Vec::new();
        let mut state = RenderState::new();
        state.reset(&mut out).unwrap();
        out.clear();
        buffer.render_to(&mut out, &mut state, db).unwrap();
        out
    }

    fn red() -> Style {
        Style::new(Color::RED, Color::Default, Attribute::empty())
    }

    #[test]
    fn single_cell_diff_is_minimal() {
        let db = plain_db();
        let mut buffer = Buffer::new(3, 1);
        buffer.set_cell(1, 0, 'X', red());
        let out = render(&mut buffer, &db);
        // exactly: cursor move, red foreground, the glyph
        assert_eq!(out, b"\x1b[1;2H\x1b[31mX");
    }

    #[test]
    fn render_is_idempotent() {
        let db = plain_db();
        let mut buffer = Buffer::new(10, 3);
        buffer.put_str(0, 0, "hello", red());
        buffer.set_cell(9, 2, '!', Style::default());
        let mut state = RenderState::new();
        let mut out = Vec::new();
        buffer.render_to(&mut out, &mut state, &db).unwrap();
        assert!(!out.is_empty());
        let mut second = Vec::new();
        buffer.render_to(&mut second, &mut state, &db).unwrap();
        assert!(second.is_empty(), "unchanged frame must emit zero bytes");
    }

    #[test]
    fn idempotent_after_arbitrary_mutation_sequences() {
        let db = plain_db();
        let mut buffer = Buffer::new(7, 4);
        buffer.put_str(0, 0, "ab", red());
        buffer.clear();
        buffer.set_cell(6, 3, 'z', Style::default());
        buffer.put_str(3, 2, "漢字", red());
        buffer.set_cell(4, 2, 'q', Style::default());
        let mut state = RenderState::new();
        let mut out = Vec::new();
        buffer.render_to(&mut out, &mut state, &db).unwrap();
        let mut second = Vec::new();
        buffer.render_to(&mut second, &mut state, &db).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn same_style_run_sets_style_once() {
        let db = plain_db();
        let mut buffer = Buffer::new(10, 1);
        buffer.put_str(0, 0, "abcde", red());
        let out = render(&mut buffer, &db);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s.matches("\x1b[31m").count(), 1);
        assert!(s.ends_with("abcde"));
    }

    #[test]
    fn style_transition_splits_runs() {
        let db = plain_db();
        let mut buffer = Buffer::new(10, 1);
        buffer.put_str(0, 0, "ab", red());
        buffer.put_str(2, 0, "cd", Style::default().with_attr(Attribute::BOLD));
        let out = render(&mut buffer, &db);
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("\x1b[31m"));
        assert!(s.contains("\x1b[1m"));
        // the bold run follows the red run without a second cursor move
        assert_eq!(s.matches("\x1b[1;1H").count(), 1);
    }

    #[test]
    fn clean_rows_are_skipped() {
        let db = plain_db();
        let mut buffer = Buffer::new(4, 3);
        buffer.set_cell(0, 1, 'm', Style::default());
        let out = render(&mut buffer, &db);
        let s = String::from_utf8(out).unwrap();
        // only row 2 (1-based) is addressed
        assert!(s.contains("\x1b[2;1H"));
        assert!(!s.contains("\x1b[1;1H"));
        assert!(!s.contains("\x1b[3;1H"));
    }

    #[test]
    fn wide_cell_writes_pair_and_diff_advances_two() {
        let db = plain_db();
        let mut buffer = Buffer::new(6, 1);
        buffer.set_cell(0, 0, '漢', Style::default());
        assert!(buffer.get(0, 0).unwrap().is_wide_leader());
        assert!(buffer.get(1, 0).unwrap().is_continuation());
        let out = render(&mut buffer, &db);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s.matches('漢').count(), 1);
    }

    #[test]
    fn overwriting_continuation_clears_leader() {
        let mut buffer = Buffer::new(6, 1);
        buffer.set_cell(0, 0, '漢', Style::default());
        buffer.set_cell(1, 0, 'x', Style::default());
        assert_eq!(buffer.get(0, 0).unwrap().ch, ' ');
        assert_eq!(buffer.get(0, 0).unwrap().kind, CellKind::Regular);
        assert_eq!(buffer.get(1, 0).unwrap().ch, 'x');
    }

    #[test]
    fn overwriting_leader_clears_continuation() {
        let mut buffer = Buffer::new(6, 1);
        buffer.set_cell(2, 0, '漢', Style::default());
        buffer.set_cell(2, 0, 'x', Style::default());
        assert_eq!(buffer.get(2, 0).unwrap().ch, 'x');
        assert_eq!(buffer.get(3, 0).unwrap().ch, ' ');
        assert_eq!(buffer.get(3, 0).unwrap().kind, CellKind::Regular);
    }

    #[test]
    fn wide_write_in_last_column_is_downgraded() {
        let mut buffer = Buffer::new(4, 1);
        buffer.set_cell(3, 0, '漢', Style::default());
        let cell = buffer.get(3, 0).unwrap();
        assert_eq!(cell.ch, ' ');
        assert_eq!(cell.kind, CellKind::Regular);
    }

    #[test]
    fn no_continuation_without_leader_after_random_writes() {
        let mut buffer = Buffer::new(8, 2);
        let writes = [
            (0u16, 0u16, '漢'),
            (1, 0, '字'),
            (2, 0, 'a'),
            (6, 0, '漢'),
            (7, 0, 'b'),
            (3, 1, '猫'),
            (4, 1, '犬'),
            (3, 1, 'x'),
        ];
        for (x, y, ch) in writes {
            buffer.set_cell(x, y, ch, Style::default());
        }
        for y in 0..2u16 {
            for x in 0..8u16 {
                let cell = buffer.get(x, y).unwrap();
                if cell.is_continuation() {
                    assert!(x > 0);
                    assert!(
                        buffer.get(x - 1, y).unwrap().is_wide_leader(),
                        "orphan continuation at {},{}",
                        x,
                        y
                    );
                }
                if cell.is_wide_leader() {
                    assert!(buffer.get(x + 1, y).unwrap().is_continuation());
                }
            }
        }
    }

    #[test]
    fn out_of_bounds_writes_are_discarded() {
        let mut buffer = Buffer::new(4, 2);
        buffer.set_cell(4, 0, 'x', Style::default());
        buffer.set_cell(0, 2, 'x', Style::default());
        buffer.set_cell(100, 100, 'x', Style::default());
        let db = plain_db();
        let out = render(&mut buffer, &db);
        assert!(out.is_empty());
    }

    #[test]
    fn sync_brackets_wrap_the_frame() {
        let db = sync_db();
        let mut buffer = Buffer::new(4, 1);
        buffer.set_cell(0, 0, 'a', Style::default());
        let out = render(&mut buffer, &db);
        assert!(out.starts_with(SYNC_BEGIN));
        assert!(out.ends_with(SYNC_END));
    }

    #[test]
    fn untouched_frame_emits_nothing_even_with_sync() {
        let db = sync_db();
        let mut buffer = Buffer::new(4, 1);
        let out = render(&mut buffer, &db);
        assert!(out.is_empty());

        buffer.set_cell(0, 0, 'a', Style::default());
        let mut state = RenderState::new();
        let mut first = Vec::new();
        buffer.render_to(&mut first, &mut state, &db).unwrap();
        let mut second = Vec::new();
        buffer.render_to(&mut second, &mut state, &db).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn sync_end_survives_a_panicking_sink() {
        struct Exploding {
            out: Vec<u8>,
            writes_left: usize,
        }
        impl Write for Exploding {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if self.writes_left == 0 && buf != SYNC_END {
                    panic!("sink exploded mid-frame");
                }
                self.writes_left = self.writes_left.saturating_sub(1);
                self.out.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let db = sync_db();
        let mut buffer = Buffer::new(4, 1);
        buffer.put_str(0, 0, "abc", Style::default());
        let mut state = RenderState::new();

        let mut sink = Exploding {
            out: Vec::new(),
            writes_left: 2,
        };
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = buffer.render_to(&mut sink, &mut state, &db);
        }))
        .is_err();
        assert!(panicked);
        assert!(
            sink.out.ends_with(SYNC_END),
            "stream must close the update: {:?}",
            String::from_utf8_lossy(&sink.out)
        );
    }

    #[test]
    fn sync_to_repaints_everything() {
        let db = plain_db();
        let mut buffer = Buffer::new(3, 1);
        buffer.put_str(0, 0, "abc", Style::default());
        let mut state = RenderState::new();
        let mut out = Vec::new();
        buffer.render_to(&mut out, &mut state, &db).unwrap();

        let mut repaint = Vec::new();
        buffer.sync_to(&mut repaint, &mut state, &db).unwrap();
        let s = String::from_utf8(repaint).unwrap();
        assert!(s.contains("abc"));
    }

    #[test]
    fn clear_uses_default_style() {
        let db = plain_db();
        let mut buffer = Buffer::new(2, 1);
        let inverted = Style::default().with_attr(Attribute::REVERSE);
        buffer.set_default_style(inverted);
        buffer.clear();
        let out = render(&mut buffer, &db);
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("\x1b[7m"));
    }
}
