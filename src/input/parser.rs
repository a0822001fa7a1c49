// (C) 2025 - Enzo Lombardi

//! Byte-stream decoder for keyboard and mouse input.
//!
//! This is a push parser: feed it raw bytes as they arrive and collect
//! complete events. Sequences that straddle reads stay buffered until
//! the missing bytes show up; the caller decides when a pending ESC has
//! waited long enough (the escape timeout) and calls
//! [`flush`](InputParser::flush).
//!
//! # Supported input
//!
//! - Printable ASCII and multi-byte UTF-8
//! - C0 controls with the `^A`..`^Z` mapping (Tab, Enter and Backspace
//!   keep their identities instead of reporting Ctrl)
//! - CSI sequences: arrows, Home/End, Back-Tab, tilde-coded keys,
//!   xterm modifier parameters
//! - The kitty keyboard protocol (CSI u)
//! - SGR (1006) and legacy X10 mouse reports
//! - SS3 function and keypad keys
//! - Alt as the ESC prefix
//!
//! Decoding never blocks and never buffers more than
//! [`MAX_SEQUENCE_LEN`] bytes; hostile streams degrade into `Unknown`
//! key events, not memory growth.

use crate::core::event::{Event, Key, Modifiers, MouseButton, MouseEvent, MouseKind};

/// Upper bound on one escape sequence. Anything longer is discarded as a
/// single unrecognised key.
pub const MAX_SEQUENCE_LEN: usize = 64;

/// One step of the state machine.
enum Step {
    /// A complete event spanning `usize` buffered bytes.
    Emit(Event, usize),
    /// Consume bytes without producing an event (e.g. a key release the
    /// caller did not ask for).
    Skip(usize),
    /// The buffer holds a prefix of something longer.
    NeedMore,
}

/// Push parser for terminal input bytes.
///
/// # Examples
///
/// ```
/// use termgrid::input::InputParser;
/// use termgrid::core::event::{Event, Key};
///
/// let mut parser = InputParser::new();
/// let events = parser.feed(b"\x1b[A");
/// assert_eq!(events, vec![Event::key(Key::Up)]);
/// ```
pub struct InputParser {
    buf: Vec<u8>,
}

impl InputParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_SEQUENCE_LEN),
        }
    }

    /// Feeds raw bytes and returns the events that completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        self.pump(&mut events);
        events
    }

    /// Whether an incomplete sequence is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Resolves whatever is buffered without waiting for more bytes.
    ///
    /// Called after the escape timeout expires: a lone ESC becomes the
    /// Escape key, and a malformed partial sequence is dropped as a
    /// single unrecognised key.
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while !self.buf.is_empty() {
            match self.try_parse() {
                Step::Emit(event, used) => {
                    events.push(event);
                    self.buf.drain(..used);
                }
                Step::Skip(used) => {
                    self.buf.drain(..used);
                }
                Step::NeedMore => {
                    if self.buf == [0x1b] {
                        events.push(Event::key(Key::Escape));
                    } else {
                        log::debug!(
                            "discarding {} bytes of unfinished input sequence",
                            self.buf.len()
                        );
                        events.push(Event::key(Key::Unknown));
                    }
                    self.buf.clear();
                }
            }
        }
        events
    }

    fn pump(&mut self, events: &mut Vec<Event>) {
        while !self.buf.is_empty() {
            match self.try_parse() {
                Step::Emit(event, used) => {
                    events.push(event);
                    self.buf.drain(..used);
                }
                Step::Skip(used) => {
                    self.buf.drain(..used);
                }
                Step::NeedMore => {
                    if self.buf.len() > MAX_SEQUENCE_LEN {
                        log::debug!("input sequence exceeded {} bytes", MAX_SEQUENCE_LEN);
                        events.push(Event::key(Key::Unknown));
                        self.buf.clear();
                    }
                    break;
                }
            }
        }
    }

    fn try_parse(&self) -> Step {
        let buf = &self.buf;
        let Some(&first) = buf.first() else {
            return Step::NeedMore;
        };

        match first {
            0x1b => self.parse_escape(),
            // Tab, Enter and friends keep their identity, no Ctrl flag
            0x09 => Step::Emit(Event::key(Key::Tab), 1),
            0x0a | 0x0d => Step::Emit(Event::key(Key::Enter), 1),
            0x7f | 0x08 => Step::Emit(Event::key(Key::Backspace), 1),
            0x00 => Step::Emit(Event::key_with(Key::Char(' '), Modifiers::CTRL), 1),
            0x01..=0x1a => {
                let ch = (first + 0x60) as char; // ^A..^Z
                Step::Emit(Event::key_with(Key::Char(ch), Modifiers::CTRL), 1)
            }
            0x1c..=0x1f => {
                let ch = (first + 0x40) as char; // ^\ ^] ^^ ^_
                Step::Emit(Event::key_with(Key::Char(ch), Modifiers::CTRL), 1)
            }
            0x20..=0x7e => Step::Emit(Event::key(Key::Char(first as char)), 1),
            _ => self.parse_utf8(),
        }
    }

    fn parse_escape(&self) -> Step {
        let buf = &self.buf;
        if buf.len() < 2 {
            return Step::NeedMore;
        }
        match buf[1] {
            b'[' => self.parse_csi(),
            b'O' => self.parse_ss3(),
            0x20..=0x7e => {
                // ESC-prefixed printable is Alt+key
                let ch = buf[1] as char;
                Step::Emit(Event::key_with(Key::Char(ch), Modifiers::ALT), 2)
            }
            _ => Step::Emit(Event::key(Key::Escape), 1),
        }
    }

    fn parse_csi(&self) -> Step {
        let buf = &self.buf;
        if buf.len() < 3 {
            return Step::NeedMore;
        }

        let mut i = 2;
        if buf[i] == b'<' {
            return self.parse_sgr_mouse();
        }
        if buf[i] == b'M' {
            return self.parse_x10_mouse();
        }
        // private-use markers before the parameters
        if buf[i] == b'?' || buf[i] == b'>' {
            i += 1;
        }

        let params_start = i;
        while i < buf.len() && (buf[i].is_ascii_digit() || buf[i] == b';' || buf[i] == b':') {
            i += 1;
        }
        let params_end = i;
        // intermediate bytes
        while i < buf.len() && (0x20..=0x2f).contains(&buf[i]) {
            i += 1;
        }
        if i >= buf.len() {
            return Step::NeedMore;
        }
        let final_byte = buf[i];
        if !(0x40..=0x7e).contains(&final_byte) {
            // not a CSI final byte; drop the mangled introducer
            return Step::Skip(i + 1);
        }
        let used = i + 1;
        let params = parse_params(&buf[params_start..params_end]);
        let modifiers = params
            .get(1)
            .map(|&p| Modifiers::from_param(p))
            .unwrap_or_default();

        let key = match final_byte {
            b'A' => Key::Up,
            b'B' => Key::Down,
            b'C' => Key::Right,
            b'D' => Key::Left,
            b'H' => Key::Home,
            b'F' => Key::End,
            b'Z' => Key::BackTab,
            b'~' => {
                // xterm's modifyOtherKeys reports as CSI 27 ; mods ; code ~
                if params.first() == Some(&27) && params.len() >= 3 {
                    let modifiers = Modifiers::from_param(params[1]);
                    return Step::Emit(
                        Event::key_with(codepoint_key(params[2]), modifiers),
                        used,
                    );
                }
                match params.first() {
                    Some(n) => match tilde_key(*n) {
                        Some(key) => key,
                        None => Key::Unknown,
                    },
                    None => Key::Unknown,
                }
            }
            b'u' => return self.parse_kitty(&params, used),
            _ => {
                log::debug!("unrecognised CSI final byte {:?}", final_byte as char);
                Key::Unknown
            }
        };
        Step::Emit(Event::key_with(key, modifiers), used)
    }

    /// Kitty keyboard reports: `CSI keycode ; modifiers ; event-type u`.
    fn parse_kitty(&self, params: &[u32], used: usize) -> Step {
        let Some(&code) = params.first() else {
            return Step::Skip(used);
        };
        let modifiers = params
            .get(1)
            .map(|&p| Modifiers::from_param(p))
            .unwrap_or_default();
        // event types: 1 press, 2 repeat, 3 release
        if params.get(2) == Some(&3) {
            return Step::Skip(used);
        }
        Step::Emit(Event::key_with(codepoint_key(code), modifiers), used)
    }

    fn parse_ss3(&self) -> Step {
        let buf = &self.buf;
        if buf.len() < 3 {
            return Step::NeedMore;
        }
        let key = match buf[2] {
            b'P' => Key::F(1),
            b'Q' => Key::F(2),
            b'R' => Key::F(3),
            b'S' => Key::F(4),
            b'A' => Key::Up,
            b'B' => Key::Down,
            b'C' => Key::Right,
            b'D' => Key::Left,
            b'H' => Key::Home,
            b'F' => Key::End,
            _ => Key::Unknown,
        };
        Step::Emit(Event::key(key), 3)
    }

    /// SGR mouse reports: `CSI < button ; x ; y (M|m)`.
    fn parse_sgr_mouse(&self) -> Step {
        let buf = &self.buf;
        let mut i = 3;
        while i < buf.len() && (buf[i].is_ascii_digit() || buf[i] == b';') {
            i += 1;
        }
        if i >= buf.len() {
            return Step::NeedMore;
        }
        let release = match buf[i] {
            b'M' => false,
            b'm' => true,
            _ => return Step::Skip(i + 1),
        };
        let used = i + 1;
        let params = parse_params(&buf[3..i]);
        let (Some(&b), Some(&px), Some(&py)) = (params.first(), params.get(1), params.get(2))
        else {
            return Step::Skip(used);
        };
        let x = px.saturating_sub(1).min(u32::from(u16::MAX)) as u16;
        let y = py.saturating_sub(1).min(u32::from(u16::MAX)) as u16;

        let mut modifiers = Modifiers::empty();
        if b & 4 != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if b & 8 != 0 {
            modifiers |= Modifiers::ALT;
        }
        if b & 16 != 0 {
            modifiers |= Modifiers::CTRL;
        }

        let (button, kind) = if b & 64 != 0 {
            let button = if b & 1 != 0 {
                MouseButton::WheelDown
            } else {
                MouseButton::WheelUp
            };
            (button, MouseKind::Press)
        } else {
            let button = match b & 0x03 {
                0 => MouseButton::Left,
                1 => MouseButton::Middle,
                2 => MouseButton::Right,
                _ => MouseButton::None,
            };
            let kind = if b & 32 != 0 {
                MouseKind::Motion
            } else if release {
                MouseKind::Release
            } else {
                MouseKind::Press
            };
            (button, kind)
        };

        Step::Emit(
            Event::Mouse(MouseEvent {
                x,
                y,
                button,
                kind,
                modifiers,
            }),
            used,
        )
    }

    /// Legacy X10 reports: `CSI M` then three bytes offset by 32.
    fn parse_x10_mouse(&self) -> Step {
        let buf = &self.buf;
        if buf.len() < 6 {
            return Step::NeedMore;
        }
        let b = buf[3].wrapping_sub(32);
        let x = u16::from(buf[4].saturating_sub(32).max(1)) - 1;
        let y = u16::from(buf[5].saturating_sub(32).max(1)) - 1;

        let (button, kind) = if b & 64 != 0 {
            let button = if b & 1 != 0 {
                MouseButton::WheelDown
            } else {
                MouseButton::WheelUp
            };
            (button, MouseKind::Press)
        } else if b & 0x03 == 3 {
            (MouseButton::None, MouseKind::Release)
        } else {
            let button = match b & 0x03 {
                0 => MouseButton::Left,
                1 => MouseButton::Middle,
                _ => MouseButton::Right,
            };
            let kind = if b & 32 != 0 {
                MouseKind::Motion
            } else {
                MouseKind::Press
            };
            (button, kind)
        };

        let mut modifiers = Modifiers::empty();
        if b & 4 != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if b & 8 != 0 {
            modifiers |= Modifiers::ALT;
        }
        if b & 16 != 0 {
            modifiers |= Modifiers::CTRL;
        }

        Step::Emit(
            Event::Mouse(MouseEvent {
                x,
                y,
                button,
                kind,
                modifiers,
            }),
            6,
        )
    }

    fn parse_utf8(&self) -> Step {
        let buf = &self.buf;
        let first = buf[0];
        let len = match first {
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            _ => {
                log::debug!("invalid UTF-8 lead byte {:#04x}", first);
                return Step::Emit(Event::key(Key::Unknown), 1);
            }
        };
        if buf.len() < len {
            return Step::NeedMore;
        }
        match std::str::from_utf8(&buf[..len]) {
            Ok(s) => match s.chars().next() {
                Some(ch) => Step::Emit(Event::key(Key::Char(ch)), len),
                None => Step::Emit(Event::key(Key::Unknown), len),
            },
            Err(_) => {
                log::debug!("malformed UTF-8 continuation");
                Step::Emit(Event::key(Key::Unknown), 1)
            }
        }
    }
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits semicolon-separated numeric parameters. Colon-separated
/// sub-parameters collapse into their first value.
fn parse_params(bytes: &[u8]) -> Vec<u32> {
    let mut params = Vec::new();
    for field in bytes.split(|&b| b == b';') {
        let main = field.split(|&b| b == b':').next().unwrap_or(field);
        let mut value: u32 = 0;
        let mut any = false;
        for &b in main {
            if b.is_ascii_digit() {
                value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
                any = true;
            }
        }
        if any {
            params.push(value);
        } else {
            params.push(0);
        }
    }
    if bytes.is_empty() {
        params.clear();
    }
    params
}

/// Key identity for a CSI-u / modifyOtherKeys codepoint parameter.
fn codepoint_key(code: u32) -> Key {
    match code {
        9 => Key::Tab,
        13 => Key::Enter,
        27 => Key::Escape,
        127 => Key::Backspace,
        _ => match char::from_u32(code) {
            Some(ch) if !ch.is_control() => Key::Char(ch),
            _ => Key::Unknown,
        },
    }
}

fn tilde_key(n: u32) -> Option<Key> {
    match n {
        1 | 7 => Some(Key::Home),
        2 => Some(Key::Insert),
        3 => Some(Key::Delete),
        4 | 8 => Some(Key::End),
        5 => Some(Key::PageUp),
        6 => Some(Key::PageDown),
        11 => Some(Key::F(1)),
        12 => Some(Key::F(2)),
        13 => Some(Key::F(3)),
        14 => Some(Key::F(4)),
        15 => Some(Key::F(5)),
        17 => Some(Key::F(6)),
        18 => Some(Key::F(7)),
        19 => Some(Key::F(8)),
        20 => Some(Key::F(9)),
        21 => Some(Key::F(10)),
        23 => Some(Key::F(11)),
        24 => Some(Key::F(12)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::KeyEvent;

    fn keys(events: &[Event]) -> Vec<KeyEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Key(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn printable_ascii() {
        let mut parser = InputParser::new();
        let events = parser.feed(b"abc");
        assert_eq!(
            events,
            vec![
                Event::key(Key::Char('a')),
                Event::key(Key::Char('b')),
                Event::key(Key::Char('c')),
            ]
        );
    }

    #[test]
    fn arrow_keys() {
        let mut parser = InputParser::new();
        // 1B 5B 41 is Up with no modifiers
        let events = parser.feed(&[0x1b, 0x5b, 0x41]);
        assert_eq!(events, vec![Event::key(Key::Up)]);
        assert_eq!(parser.feed(b"\x1b[B"), vec![Event::key(Key::Down)]);
        assert_eq!(parser.feed(b"\x1b[C"), vec![Event::key(Key::Right)]);
        assert_eq!(parser.feed(b"\x1b[D"), vec![Event::key(Key::Left)]);
    }

    #[test]
    fn control_characters_map_to_ctrl_letters() {
        let mut parser = InputParser::new();
        let events = parser.feed(&[0x01, 0x1a]);
        assert_eq!(
            keys(&events),
            vec![
                KeyEvent::new(Key::Char('a'), Modifiers::CTRL),
                KeyEvent::new(Key::Char('z'), Modifiers::CTRL),
            ]
        );
    }

    #[test]
    fn tab_enter_backspace_have_no_ctrl() {
        let mut parser = InputParser::new();
        let events = parser.feed(&[0x09, 0x0d, 0x0a, 0x7f]);
        assert_eq!(
            events,
            vec![
                Event::key(Key::Tab),
                Event::key(Key::Enter),
                Event::key(Key::Enter),
                Event::key(Key::Backspace),
            ]
        );
    }

    #[test]
    fn function_keys() {
        let mut parser = InputParser::new();
        assert_eq!(parser.feed(b"\x1bOP"), vec![Event::key(Key::F(1))]);
        assert_eq!(parser.feed(b"\x1bOS"), vec![Event::key(Key::F(4))]);
        assert_eq!(parser.feed(b"\x1b[15~"), vec![Event::key(Key::F(5))]);
        assert_eq!(parser.feed(b"\x1b[24~"), vec![Event::key(Key::F(12))]);
    }

    #[test]
    fn navigation_keys() {
        let mut parser = InputParser::new();
        assert_eq!(parser.feed(b"\x1b[H"), vec![Event::key(Key::Home)]);
        assert_eq!(parser.feed(b"\x1b[F"), vec![Event::key(Key::End)]);
        assert_eq!(parser.feed(b"\x1b[Z"), vec![Event::key(Key::BackTab)]);
        assert_eq!(parser.feed(b"\x1b[2~"), vec![Event::key(Key::Insert)]);
        assert_eq!(parser.feed(b"\x1b[3~"), vec![Event::key(Key::Delete)]);
        assert_eq!(parser.feed(b"\x1b[5~"), vec![Event::key(Key::PageUp)]);
        assert_eq!(parser.feed(b"\x1b[6~"), vec![Event::key(Key::PageDown)]);
    }

    #[test]
    fn xterm_modifier_parameters() {
        let mut parser = InputParser::new();
        // 1;5A is Ctrl+Up
        let events = parser.feed(b"\x1b[1;5A");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::Up, Modifiers::CTRL)]
        );
        // 1;2F is Shift+End
        let events = parser.feed(b"\x1b[1;2F");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::End, Modifiers::SHIFT)]
        );
        // 3;3~ is Alt+Delete
        let events = parser.feed(b"\x1b[3;3~");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::Delete, Modifiers::ALT)]
        );
    }

    #[test]
    fn alt_prefixed_printable() {
        let mut parser = InputParser::new();
        let events = parser.feed(b"\x1bx");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::Char('x'), Modifiers::ALT)]
        );
    }

    #[test]
    fn modify_other_keys_reports() {
        let mut parser = InputParser::new();
        // Ctrl+i distinguished from Tab: CSI 27;5;105~
        let events = parser.feed(b"\x1b[27;5;105~");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::Char('i'), Modifiers::CTRL)]
        );
    }

    #[test]
    fn kitty_keyboard_reports() {
        let mut parser = InputParser::new();
        // 'a' with Ctrl (modifier bits 4 encoded as 5)
        let events = parser.feed(b"\x1b[97;5u");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::Char('a'), Modifiers::CTRL)]
        );
        // Enter with Super
        let events = parser.feed(b"\x1b[13;9u");
        assert_eq!(
            keys(&events),
            vec![KeyEvent::new(Key::Enter, Modifiers::SUPER)]
        );
        // release events are swallowed
        let events = parser.feed(b"\x1b[97;5;3u");
        assert!(events.is_empty());
    }

    #[test]
    fn sgr_mouse_press() {
        let mut parser = InputParser::new();
        // ESC [ < 0 ; 10 ; 20 M is a left press at (10, 20) in 1-based
        // report coordinates
        let events = parser.feed(&[
            0x1b, 0x5b, 0x3c, 0x30, 0x3b, 0x31, 0x30, 0x3b, 0x32, 0x30, 0x4d,
        ]);
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent {
                x: 9,
                y: 19,
                button: MouseButton::Left,
                kind: MouseKind::Press,
                modifiers: Modifiers::empty(),
            })]
        );
    }

    #[test]
    fn sgr_mouse_release_motion_wheel_modifiers() {
        let mut parser = InputParser::new();
        let events = parser.feed(b"\x1b[<0;5;6m");
        assert!(matches!(
            events[0],
            Event::Mouse(MouseEvent {
                kind: MouseKind::Release,
                button: MouseButton::Left,
                ..
            })
        ));
        let events = parser.feed(b"\x1b[<32;5;6M");
        assert!(matches!(
            events[0],
            Event::Mouse(MouseEvent {
                kind: MouseKind::Motion,
                ..
            })
        ));
        let events = parser.feed(b"\x1b[<64;5;6M");
        assert!(matches!(
            events[0],
            Event::Mouse(MouseEvent {
                button: MouseButton::WheelUp,
                ..
            })
        ));
        let events = parser.feed(b"\x1b[<65;5;6M");
        assert!(matches!(
            events[0],
            Event::Mouse(MouseEvent {
                button: MouseButton::WheelDown,
                ..
            })
        ));
        // ctrl+shift left press
        let events = parser.feed(b"\x1b[<20;5;6M");
        match events[0] {
            Event::Mouse(m) => {
                assert_eq!(m.modifiers, Modifiers::SHIFT | Modifiers::CTRL);
            }
            _ => panic!("expected mouse event"),
        }
    }

    #[test]
    fn x10_mouse() {
        let mut parser = InputParser::new();
        // button 0 press at 1-based (5, 9): bytes are value + 32
        let events = parser.feed(&[0x1b, b'[', b'M', 32, 32 + 5, 32 + 9]);
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent {
                x: 4,
                y: 8,
                button: MouseButton::Left,
                kind: MouseKind::Press,
                modifiers: Modifiers::empty(),
            })]
        );
        // release is button bits 3
        let events = parser.feed(&[0x1b, b'[', b'M', 32 + 3, 33, 33]);
        assert!(matches!(
            events[0],
            Event::Mouse(MouseEvent {
                kind: MouseKind::Release,
                ..
            })
        ));
    }

    #[test]
    fn x10_mouse_clamps_zero_coordinates() {
        let mut parser = InputParser::new();
        // coordinate byte below the +32 offset must clamp, not wrap
        let events = parser.feed(&[0x1b, b'[', b'M', 32, 31, 32]);
        match events[0] {
            Event::Mouse(m) => {
                assert_eq!((m.x, m.y), (0, 0));
            }
            _ => panic!("expected mouse event"),
        }
    }

    #[test]
    fn utf8_multibyte() {
        let mut parser = InputParser::new();
        let events = parser.feed("é".as_bytes());
        assert_eq!(events, vec![Event::key(Key::Char('é'))]);
        let events = parser.feed("漢".as_bytes());
        assert_eq!(events, vec![Event::key(Key::Char('漢'))]);
        // U+1F600 arrives as F0 9F 98 80
        let events = parser.feed(&[0xf0, 0x9f, 0x98, 0x80]);
        assert_eq!(events, vec![Event::key(Key::Char('\u{1F600}'))]);
    }

    #[test]
    fn utf8_split_across_reads() {
        let mut parser = InputParser::new();
        let bytes = "漢".as_bytes();
        assert!(parser.feed(&bytes[..1]).is_empty());
        assert!(parser.feed(&bytes[1..2]).is_empty());
        let events = parser.feed(&bytes[2..]);
        assert_eq!(events, vec![Event::key(Key::Char('漢'))]);
    }

    #[test]
    fn invalid_utf8_degrades_to_unknown() {
        let mut parser = InputParser::new();
        let events = parser.feed(&[0xff, b'a']);
        assert_eq!(
            events,
            vec![Event::key(Key::Unknown), Event::key(Key::Char('a'))]
        );
    }

    #[test]
    fn escape_sequences_split_across_reads() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[").is_empty());
        assert!(parser.has_pending());
        let events = parser.feed(b"A");
        assert_eq!(events, vec![Event::key(Key::Up)]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn flush_turns_lone_escape_into_escape_key() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b").is_empty());
        let events = parser.flush();
        assert_eq!(events, vec![Event::key(Key::Escape)]);
    }

    #[test]
    fn flush_drops_unfinished_csi_as_unknown() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[12;").is_empty());
        let events = parser.flush();
        assert_eq!(events, vec![Event::key(Key::Unknown)]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn oversized_sequences_are_bounded() {
        let mut parser = InputParser::new();
        let mut hostile = b"\x1b[".to_vec();
        hostile.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE_LEN * 2));
        let events = parser.feed(&hostile);
        assert_eq!(events, vec![Event::key(Key::Unknown)]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn parsing_terminates_on_arbitrary_bytes() {
        // every byte value in a few orders; the parser must consume all
        // of it without hanging or growing without bound
        let mut parser = InputParser::new();
        let mut stream: Vec<u8> = (0u8..=255).collect();
        stream.extend((0u8..=255).rev());
        let _ = parser.feed(&stream);
        let _ = parser.flush();
        assert!(!parser.has_pending());
    }
}
