// (C) 2025 - Enzo Lombardi

//! Event system - the single tagged union delivered to applications.
//!
//! Everything the toolkit can observe arrives as an [`Event`]: decoded
//! keys, mouse reports, window-size changes, timer ticks, and terminal
//! mode transitions. The set of variants is closed; consumers match
//! exhaustively.

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;

use crate::terminal::TerminalMode;

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0x01;
        const ALT   = 0x02;
        const CTRL  = 0x04;
        const SUPER = 0x08;
    }
}

impl Modifiers {
    /// Decodes the kitty/xterm modifier parameter (`1 + bitset`).
    pub(crate) fn from_param(param: u32) -> Self {
        Self::from_bits_truncate(param.saturating_sub(1) as u8)
    }
}

/// Identity of a pressed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character (also carries the char for control chords,
    /// e.g. Ctrl+A is `Char('a')` with [`Modifiers::CTRL`]).
    Char(char),
    Enter,
    Tab,
    BackTab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Function key F1-F12.
    F(u8),
    /// A sequence the parser could not decode.
    Unknown,
}

/// A decoded keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub const fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub const fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    /// The character this event types, if any.
    pub fn ch(&self) -> Option<char> {
        match self.key {
            Key::Char(c) => Some(c),
            _ => None,
        }
    }
}

/// Which mouse button a report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    /// Motion report with no button held.
    None,
}

/// Press, release, or motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
    Press,
    Release,
    Motion,
}

/// A decoded mouse event. Coordinates are 0-based grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub button: MouseButton,
    pub kind: MouseKind,
    pub modifiers: Modifiers,
}

/// A unified event.
///
/// # Examples
///
/// ```
/// use termgrid::core::event::{Event, Key, KeyEvent};
///
/// let ev = Event::Key(KeyEvent::plain(Key::Enter));
/// match ev {
///     Event::Key(k) => assert_eq!(k.key, Key::Enter),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// The window size changed. The old dimensions are reported when known.
    Resize {
        width: u16,
        height: u16,
        old_width: Option<u16>,
        old_height: Option<u16>,
    },
    /// A periodic timer fired.
    Tick {
        /// Number of ticks delivered before this one.
        frame: u64,
        /// Time since the timer started.
        elapsed: Duration,
        /// Time since the previous tick.
        delta: Duration,
        /// Expirations that elapsed without their own event.
        missed: u64,
    },
    /// The terminal switched processing modes.
    ModeChange {
        mode: TerminalMode,
        previous: TerminalMode,
    },
}

impl Event {
    pub fn key(key: Key) -> Self {
        Event::Key(KeyEvent::plain(key))
    }

    pub fn key_with(key: Key, modifiers: Modifiers) -> Self {
        Event::Key(KeyEvent::new(key, modifiers))
    }
}

// Display kept separate from Debug so diagnostic dumps stay on one line.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Key(k) => {
                write!(f, "Event::Key({:?}", k.key)?;
                if !k.modifiers.is_empty() {
                    write!(f, ", modifiers={:?}", k.modifiers)?;
                }
                write!(f, ")")
            }
            Event::Mouse(m) => write!(
                f,
                "Event::Mouse({:?} {:?} at {},{})",
                m.kind, m.button, m.x, m.y
            ),
            Event::Resize { width, height, .. } => {
                write!(f, "Event::Resize({}x{})", width, height)
            }
            Event::Tick { frame, missed, .. } => {
                write!(f, "Event::Tick(frame={}, missed={})", frame, missed)
            }
            Event::ModeChange { mode, previous } => {
                write!(f, "Event::ModeChange({:?} <- {:?})", mode, previous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_param_decoding() {
        assert_eq!(Modifiers::from_param(1), Modifiers::empty());
        assert_eq!(Modifiers::from_param(2), Modifiers::SHIFT);
        assert_eq!(Modifiers::from_param(5), Modifiers::CTRL);
        assert_eq!(Modifiers::from_param(8), Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL);
        assert_eq!(Modifiers::from_param(0), Modifiers::empty());
    }

    #[test]
    fn key_event_char_accessor() {
        assert_eq!(KeyEvent::plain(Key::Char('x')).ch(), Some('x'));
        assert_eq!(KeyEvent::plain(Key::Up).ch(), None);
    }

    #[test]
    fn display_is_single_line() {
        let ev = Event::key_with(Key::Char('a'), Modifiers::CTRL);
        let s = format!("{}", ev);
        assert!(s.starts_with("Event::Key"));
        assert!(!s.contains('\n'));
    }
}
