// (C) 2025 - Enzo Lombardi

//! Text styling - attribute flags and the foreground/background/attribute triple.

use bitflags::bitflags;

use super::color::Color;

bitflags! {
    /// SGR text attributes. Combinations are commutative.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attribute: u16 {
        const BOLD          = 0x0001;
        const DIM           = 0x0002;
        const ITALIC        = 0x0004;
        const UNDERLINE     = 0x0008;
        const BLINK         = 0x0010;
        const REVERSE       = 0x0020;
        const HIDDEN        = 0x0040;
        const STRIKETHROUGH = 0x0080;
    }
}

impl Attribute {
    /// The SGR parameter that switches this single attribute on.
    ///
    /// Only meaningful for single-flag values; composite sets are emitted
    /// flag by flag.
    pub(crate) fn sgr_code(self) -> Option<u8> {
        match self {
            Attribute::BOLD => Some(1),
            Attribute::DIM => Some(2),
            Attribute::ITALIC => Some(3),
            Attribute::UNDERLINE => Some(4),
            Attribute::BLINK => Some(5),
            Attribute::REVERSE => Some(7),
            Attribute::HIDDEN => Some(8),
            Attribute::STRIKETHROUGH => Some(9),
            _ => None,
        }
    }
}

/// The visual style of a cell: colors plus attribute flags.
///
/// # Examples
///
/// ```
/// use termgrid::core::color::Color;
/// use termgrid::core::style::{Attribute, Style};
///
/// let plain = Style::default();
/// let alert = Style::new(Color::RED, Color::Default, Attribute::BOLD);
/// assert_ne!(plain, alert);
/// assert_eq!(alert.with_attr(Attribute::UNDERLINE).attrs,
///            Attribute::BOLD | Attribute::UNDERLINE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attribute,
}

impl Style {
    pub const fn new(fg: Color, bg: Color, attrs: Attribute) -> Self {
        Self { fg, bg, attrs }
    }

    /// Returns this style with an additional attribute flag.
    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attrs |= attr;
        self
    }

    /// Returns this style with the given foreground.
    pub fn with_fg(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }

    /// Returns this style with the given background.
    pub fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attribute::empty(),
        }
    }
}
