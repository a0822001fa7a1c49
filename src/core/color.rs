// (C) 2025 - Enzo Lombardi

//! Color model and palette conversions.
//!
//! Colors come in four flavors: the terminal default, the basic 8-color
//! palette, the xterm 256-color palette, and 24-bit RGB. Every conversion
//! is total; degrading a color for a less capable terminal never fails.
//!
//! The 256-color palette is structured as 16 basic entries, a 6x6x6 color
//! cube (16..=231), and a 24-step grayscale ramp (232..=255).

/// A terminal color.
///
/// # Examples
///
/// ```
/// use termgrid::core::color::Color;
///
/// let red = Color::Basic(1);
/// let orange = Color::Rgb(255, 165, 0);
/// assert_eq!(Color::from_hex("#ffa500"), Some(orange));
/// assert_eq!(orange.to_indexed(), Color::Indexed(214));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// The terminal's configured default foreground/background.
    Default,
    /// Basic palette entry 0-7 (black, red, green, yellow, blue, magenta, cyan, white).
    Basic(u8),
    /// xterm 256-color palette entry.
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

// Levels used by the 6x6x6 cube, both directions.
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

// The standard VGA-ish palette for entries 0-15.
const BASIC_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

impl Color {
    pub const BLACK: Color = Color::Basic(0);
    pub const RED: Color = Color::Basic(1);
    pub const GREEN: Color = Color::Basic(2);
    pub const YELLOW: Color = Color::Basic(3);
    pub const BLUE: Color = Color::Basic(4);
    pub const MAGENTA: Color = Color::Basic(5);
    pub const CYAN: Color = Color::Basic(6);
    pub const WHITE: Color = Color::Basic(7);

    /// Parses `#RGB` or `#RRGGBB`, with or without the leading `#`.
    ///
    /// Returns `None` when the string is not a hex color.
    pub fn from_hex(s: &str) -> Option<Color> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let mut it = hex.chars().map(|c| c.to_digit(16).unwrap_or(0) as u8);
                let (r, g, b) = (it.next()?, it.next()?, it.next()?);
                // 0xF -> 0xFF, 0xA -> 0xAA
                Some(Color::Rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Color::Rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Projects this color into the 256-color palette.
    ///
    /// RGB values go through the 6x6x6 cube, or the grayscale ramp when all
    /// three channels are equal. `Default` and indexed colors pass through.
    pub fn to_indexed(self) -> Color {
        match self {
            Color::Rgb(r, g, b) => Color::Indexed(rgb_to_256(r, g, b)),
            Color::Basic(n) => Color::Indexed(n & 0x07),
            other => other,
        }
    }

    /// Expands this color to an RGB triple.
    ///
    /// `Default` has no device-independent value and maps to white.
    pub fn to_rgb(self) -> (u8, u8, u8) {
        match self {
            Color::Default => (255, 255, 255),
            Color::Basic(n) => BASIC_RGB[(n & 0x07) as usize],
            Color::Indexed(code) => index_to_rgb(code),
            Color::Rgb(r, g, b) => (r, g, b),
        }
    }

    /// Degrades this color to the basic 8-color palette.
    ///
    /// Uses dominant-channel classification: each channel at or above half
    /// intensity contributes its primary to the result.
    pub fn to_basic(self) -> Color {
        match self {
            Color::Default => Color::Default,
            Color::Basic(n) => Color::Basic(n & 0x07),
            other => {
                let (r, g, b) = other.to_rgb();
                let mut idx = 0u8;
                if r >= 128 {
                    idx |= 0x01;
                }
                if g >= 128 {
                    idx |= 0x02;
                }
                if b >= 128 {
                    idx |= 0x04;
                }
                Color::Basic(idx)
            }
        }
    }
}

/// Maps an RGB triple onto the 256-color palette.
///
/// Equal channels take the 24-step grayscale ramp; everything else takes
/// the nearest 6x6x6 cube entry.
pub fn rgb_to_256(r: u8, g: u8, b: u8) -> u8 {
    if r == g && g == b {
        if r < 8 {
            return 16; // cube black
        }
        if r > 248 {
            return 231; // cube white
        }
        return 232 + (r - 8) / 10;
    }
    let q = |v: u8| -> u8 { ((u16::from(v) * 5 + 127) / 255) as u8 };
    16 + 36 * q(r) + 6 * q(g) + q(b)
}

/// Expands a 256-color palette entry to RGB.
pub fn index_to_rgb(code: u8) -> (u8, u8, u8) {
    match code {
        0..=15 => BASIC_RGB[code as usize],
        16..=231 => {
            let c = code - 16;
            (
                CUBE_LEVELS[(c / 36) as usize],
                CUBE_LEVELS[((c / 6) % 6) as usize],
                CUBE_LEVELS[(c % 6) as usize],
            )
        }
        232..=255 => {
            let v = 8 + 10 * (code - 232);
            (v, v, v)
        }
    }
}
