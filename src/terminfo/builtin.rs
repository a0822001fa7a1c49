// (C) 2025 - Enzo Lombardi

//! Built-in capability fallbacks.
//!
//! When no compiled database is available (minimal containers, initramfs,
//! a hostile `TERM`), the toolkit still has to draw. The entries below
//! cover the terminals that matter in practice; everything else degrades
//! to the ANSI baseline.

/// A hard-coded capability set for one terminal family.
pub(crate) struct BuiltinEntry {
    pub(crate) name: &'static str,
    pub(crate) flags: &'static [&'static str],
    pub(crate) numbers: &'static [(&'static str, i32)],
    pub(crate) strings: &'static [(&'static str, &'static [u8])],
}

// Shared by every entry: plain ECMA-48 plus the DEC private modes.
const ANSI_STRINGS: &[(&str, &[u8])] = &[
    ("bel", b"\x07"),
    ("cr", b"\r"),
    ("clear", b"\x1b[H\x1b[2J"),
    ("el", b"\x1b[K"),
    ("ed", b"\x1b[J"),
    ("home", b"\x1b[H"),
    ("cup", b"\x1b[%i%p1%d;%p2%dH"),
    ("hpa", b"\x1b[%i%p1%dG"),
    ("vpa", b"\x1b[%i%p1%dd"),
    ("cuu1", b"\x1b[A"),
    ("cud1", b"\n"),
    ("cuf1", b"\x1b[C"),
    ("cub1", b"\x08"),
    ("civis", b"\x1b[?25l"),
    ("cnorm", b"\x1b[?25h"),
    ("sgr0", b"\x1b[0m"),
    ("bold", b"\x1b[1m"),
    ("dim", b"\x1b[2m"),
    ("smul", b"\x1b[4m"),
    ("blink", b"\x1b[5m"),
    ("rev", b"\x1b[7m"),
    ("setaf", b"\x1b[3%p1%dm"),
    ("setab", b"\x1b[4%p1%dm"),
];

const XTERM_STRINGS: &[(&str, &[u8])] = &[
    ("bel", b"\x07"),
    ("cr", b"\r"),
    ("clear", b"\x1b[H\x1b[2J"),
    ("el", b"\x1b[K"),
    ("ed", b"\x1b[J"),
    ("home", b"\x1b[H"),
    ("cup", b"\x1b[%i%p1%d;%p2%dH"),
    ("hpa", b"\x1b[%i%p1%dG"),
    ("vpa", b"\x1b[%i%p1%dd"),
    ("cuu1", b"\x1b[A"),
    ("cud1", b"\n"),
    ("cuf1", b"\x1b[C"),
    ("cub1", b"\x08"),
    ("civis", b"\x1b[?25l"),
    ("cnorm", b"\x1b[?25h"),
    ("smcup", b"\x1b[?1049h"),
    ("rmcup", b"\x1b[?1049l"),
    ("smkx", b"\x1b[?1h\x1b="),
    ("rmkx", b"\x1b[?1l\x1b>"),
    ("sgr0", b"\x1b[0m"),
    ("bold", b"\x1b[1m"),
    ("dim", b"\x1b[2m"),
    ("smul", b"\x1b[4m"),
    ("blink", b"\x1b[5m"),
    ("rev", b"\x1b[7m"),
    ("flash", b"\x1b[?5h\x1b[?5l"),
    ("setaf", b"\x1b[%?%p1%{8}%<%t3%p1%d%e38;5;%p1%d%;m"),
    ("setab", b"\x1b[%?%p1%{8}%<%t4%p1%d%e48;5;%p1%d%;m"),
];

const SCREEN_STRINGS: &[(&str, &[u8])] = &[
    ("bel", b"\x07"),
    ("cr", b"\r"),
    ("clear", b"\x1b[H\x1b[J"),
    ("el", b"\x1b[K"),
    ("ed", b"\x1b[J"),
    ("home", b"\x1b[H"),
    ("cup", b"\x1b[%i%p1%d;%p2%dH"),
    ("cuu1", b"\x1bM"),
    ("cud1", b"\n"),
    ("cuf1", b"\x1b[C"),
    ("cub1", b"\x08"),
    ("civis", b"\x1b[?25l"),
    ("cnorm", b"\x1b[34h\x1b[?25h"),
    ("smcup", b"\x1b[?1049h"),
    ("rmcup", b"\x1b[?1049l"),
    ("smkx", b"\x1b[?1h\x1b="),
    ("rmkx", b"\x1b[?1l\x1b>"),
    ("sgr0", b"\x1b[m"),
    ("bold", b"\x1b[1m"),
    ("dim", b"\x1b[2m"),
    ("smul", b"\x1b[4m"),
    ("blink", b"\x1b[5m"),
    ("rev", b"\x1b[7m"),
    ("setaf", b"\x1b[3%p1%dm"),
    ("setab", b"\x1b[4%p1%dm"),
];

const LINUX_STRINGS: &[(&str, &[u8])] = &[
    ("bel", b"\x07"),
    ("cr", b"\r"),
    ("clear", b"\x1b[H\x1b[J"),
    ("el", b"\x1b[K"),
    ("ed", b"\x1b[J"),
    ("home", b"\x1b[H"),
    ("cup", b"\x1b[%i%p1%d;%p2%dH"),
    ("cuu1", b"\x1b[A"),
    ("cud1", b"\n"),
    ("cuf1", b"\x1b[C"),
    ("cub1", b"\x08"),
    ("civis", b"\x1b[?25l\x1b[?1c"),
    ("cnorm", b"\x1b[?25h\x1b[?0c"),
    ("sgr0", b"\x1b[0m"),
    ("bold", b"\x1b[1m"),
    ("dim", b"\x1b[2m"),
    ("smul", b"\x1b[4m"),
    ("blink", b"\x1b[5m"),
    ("rev", b"\x1b[7m"),
    ("setaf", b"\x1b[3%p1%dm"),
    ("setab", b"\x1b[4%p1%dm"),
];

const ENTRIES: &[BuiltinEntry] = &[
    BuiltinEntry {
        name: "xterm-256color",
        flags: &["am", "xenl", "bce", "km", "sync"],
        numbers: &[("cols", 80), ("lines", 24), ("colors", 256), ("pairs", 65536)],
        strings: XTERM_STRINGS,
    },
    BuiltinEntry {
        name: "xterm",
        flags: &["am", "xenl", "km"],
        numbers: &[("cols", 80), ("lines", 24), ("colors", 8), ("pairs", 64)],
        strings: XTERM_STRINGS,
    },
    BuiltinEntry {
        name: "screen-256color",
        flags: &["am", "xenl", "km"],
        numbers: &[("cols", 80), ("lines", 24), ("colors", 256), ("pairs", 65536)],
        strings: SCREEN_STRINGS,
    },
    BuiltinEntry {
        name: "screen",
        flags: &["am", "xenl", "km"],
        numbers: &[("cols", 80), ("lines", 24), ("colors", 8), ("pairs", 64)],
        strings: SCREEN_STRINGS,
    },
    BuiltinEntry {
        name: "linux",
        flags: &["am", "bce"],
        numbers: &[("cols", 80), ("lines", 25), ("colors", 8), ("pairs", 64)],
        strings: LINUX_STRINGS,
    },
    BuiltinEntry {
        name: "ansi",
        flags: &["am"],
        numbers: &[("cols", 80), ("lines", 24), ("colors", 8), ("pairs", 64)],
        strings: ANSI_STRINGS,
    },
];

// Modern terminals that implement synchronized updates (mode 2026) and
// usually advertise an xterm-flavored TERM.
const SYNC_FAMILIES: &[&str] = &[
    "xterm-256color",
    "xterm-kitty",
    "tmux-256color",
    "st-256color",
    "alacritty",
    "foot",
    "wezterm",
    "ghostty",
    "contour",
];

/// Selects the fallback entry for a terminal name.
///
/// Exact matches win; otherwise the family prefix decides, and anything
/// unrecognised gets the ANSI baseline.
pub(crate) fn lookup(term: &str) -> &'static BuiltinEntry {
    if let Some(entry) = ENTRIES.iter().find(|e| e.name == term) {
        return entry;
    }
    let family = if term.contains("256color") || term.contains("truecolor") {
        if term.starts_with("screen") || term.starts_with("tmux") {
            "screen-256color"
        } else {
            "xterm-256color"
        }
    } else if term.starts_with("screen") || term.starts_with("tmux") {
        "screen"
    } else if term.starts_with("xterm") || term.starts_with("rxvt") {
        "xterm"
    } else if term.starts_with("linux") {
        "linux"
    } else {
        "ansi"
    };
    ENTRIES
        .iter()
        .find(|e| e.name == family)
        .unwrap_or(&ENTRIES[ENTRIES.len() - 1])
}

/// Whether this terminal family understands synchronized updates.
pub(crate) fn supports_sync(term: &str) -> bool {
    SYNC_FAMILIES
        .iter()
        .any(|f| term == *f || term.starts_with(&format!("{}-", f)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_family_lookup() {
        assert_eq!(lookup("xterm-256color").name, "xterm-256color");
        assert_eq!(lookup("xterm-kitty").name, "xterm");
        assert_eq!(lookup("tmux-256color").name, "screen-256color");
        assert_eq!(lookup("linux").name, "linux");
        assert_eq!(lookup("dumb").name, "ansi");
        assert_eq!(lookup("").name, "ansi");
    }

    #[test]
    fn every_entry_can_move_and_clear() {
        for entry in ENTRIES {
            let has = |name: &str| entry.strings.iter().any(|(n, _)| *n == name);
            assert!(has("cup"), "{} lacks cup", entry.name);
            assert!(has("clear"), "{} lacks clear", entry.name);
            assert!(has("sgr0"), "{} lacks sgr0", entry.name);
        }
    }

    #[test]
    fn sync_detection() {
        assert!(supports_sync("xterm-256color"));
        assert!(supports_sync("alacritty"));
        assert!(supports_sync("foot"));
        assert!(!supports_sync("xterm"));
        assert!(!supports_sync("linux"));
    }
}
