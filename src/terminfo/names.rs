// (C) 2025 - Enzo Lombardi

//! Capability index tables.
//!
//! Terminfo stores capabilities by position; the short names below follow
//! the ncurses section ordering. The decoder resolves positions through
//! these tables and silently skips indices it does not recognise, so a
//! database compiled with more capabilities than we know about still
//! parses.

/// Boolean capabilities, by section index.
pub(crate) const BOOL_NAMES: &[&str] = &[
    "bw", "am", "xsb", "xhp", "xenl", "eo", "gn", "hc", "km", "hs", "in", "da", "db", "mir",
    "msgr", "os", "eslok", "xt", "hz", "ul", "xon", "nxon", "mc5i", "chts", "nrrmc", "npc",
    "ndscr", "ccc", "bce", "hls", "xhpa", "crxm", "daisy", "xvpa", "sam", "cpix", "lpix",
];

/// Numeric capabilities, by section index.
pub(crate) const NUM_NAMES: &[&str] = &[
    "cols", "it", "lines", "lm", "xmc", "pb", "vt", "wsl", "nlab", "lh", "lw", "ma", "wnum",
    "colors", "pairs", "ncv",
];

/// String capabilities as `(section index, short name)` pairs.
///
/// The table is sparse: the contiguous motion/attribute block at the
/// start, the keypad transmit pair, and the color setters further out.
/// Key-cap entries are absent: input decoding does not read them from
/// terminfo.
pub(crate) const STRING_NAMES: &[(usize, &str)] = &[
    (0, "cbt"),
    (1, "bel"),
    (2, "cr"),
    (3, "csr"),
    (4, "tbc"),
    (5, "clear"),
    (6, "el"),
    (7, "ed"),
    (8, "hpa"),
    (9, "cmdch"),
    (10, "cup"),
    (11, "cud1"),
    (12, "home"),
    (13, "civis"),
    (14, "cub1"),
    (15, "mrcup"),
    (16, "cnorm"),
    (17, "cuf1"),
    (18, "ll"),
    (19, "cuu1"),
    (20, "cvvis"),
    (21, "dch1"),
    (22, "dl1"),
    (23, "dsl"),
    (24, "hd"),
    (25, "smacs"),
    (26, "blink"),
    (27, "bold"),
    (28, "smcup"),
    (29, "smdc"),
    (30, "dim"),
    (31, "smir"),
    (32, "invis"),
    (33, "prot"),
    (34, "rev"),
    (35, "smso"),
    (36, "smul"),
    (37, "ech"),
    (38, "rmacs"),
    (39, "sgr0"),
    (40, "rmcup"),
    (41, "rmdc"),
    (42, "rmir"),
    (43, "rmso"),
    (44, "rmul"),
    (45, "flash"),
    (88, "rmkx"),
    (89, "smkx"),
    (105, "vpa"),
    (359, "setaf"),
    (360, "setab"),
];

/// Looks up the short name for a string-section index.
pub(crate) fn string_name(index: usize) -> Option<&'static str> {
    STRING_NAMES
        .iter()
        .find(|(i, _)| *i == index)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_indices() {
        assert_eq!(string_name(10), Some("cup"));
        assert_eq!(string_name(28), Some("smcup"));
        assert_eq!(string_name(40), Some("rmcup"));
        assert_eq!(string_name(39), Some("sgr0"));
        assert_eq!(string_name(359), Some("setaf"));
        assert_eq!(string_name(1000), None);
    }

    #[test]
    fn numeric_table_has_geometry_and_colors() {
        assert_eq!(NUM_NAMES[0], "cols");
        assert_eq!(NUM_NAMES[2], "lines");
        assert_eq!(NUM_NAMES[13], "colors");
    }
}
