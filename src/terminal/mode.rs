// (C) 2025 - Enzo Lombardi

//! Terminal processing modes.

use bitflags::bitflags;

bitflags! {
    /// Input/output processing rules, as a composable bitset.
    ///
    /// The named presets cover the useful corners of the space:
    ///
    /// | preset       | line buffering | echo | signals |
    /// |--------------|----------------|------|---------|
    /// | [`RAW`]      | no             | no   | no      |
    /// | [`COOKED`]   | yes            | yes  | yes     |
    /// | [`CBREAK`]   | no             | yes  | yes     |
    /// | [`PASSWORD`] | yes            | no   | yes     |
    /// | [`SEMI_RAW`] | no             | no   | yes     |
    ///
    /// [`ALT_SCREEN`] rides alongside: it records whether the alternate
    /// screen is part of the mode, so restoring a mode also restores the
    /// screen the user was looking at.
    ///
    /// [`RAW`]: TerminalMode::RAW
    /// [`COOKED`]: TerminalMode::COOKED
    /// [`CBREAK`]: TerminalMode::CBREAK
    /// [`PASSWORD`]: TerminalMode::PASSWORD
    /// [`SEMI_RAW`]: TerminalMode::SEMI_RAW
    /// [`ALT_SCREEN`]: TerminalMode::ALT_SCREEN
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TerminalMode: u8 {
        /// The driver assembles complete lines before delivering input.
        const LINE_BUFFERED = 0x01;
        /// Typed characters are echoed back by the driver.
        const ECHO = 0x02;
        /// Ctrl+C / Ctrl+Z and friends generate signals.
        const SIGNALS = 0x04;
        /// The alternate screen buffer is active.
        const ALT_SCREEN = 0x08;
    }
}

impl TerminalMode {
    /// Every keystroke delivered immediately, nothing echoed, no signals.
    pub const RAW: TerminalMode = TerminalMode::empty();
    /// The shell-style default.
    pub const COOKED: TerminalMode = TerminalMode::LINE_BUFFERED
        .union(TerminalMode::ECHO)
        .union(TerminalMode::SIGNALS);
    /// Character-at-a-time input with echo and signals left on.
    pub const CBREAK: TerminalMode = TerminalMode::ECHO.union(TerminalMode::SIGNALS);
    /// Line input with echo suppressed.
    pub const PASSWORD: TerminalMode = TerminalMode::LINE_BUFFERED.union(TerminalMode::SIGNALS);
    /// Raw input that still lets the kernel deliver keyboard signals.
    pub const SEMI_RAW: TerminalMode = TerminalMode::SIGNALS;

    /// Whether this mode delivers input character by character.
    pub fn is_character_mode(self) -> bool {
        !self.contains(TerminalMode::LINE_BUFFERED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_distinct() {
        let presets = [
            TerminalMode::RAW,
            TerminalMode::COOKED,
            TerminalMode::CBREAK,
            TerminalMode::PASSWORD,
            TerminalMode::SEMI_RAW,
        ];
        for (i, a) in presets.iter().enumerate() {
            for b in &presets[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn character_mode_detection() {
        assert!(TerminalMode::RAW.is_character_mode());
        assert!(TerminalMode::CBREAK.is_character_mode());
        assert!(!TerminalMode::COOKED.is_character_mode());
        assert!(!TerminalMode::PASSWORD.is_character_mode());
    }
}
