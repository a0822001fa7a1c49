// (C) 2025 - Enzo Lombardi

//! Terminal capability resolution.
//!
//! A [`Db`] is the immutable result of decoding a compiled terminfo entry
//! (or of falling back to the [built-in table](builtin) when no database
//! is available). Callers look capabilities up by short name (`cup`,
//! `setaf`, `smcup`) and expand parametrized strings through the
//! [`param`] stack machine.
//!
//! Locating terminfo files on disk is the embedding application's job:
//! the decoder consumes bytes, wherever they came from.

pub mod param;
pub mod parser;

mod builtin;
mod names;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::core::error::{Error, Result};

use param::{Param, StaticVars};

/// An immutable capability store for one terminal type.
///
/// # Examples
///
/// ```
/// use termgrid::terminfo::Db;
/// use termgrid::terminfo::param::Param;
///
/// let db = Db::fallback("xterm-256color");
/// let cup = db.expand("cup", &[Param::Int(4), Param::Int(9)]).unwrap();
/// assert_eq!(cup, b"\x1b[5;10H");
/// ```
pub struct Db {
    term: String,
    flags: HashSet<String>,
    numbers: HashMap<String, i32>,
    strings: HashMap<String, Vec<u8>>,
    sync: bool,
    statics: Mutex<StaticVars>,
}

impl Db {
    /// Decodes a compiled terminfo blob for the named terminal.
    ///
    /// # Errors
    ///
    /// Propagates the decoder's parse errors. Callers typically recover
    /// with [`Db::fallback`].
    pub fn from_bytes(term: &str, bytes: &[u8]) -> Result<Self> {
        let parsed = parser::parse(bytes)?;
        Ok(Self {
            term: term.to_string(),
            flags: parsed.flags,
            numbers: parsed.numbers,
            strings: parsed.strings,
            sync: builtin::supports_sync(term),
            statics: Mutex::new(StaticVars::default()),
        })
    }

    /// Builds a store from the built-in table for the named terminal.
    pub fn fallback(term: &str) -> Self {
        let entry = builtin::lookup(term);
        log::warn!(
            "no terminfo data for {:?}, using built-in {} entry",
            term,
            entry.name
        );
        Self {
            term: term.to_string(),
            flags: entry.flags.iter().map(|s| (*s).to_string()).collect(),
            numbers: entry
                .numbers
                .iter()
                .map(|(n, v)| ((*n).to_string(), *v))
                .collect(),
            strings: entry
                .strings
                .iter()
                .map(|(n, v)| ((*n).to_string(), v.to_vec()))
                .collect(),
            sync: builtin::supports_sync(term),
            statics: Mutex::new(StaticVars::default()),
        }
    }

    /// Builds a store for `$TERM` from the built-in table.
    ///
    /// Reading compiled entries off disk belongs to the embedding
    /// application; this constructor is the zero-configuration path.
    pub fn from_env() -> Self {
        let term = std::env::var("TERM").unwrap_or_else(|_| "ansi".to_string());
        Self::fallback(&term)
    }

    /// The terminal name this store was built for.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Looks up a boolean capability.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    /// Looks up a numeric capability.
    pub fn number(&self, name: &str) -> Option<i32> {
        self.numbers.get(name).copied()
    }

    /// Looks up a string capability's raw (unexpanded) bytes.
    pub fn string(&self, name: &str) -> Option<&[u8]> {
        self.strings.get(name).map(Vec::as_slice)
    }

    /// Looks up a string capability, failing with `CapabilityMissing`.
    pub fn require(&self, name: &str) -> Result<&[u8]> {
        self.string(name)
            .ok_or_else(|| Error::capability_missing(name))
    }

    /// Expands a parametrized string capability.
    ///
    /// # Errors
    ///
    /// `CapabilityMissing` when the name is not in the store.
    pub fn expand(&self, name: &str, params: &[Param]) -> Result<Vec<u8>> {
        let cap = self.require(name)?;
        let mut statics = self
            .statics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(param::expand(cap, params, &mut statics))
    }

    /// Whether the terminal understands synchronized updates (mode 2026).
    pub fn supports_sync(&self) -> bool {
        self.sync
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("term", &self.term)
            .field("flags", &self.flags.len())
            .field("numbers", &self.numbers.len())
            .field("strings", &self.strings.len())
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::parser::test_blob::build_16;
    use super::*;

    #[test]
    fn db_from_parsed_blob() {
        let blob = build_16(
            "xterm-256color",
            &[1],
            &[(0, 132), (2, 50), (13, 256)],
            &[
                (10, b"\x1b[%i%p1%d;%p2%dH"),
                (28, b"\x1b[?1049h"),
                (40, b"\x1b[?1049l"),
            ],
        );
        let db = Db::from_bytes("xterm-256color", &blob).unwrap();
        assert_eq!(db.term(), "xterm-256color");
        assert!(db.flag("am"));
        assert_eq!(db.number("cols"), Some(132));
        assert_eq!(db.number("lines"), Some(50));
        assert_eq!(db.string("smcup"), Some(b"\x1b[?1049h".as_slice()));
        assert!(db.supports_sync());
    }

    #[test]
    fn cup_expansion_through_store() {
        let db = Db::fallback("xterm");
        assert_eq!(
            db.expand("cup", &[Param::Int(4), Param::Int(9)]).unwrap(),
            b"\x1b[5;10H"
        );
        assert_eq!(
            db.expand("cup", &[Param::Int(0), Param::Int(0)]).unwrap(),
            b"\x1b[1;1H"
        );
    }

    #[test]
    fn missing_capability_is_typed() {
        let db = Db::fallback("ansi");
        let err = db.expand("smcup", &[]).unwrap_err();
        assert!(err.is_capability_missing());
    }

    #[test]
    fn fallback_degrades_colors_by_family() {
        assert_eq!(Db::fallback("xterm-256color").number("colors"), Some(256));
        assert_eq!(Db::fallback("xterm").number("colors"), Some(8));
        assert_eq!(Db::fallback("unheard-of-term").number("colors"), Some(8));
    }

    #[test]
    fn setaf_expansion_through_fallback() {
        let db = Db::fallback("xterm-256color");
        assert_eq!(
            db.expand("setaf", &[Param::Int(196)]).unwrap(),
            b"\x1b[38;5;196m"
        );
        assert_eq!(db.expand("setaf", &[Param::Int(3)]).unwrap(), b"\x1b[33m");
    }
}
