// (C) 2025 - Enzo Lombardi

//! Binary terminfo decoder.
//!
//! Understands the classic 16-bit format (magic `0o432`) and the extended
//! 32-bit format. The extended magic is 542 *decimal* - reading it as
//! octal is a classic porting bug and silently rejects every modern
//! database.
//!
//! Layout after the six-short header: the terminal names section, one
//! byte per boolean, an alignment pad, the numeric section (16- or 32-bit
//! per the magic), 16-bit string offsets, and finally the string table.

use std::collections::{HashMap, HashSet};

use crate::core::error::{Error, ParseErrorKind, Result};

use super::names::{string_name, BOOL_NAMES, NUM_NAMES};

/// Magic for the classic format with 16-bit numerics.
const MAGIC_16: u16 = 0o432;
/// Magic for the extended format with 32-bit numerics. Decimal, not octal.
const MAGIC_32: u16 = 542;

/// The header is six little-endian 16-bit integers.
const HEADER_LEN: usize = 12;

const MAX_NAMES_LEN: usize = 4096;
const MAX_COUNT: usize = 512;
const MAX_STRING_TABLE: usize = 65536;

/// Everything recognised from one compiled terminfo entry.
#[derive(Debug, Default)]
pub struct Parsed {
    /// First `|`-separated field of the names section.
    pub name: String,
    pub flags: HashSet<String>,
    pub numbers: HashMap<String, i32>,
    pub strings: HashMap<String, Vec<u8>>,
}

/// Decodes a compiled terminfo blob.
///
/// Unknown capability positions are skipped, absent and cancelled values
/// are omitted; only structural damage is an error.
///
/// # Errors
///
/// [`ParseErrorKind::TruncatedData`] when the input is shorter than a
/// section it declares, [`ParseErrorKind::InvalidMagic`] for an unknown
/// magic number, and [`ParseErrorKind::InvalidHeader`] when a header
/// field is negative or beyond its sanity limit.
pub fn parse(bytes: &[u8]) -> Result<Parsed> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::parse(
            ParseErrorKind::TruncatedData,
            format!(
                "{} bytes is too short for a terminfo header (expected at least {} bytes)",
                bytes.len(),
                HEADER_LEN
            ),
        ));
    }

    let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
    let num_width = match magic {
        MAGIC_16 => 2,
        MAGIC_32 => 4,
        other => {
            return Err(Error::parse(
                ParseErrorKind::InvalidMagic,
                format!("magic {:#o} is neither {:#o} nor 542", other, MAGIC_16),
            ));
        }
    };

    let names_len = header_field(bytes, 1, "names section length", MAX_NAMES_LEN)?;
    let bool_count = header_field(bytes, 2, "boolean count", MAX_COUNT)?;
    let num_count = header_field(bytes, 3, "numeric count", MAX_COUNT)?;
    let str_count = header_field(bytes, 4, "string count", MAX_COUNT)?;
    let table_len = header_field(bytes, 5, "string table size", MAX_STRING_TABLE)?;

    let names_end = HEADER_LEN + names_len;
    let bools_end = names_end + bool_count;
    // Numerics are aligned to an even offset.
    let nums_start = bools_end + (bools_end & 1);
    let nums_end = nums_start + num_count * num_width;
    let offsets_end = nums_end + str_count * 2;
    let total = offsets_end + table_len;

    if bytes.len() < total {
        return Err(Error::parse(
            ParseErrorKind::TruncatedData,
            format!("sections need {} bytes, got {}", total, bytes.len()),
        ));
    }

    let mut parsed = Parsed::default();

    let names = &bytes[HEADER_LEN..names_end];
    let names = names.split(|&b| b == 0).next().unwrap_or(names);
    parsed.name = String::from_utf8_lossy(names)
        .split('|')
        .next()
        .unwrap_or_default()
        .to_string();

    for (i, &value) in bytes[names_end..bools_end].iter().enumerate() {
        if value == 1 {
            if let Some(name) = BOOL_NAMES.get(i) {
                parsed.flags.insert((*name).to_string());
            }
        }
    }

    for i in 0..num_count {
        let off = nums_start + i * num_width;
        let value = if num_width == 2 {
            i64::from(i16::from_le_bytes([bytes[off], bytes[off + 1]]))
        } else {
            i64::from(i32::from_le_bytes([
                bytes[off],
                bytes[off + 1],
                bytes[off + 2],
                bytes[off + 3],
            ]))
        };
        // -1 means absent, -2 means cancelled.
        if value >= 0 {
            if let Some(name) = NUM_NAMES.get(i) {
                parsed.numbers.insert((*name).to_string(), value as i32);
            }
        }
    }

    let table = &bytes[offsets_end..total];
    for i in 0..str_count {
        let off = nums_end + i * 2;
        let value = i16::from_le_bytes([bytes[off], bytes[off + 1]]);
        if value < 0 {
            continue;
        }
        let Some(name) = string_name(i) else {
            continue;
        };
        let start = value as usize;
        if start >= table.len() {
            continue;
        }
        let end = table[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(table.len(), |p| start + p);
        parsed
            .strings
            .insert(name.to_string(), table[start..end].to_vec());
    }

    Ok(parsed)
}

/// Decodes only the named string capabilities from a blob.
///
/// The result contains an entry for each requested name that the blob
/// defines; unknown or absent names are silently omitted.
pub fn parse_strings(bytes: &[u8], wanted: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
    let mut parsed = parse(bytes)?;
    let mut out = HashMap::new();
    for &name in wanted {
        if let Some(value) = parsed.strings.remove(name) {
            out.insert(name.to_string(), value);
        }
    }
    Ok(out)
}

fn header_field(bytes: &[u8], index: usize, what: &str, limit: usize) -> Result<usize> {
    let off = index * 2;
    let value = i16::from_le_bytes([bytes[off], bytes[off + 1]]);
    if value < 0 {
        return Err(Error::parse(
            ParseErrorKind::InvalidHeader,
            format!("{} is negative ({})", what, value),
        ));
    }
    let value = value as usize;
    if value > limit {
        return Err(Error::parse(
            ParseErrorKind::InvalidHeader,
            format!("{} {} exceeds limit {}", what, value, limit),
        ));
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod test_blob {
    //! Builder for synthetic compiled entries used across the test suite.

    /// Assembles a compiled terminfo entry in the classic 16-bit format.
    pub(crate) fn build_16(
        name: &str,
        flags: &[usize],
        numbers: &[(usize, i16)],
        strings: &[(usize, &[u8])],
    ) -> Vec<u8> {
        build(name, flags, numbers, strings, false)
    }

    /// Assembles a compiled entry in the extended 32-bit format.
    pub(crate) fn build_32(
        name: &str,
        flags: &[usize],
        numbers: &[(usize, i16)],
        strings: &[(usize, &[u8])],
    ) -> Vec<u8> {
        build(name, flags, numbers, strings, true)
    }

    fn build(
        name: &str,
        flags: &[usize],
        numbers: &[(usize, i16)],
        strings: &[(usize, &[u8])],
        wide: bool,
    ) -> Vec<u8> {
        let bool_count = flags.iter().copied().max().map_or(0, |m| m + 1);
        let num_count = numbers.iter().map(|(i, _)| *i).max().map_or(0, |m| m + 1);
        let str_count = strings.iter().map(|(i, _)| *i).max().map_or(0, |m| m + 1);

        let mut table: Vec<u8> = Vec::new();
        let mut offsets = vec![-1i16; str_count];
        for (i, value) in strings {
            offsets[*i] = table.len() as i16;
            table.extend_from_slice(value);
            table.push(0);
        }

        let names = format!("{}|synthetic entry", name);
        let mut out = Vec::new();
        let magic: u16 = if wide { 542 } else { 0o432 };
        out.extend_from_slice(&magic.to_le_bytes());
        out.extend_from_slice(&((names.len() + 1) as i16).to_le_bytes());
        out.extend_from_slice(&(bool_count as i16).to_le_bytes());
        out.extend_from_slice(&(num_count as i16).to_le_bytes());
        out.extend_from_slice(&(str_count as i16).to_le_bytes());
        out.extend_from_slice(&(table.len() as i16).to_le_bytes());

        out.extend_from_slice(names.as_bytes());
        out.push(0);

        let mut bools = vec![0u8; bool_count];
        for &i in flags {
            bools[i] = 1;
        }
        out.extend_from_slice(&bools);

        if out.len() & 1 == 1 {
            out.push(0);
        }

        let mut nums = vec![-1i64; num_count];
        for (i, v) in numbers {
            nums[*i] = i64::from(*v);
        }
        for v in nums {
            if wide {
                out.extend_from_slice(&(v as i32).to_le_bytes());
            } else {
                out.extend_from_slice(&(v as i16).to_le_bytes());
            }
        }

        for off in offsets {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&table);
        out
    }
}
