// (C) 2025 - Enzo Lombardi

//! Parametrized-capability evaluator (the machine behind `tparm`).
//!
//! Capability strings interleave literal bytes with `%`-operations over a
//! small stack machine: nine positional parameters, twenty-six static
//! variables (`A`..`Z`, persisting across calls against the same
//! database) and twenty-six dynamic variables (`a`..`z`, per call).
//!
//! The evaluator is total. Malformed operations expand to nothing,
//! division by zero pushes zero, and popping an empty stack yields zero;
//! a corrupt capability can produce garbage bytes but never a panic.

use std::fmt::Write as _;

/// A positional parameter: terminfo capabilities take integers or strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Str(Vec<u8>),
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<u16> for Param {
    fn from(v: u16) -> Self {
        Param::Int(i64::from(v))
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(i64::from(v))
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Str(v.as_bytes().to_vec())
    }
}

/// Static variable storage (`A`..`Z`). One per capability database.
#[derive(Debug, Default)]
pub struct StaticVars {
    values: [Option<Param>; 26],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Minus,
    Plus,
    Space,
    Hash,
}

#[derive(Debug, Default)]
struct FormatSpec {
    flags: Vec<Flag>,
    width: usize,
    precision: Option<usize>,
    leading_zero: bool,
}

struct Machine<'a> {
    params: [Param; 9],
    stack: Vec<Param>,
    dynamic: [Option<Param>; 26],
    statics: &'a mut StaticVars,
    out: Vec<u8>,
}

/// Expands `cap` with the given parameters.
///
/// `statics` carries the `A`..`Z` variables between calls; pass the same
/// storage for every capability of one database.
pub fn expand(cap: &[u8], params: &[Param], statics: &mut StaticVars) -> Vec<u8> {
    let mut machine = Machine::new(params, statics);
    machine.run(cap);
    machine.out
}

impl<'a> Machine<'a> {
    fn new(params: &[Param], statics: &'a mut StaticVars) -> Self {
        let mut owned: [Param; 9] = std::array::from_fn(|_| Param::Int(0));
        for (slot, value) in owned.iter_mut().zip(params.iter()) {
            *slot = value.clone();
        }
        Self {
            params: owned,
            stack: Vec::new(),
            dynamic: Default::default(),
            statics,
            out: Vec::new(),
        }
    }

    fn run(&mut self, cap: &[u8]) {
        let mut i = 0;
        while i < cap.len() {
            let b = cap[i];
            if b != b'%' {
                self.out.push(b);
                i += 1;
                continue;
            }
            i += 1;
            if i >= cap.len() {
                break;
            }
            i = self.op(cap, i);
        }
    }

    /// Executes the operation whose introducer is at `cap[i]`; returns the
    /// index just past it.
    fn op(&mut self, cap: &[u8], i: usize) -> usize {
        match cap[i] {
            b'%' => {
                self.out.push(b'%');
                i + 1
            }
            b'p' => {
                if let Some(&d) = cap.get(i + 1) {
                    if (b'1'..=b'9').contains(&d) {
                        let idx = (d - b'1') as usize;
                        self.stack.push(self.params[idx].clone());
                        return i + 2;
                    }
                }
                i + 1
            }
            b'P' => {
                if let Some(&c) = cap.get(i + 1) {
                    let value = self.pop();
                    if c.is_ascii_lowercase() {
                        self.dynamic[(c - b'a') as usize] = Some(value);
                    } else if c.is_ascii_uppercase() {
                        self.statics.values[(c - b'A') as usize] = Some(value);
                    }
                    return i + 2;
                }
                i + 1
            }
            b'g' => {
                if let Some(&c) = cap.get(i + 1) {
                    let value = if c.is_ascii_lowercase() {
                        self.dynamic[(c - b'a') as usize].clone()
                    } else if c.is_ascii_uppercase() {
                        self.statics.values[(c - b'A') as usize].clone()
                    } else {
                        None
                    };
                    self.stack.push(value.unwrap_or(Param::Int(0)));
                    return i + 2;
                }
                i + 1
            }
            b'\'' => {
                // %'c' pushes the byte value of c.
                if let Some(&c) = cap.get(i + 1) {
                    self.stack.push(Param::Int(i64::from(c)));
                    if cap.get(i + 2) == Some(&b'\'') {
                        return i + 3;
                    }
                    return i + 2;
                }
                i + 1
            }
            b'{' => {
                let mut j = i + 1;
                let neg = cap.get(j) == Some(&b'-');
                if neg {
                    j += 1;
                }
                let mut value: i64 = 0;
                while let Some(&d) = cap.get(j) {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    value = value.wrapping_mul(10).wrapping_add(i64::from(d - b'0'));
                    j += 1;
                }
                self.stack.push(Param::Int(if neg { -value } else { value }));
                if cap.get(j) == Some(&b'}') { j + 1 } else { j }
            }
            b'i' => {
                // one-based coordinate capabilities increment the first two
                // parameters in place
                for p in self.params.iter_mut().take(2) {
                    if let Param::Int(v) = p {
                        *v += 1;
                    }
                }
                i + 1
            }
            b'+' | b'-' | b'*' | b'/' | b'm' | b'&' | b'|' | b'^' | b'=' | b'<' | b'>' | b'A'
            | b'O' => {
                let b_val = self.pop_int();
                let a_val = self.pop_int();
                let result = match cap[i] {
                    b'+' => a_val.wrapping_add(b_val),
                    b'-' => a_val.wrapping_sub(b_val),
                    b'*' => a_val.wrapping_mul(b_val),
                    b'/' => {
                        if b_val == 0 {
                            0
                        } else {
                            a_val.wrapping_div(b_val)
                        }
                    }
                    b'm' => {
                        if b_val == 0 {
                            0
                        } else {
                            a_val.wrapping_rem(b_val)
                        }
                    }
                    b'&' => a_val & b_val,
                    b'|' => a_val | b_val,
                    b'^' => a_val ^ b_val,
                    b'=' => i64::from(a_val == b_val),
                    b'<' => i64::from(a_val < b_val),
                    b'>' => i64::from(a_val > b_val),
                    b'A' => i64::from(a_val != 0 && b_val != 0),
                    b'O' => i64::from(a_val != 0 || b_val != 0),
                    _ => unreachable!(),
                };
                self.stack.push(Param::Int(result));
                i + 1
            }
            b'~' => {
                let v = self.pop_int();
                self.stack.push(Param::Int(!v));
                i + 1
            }
            b'!' => {
                let v = self.pop_int();
                self.stack.push(Param::Int(i64::from(v == 0)));
                i + 1
            }
            b'l' => {
                let v = self.pop();
                let len = match v {
                    Param::Str(s) => s.len() as i64,
                    Param::Int(n) => n.to_string().len() as i64,
                };
                self.stack.push(Param::Int(len));
                i + 1
            }
            b'c' => {
                match self.pop() {
                    Param::Int(v) => self.out.push(v as u8),
                    Param::Str(s) => self.out.push(s.first().copied().unwrap_or(0)),
                }
                i + 1
            }
            b'd' | b's' | b'x' | b'X' | b'o' => {
                let spec = FormatSpec::default();
                self.emit_formatted(cap[i], &spec);
                i + 1
            }
            b'?' => i + 1,
            b';' => i + 1,
            b't' => {
                if self.pop_int() != 0 {
                    // condition held, run the then-branch in line
                    i + 1
                } else {
                    // skip to the matching %e (resume in the else branch)
                    // or to the end of the conditional
                    skip_branch(cap, i + 1, true)
                }
            }
            b'e' => {
                // reached from a completed then-branch: skip the else part
                skip_branch(cap, i + 1, false)
            }
            b':' | b'0'..=b'9' | b'.' | b'#' | b' ' => {
                // printf-style width/precision spec, e.g. %02d or %:+d
                let (spec, j) = parse_format(cap, i);
                if let Some(&conv) = cap.get(j) {
                    if matches!(conv, b'd' | b's' | b'x' | b'X' | b'o' | b'c') {
                        self.emit_formatted(conv, &spec);
                        return j + 1;
                    }
                }
                j
            }
            _ => {
                log::trace!("unknown %-operation {:?}", cap[i] as char);
                i + 1
            }
        }
    }

    fn pop(&mut self) -> Param {
        self.stack.pop().unwrap_or(Param::Int(0))
    }

    fn pop_int(&mut self) -> i64 {
        match self.pop() {
            Param::Int(v) => v,
            Param::Str(s) => String::from_utf8_lossy(&s).trim().parse().unwrap_or(0),
        }
    }

    fn emit_formatted(&mut self, conv: u8, spec: &FormatSpec) {
        let value = self.pop();
        let mut body = String::new();
        match conv {
            b'd' => {
                let v = as_int(&value);
                if spec.flags.contains(&Flag::Plus) && v >= 0 {
                    body.push('+');
                } else if spec.flags.contains(&Flag::Space) && v >= 0 {
                    body.push(' ');
                }
                let _ = write!(body, "{}", v);
            }
            b'x' => {
                if spec.flags.contains(&Flag::Hash) {
                    body.push_str("0x");
                }
                let _ = write!(body, "{:x}", as_int(&value));
            }
            b'X' => {
                if spec.flags.contains(&Flag::Hash) {
                    body.push_str("0X");
                }
                let _ = write!(body, "{:X}", as_int(&value));
            }
            b'o' => {
                let _ = write!(body, "{:o}", as_int(&value));
            }
            b's' => {
                let bytes = match &value {
                    Param::Str(s) => s.clone(),
                    Param::Int(v) => v.to_string().into_bytes(),
                };
                body = String::from_utf8_lossy(&bytes).into_owned();
                if let Some(precision) = spec.precision {
                    body.truncate(precision);
                }
            }
            b'c' => {
                match &value {
                    Param::Int(v) => body.push(*v as u8 as char),
                    Param::Str(s) => body.push(s.first().copied().unwrap_or(0) as char),
                }
            }
            _ => {}
        }

        let pad = spec.width.saturating_sub(body.len());
        if pad > 0 {
            if spec.flags.contains(&Flag::Minus) {
                self.out.extend_from_slice(body.as_bytes());
                self.out.extend(std::iter::repeat_n(b' ', pad));
                return;
            }
            // zero padding applies to numeric conversions only
            let fill = if conv != b's' && spec.leading_zero { b'0' } else { b' ' };
            if fill == b'0' && (body.starts_with('-') || body.starts_with('+')) {
                // keep the sign in front of the zeros
                self.out.push(body.as_bytes()[0]);
                self.out.extend(std::iter::repeat_n(b'0', pad));
                self.out.extend_from_slice(&body.as_bytes()[1..]);
                return;
            }
            self.out.extend(std::iter::repeat_n(fill, pad));
        }
        self.out.extend_from_slice(body.as_bytes());
    }
}

fn as_int(value: &Param) -> i64 {
    match value {
        Param::Int(v) => *v,
        Param::Str(s) => String::from_utf8_lossy(s).trim().parse().unwrap_or(0),
    }
}

/// Parses the optional `[:]flags width [.precision]` portion of a
/// formatted conversion starting at `cap[i]`. Returns the spec and the
/// index of the conversion character.
fn parse_format(cap: &[u8], mut i: usize) -> (FormatSpec, usize) {
    let mut spec = FormatSpec::default();
    // ':' only shields the flag characters from being read as operators
    if cap.get(i) == Some(&b':') {
        i += 1;
    }
    while let Some(&b) = cap.get(i) {
        match b {
            b'-' => spec.flags.push(Flag::Minus),
            b'+' => spec.flags.push(Flag::Plus),
            b' ' => spec.flags.push(Flag::Space),
            b'#' => spec.flags.push(Flag::Hash),
            _ => break,
        }
        i += 1;
    }
    if cap.get(i) == Some(&b'0') {
        spec.leading_zero = true;
    }
    let mut width = 0usize;
    while let Some(&b) = cap.get(i) {
        if !b.is_ascii_digit() {
            break;
        }
        width = width * 10 + usize::from(b - b'0');
        i += 1;
    }
    spec.width = width;
    if cap.get(i) == Some(&b'.') {
        i += 1;
        let mut precision = 0usize;
        while let Some(&b) = cap.get(i) {
            if !b.is_ascii_digit() {
                break;
            }
            precision = precision * 10 + usize::from(b - b'0');
            i += 1;
        }
        spec.precision = Some(precision);
    }
    (spec, i)
}

/// Skips a conditional branch without executing it.
///
/// With `stop_at_else` the scan halts after the first `%e` at this
/// nesting depth (the caller resumes in the else branch); otherwise it
/// halts after the matching `%;`. `%?` blocks nest, and `%e` binds to the
/// nearest unclosed `%?`.
fn skip_branch(cap: &[u8], mut i: usize, stop_at_else: bool) -> usize {
    let mut depth = 0usize;
    while i < cap.len() {
        if cap[i] != b'%' {
            i += 1;
            continue;
        }
        i += 1;
        let Some(&op) = cap.get(i) else { break };
        i += 1;
        match op {
            b'?' => depth += 1,
            b';' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            b'e' => {
                if depth == 0 && stop_at_else {
                    return i;
                }
            }
            b'\'' => {
                // don't let a quoted byte masquerade as an operator
                i += 1;
                if cap.get(i) == Some(&b'\'') {
                    i += 1;
                }
            }
            _ => {}
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cap: &[u8], params: &[Param]) -> Vec<u8> {
        let mut statics = StaticVars::default();
        expand(cap, params, &mut statics)
    }

    #[test]
    fn cup_expansion_is_one_based() {
        let cup = b"\x1b[%i%p1%d;%p2%dH";
        assert_eq!(
            run(cup, &[Param::Int(4), Param::Int(9)]),
            b"\x1b[5;10H".to_vec()
        );
        assert_eq!(
            run(cup, &[Param::Int(0), Param::Int(0)]),
            b"\x1b[1;1H".to_vec()
        );
    }

    #[test]
    fn setaf_256_expansion() {
        assert_eq!(
            run(b"\x1b[38;5;%p1%dm", &[Param::Int(196)]),
            b"\x1b[38;5;196m".to_vec()
        );
    }

    #[test]
    fn xterm_setaf_conditional() {
        // the stock xterm-256color setaf: basic colors below 8, palette
        // introducer otherwise
        let setaf = b"\x1b[%?%p1%{8}%<%t3%p1%d%e38;5;%p1%d%;m";
        assert_eq!(run(setaf, &[Param::Int(3)]), b"\x1b[33m".to_vec());
        assert_eq!(run(setaf, &[Param::Int(196)]), b"\x1b[38;5;196m".to_vec());
    }

    #[test]
    fn chained_else_if() {
        let cap = b"%?%p1%{1}%=%tone%e%p1%{2}%=%ttwo%eother%;";
        assert_eq!(run(cap, &[Param::Int(1)]), b"one".to_vec());
        assert_eq!(run(cap, &[Param::Int(2)]), b"two".to_vec());
        assert_eq!(run(cap, &[Param::Int(7)]), b"other".to_vec());
    }

    #[test]
    fn nested_conditionals() {
        let cap = b"%?%p1%t%?%p2%tAB%eCD%;%eEF%;";
        assert_eq!(run(cap, &[Param::Int(1), Param::Int(1)]), b"AB".to_vec());
        assert_eq!(run(cap, &[Param::Int(1), Param::Int(0)]), b"CD".to_vec());
        assert_eq!(run(cap, &[Param::Int(0), Param::Int(9)]), b"EF".to_vec());
    }

    #[test]
    fn arithmetic_and_division_by_zero() {
        assert_eq!(run(b"%p1%p2%+%d", &[7.into(), 3.into()]), b"10".to_vec());
        assert_eq!(run(b"%p1%p2%-%d", &[7.into(), 3.into()]), b"4".to_vec());
        assert_eq!(run(b"%p1%p2%*%d", &[7.into(), 3.into()]), b"21".to_vec());
        assert_eq!(run(b"%p1%p2%/%d", &[7.into(), 0.into()]), b"0".to_vec());
        assert_eq!(run(b"%p1%p2%m%d", &[7.into(), 0.into()]), b"0".to_vec());
        assert_eq!(run(b"%p1%p2%/%d", &[7.into(), 2.into()]), b"3".to_vec());
    }

    #[test]
    fn bitwise_and_logical() {
        assert_eq!(run(b"%p1%p2%&%d", &[6.into(), 3.into()]), b"2".to_vec());
        assert_eq!(run(b"%p1%p2%|%d", &[6.into(), 3.into()]), b"7".to_vec());
        assert_eq!(run(b"%p1%p2%^%d", &[6.into(), 3.into()]), b"5".to_vec());
        assert_eq!(run(b"%p1%~%d", &[0.into()]), b"-1".to_vec());
        assert_eq!(run(b"%p1%!%d", &[0.into()]), b"1".to_vec());
        assert_eq!(run(b"%p1%p2%A%d", &[1.into(), 0.into()]), b"0".to_vec());
        assert_eq!(run(b"%p1%p2%O%d", &[1.into(), 0.into()]), b"1".to_vec());
    }

    #[test]
    fn char_constant_and_integer_constant() {
        assert_eq!(run(b"%'x'%c", &[]), b"x".to_vec());
        assert_eq!(run(b"%{65}%c", &[]), b"A".to_vec());
        assert_eq!(run(b"%{123}%d", &[]), b"123".to_vec());
    }

    #[test]
    fn static_variables_persist_within_a_store() {
        let mut statics = StaticVars::default();
        assert_eq!(expand(b"%p1%PA", &[42.into()], &mut statics), b"".to_vec());
        assert_eq!(expand(b"%gA%d", &[], &mut statics), b"42".to_vec());
        // dynamic variables do not outlive a call
        assert_eq!(expand(b"%p1%Pa", &[7.into()], &mut statics), b"".to_vec());
        assert_eq!(expand(b"%ga%d", &[], &mut statics), b"0".to_vec());
    }

    #[test]
    fn string_params_and_length() {
        assert_eq!(run(b"%p1%s", &["hello".into()]), b"hello".to_vec());
        assert_eq!(run(b"%p1%l%d", &["hello".into()]), b"5".to_vec());
        assert_eq!(run(b"%p1%l%d", &[1234.into()]), b"4".to_vec());
    }

    #[test]
    fn width_and_precision() {
        assert_eq!(run(b"%02d", &[]), b"00".to_vec());
        assert_eq!(run(b"%p1%03d", &[7.into()]), b"007".to_vec());
        assert_eq!(run(b"%p1%3d", &[7.into()]), b"  7".to_vec());
        // a bare %- is subtraction; the colon shields the justify flag
        assert_eq!(run(b"%p1%:-3d|", &[7.into()]), b"7  |".to_vec());
        assert_eq!(run(b"%p1%:+d", &[7.into()]), b"+7".to_vec());
        assert_eq!(run(b"%p1%.2s", &["hello".into()]), b"he".to_vec());
    }

    #[test]
    fn percent_literal() {
        assert_eq!(run(b"100%%", &[]), b"100%".to_vec());
    }

    #[test]
    fn never_emits_stray_percent() {
        let caps: [&[u8]; 5] = [
            b"\x1b[%i%p1%d;%p2%dH",
            b"\x1b[%?%p1%{8}%<%t3%p1%d%e38;5;%p1%d%;m",
            b"%p1%p2%+%d",
            b"%p9%d",
            b"%gZ%d",
        ];
        for cap in caps {
            let out = run(cap, &[5.into(), 6.into()]);
            assert!(!out.contains(&b'%'), "cap {:?}", cap);
        }
    }

    #[test]
    fn malformed_input_does_not_panic() {
        for cap in [
            b"%".as_slice(),
            b"%p".as_slice(),
            b"%{12".as_slice(),
            b"%?%t".as_slice(),
            b"%;%;%e".as_slice(),
            b"%'".as_slice(),
            b"%q%z".as_slice(),
        ] {
            let _ = run(cap, &[]);
        }
    }

    #[test]
    fn missing_params_default_to_zero() {
        assert_eq!(run(b"%p5%d", &[]), b"0".to_vec());
    }
}
