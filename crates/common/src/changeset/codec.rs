// Wire codec for changesets.
//
//   Z:<old len>(>|<)<len delta><ops>$<char bank>
//   op := (*<attrib id>)* (|<lines>)? <opcode> <chars>
//
// All numbers are lowercase base 36. Old-document text left unconsumed by the
// operations is an implicit trailing keep.

use super::replay::byte_offset;
use super::{Changeset, ChangesetError, OpKind, Operation};
use crate::attributes::AttributeId;

const HEADER_PREFIX: &str = "Z:";
const BANK_SEPARATOR: char = '$';
const ATTRIB_MARKER: char = '*';
const LINES_MARKER: char = '|';
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub(super) fn decode(encoded: &str) -> Result<Changeset, ChangesetError> {
    let body = encoded
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| ChangesetError::malformed("missing `Z:` header"))?;

    let (old_digits, rest) = split_base36(body);
    let old_len = parse_base36(old_digits)
        .ok_or_else(|| ChangesetError::malformed("header has no old length"))?;

    let mut rest_chars = rest.chars();
    let sign = rest_chars.next();
    let (delta_digits, rest) = split_base36(rest_chars.as_str());
    let delta = parse_base36(delta_digits)
        .ok_or_else(|| ChangesetError::malformed("header has no length delta"))?;
    let new_len = match sign {
        Some('>') => old_len.checked_add(delta),
        Some('<') => old_len.checked_sub(delta),
        _ => None,
    }
    .ok_or_else(|| ChangesetError::malformed("header length delta is invalid"))?;

    let (ops_text, char_bank) = rest
        .split_once(BANK_SEPARATOR)
        .ok_or_else(|| ChangesetError::malformed("missing `$` before the char bank"))?;

    let mut ops = OpParser::new(ops_text).collect::<Result<Vec<_>, _>>()?;

    let consumed = ops
        .iter()
        .try_fold(0usize, |total, op| total.checked_add(op.old_len()).filter(|&sum| sum <= old_len))
        .ok_or_else(|| {
            ChangesetError::malformed(format!(
                "operations consume more than the {old_len}-character document"
            ))
        })?;
    if consumed < old_len {
        ops.push(Operation::keep(old_len - consumed, 0));
    }

    let changeset = Changeset::new(old_len, ops, char_bank)?;
    if changeset.new_len() != new_len {
        return Err(ChangesetError::malformed(format!(
            "header declares new length {new_len} but operations produce {}",
            changeset.new_len()
        )));
    }

    Ok(changeset)
}

pub(super) fn encode(changeset: &Changeset) -> String {
    let old_len = changeset.old_len();
    let new_len = changeset.new_len();

    let mut out = String::with_capacity(16 + changeset.ops().len() * 4 + changeset.char_bank().len());
    out.push_str(HEADER_PREFIX);
    out.push_str(&to_base36(old_len));
    if new_len >= old_len {
        out.push('>');
        out.push_str(&to_base36(new_len - old_len));
    } else {
        out.push('<');
        out.push_str(&to_base36(old_len - new_len));
    }

    for op in changeset.ops() {
        write_op(&mut out, op);
    }

    out.push(BANK_SEPARATOR);
    out.push_str(changeset.char_bank());
    out
}

fn write_op(out: &mut String, op: &Operation) {
    for id in &op.attribs {
        out.push(ATTRIB_MARKER);
        out.push_str(&to_base36(id.get() as usize));
    }
    if op.lines > 0 {
        out.push(LINES_MARKER);
        out.push_str(&to_base36(op.lines));
    }
    out.push(op.kind.opcode());
    out.push_str(&to_base36(op.chars));
}

/// Lazy, forward-only parser over the operation section of an encoded
/// changeset. Stops after the first error.
#[derive(Debug, Clone)]
pub struct OpParser<'a> {
    rest: &'a str,
    failed: bool,
}

impl<'a> OpParser<'a> {
    pub fn new(ops: &'a str) -> Self {
        Self { rest: ops, failed: false }
    }

    fn parse_next(&mut self) -> Result<Operation, ChangesetError> {
        let mut attribs = Vec::new();
        while let Some(after) = self.rest.strip_prefix(ATTRIB_MARKER) {
            let (digits, rest) = split_base36(after);
            let id = parse_base36(digits)
                .and_then(|value| u32::try_from(value).ok())
                .ok_or_else(|| {
                    ChangesetError::malformed(format!("invalid attribute reference `*{digits}`"))
                })?;
            attribs.push(AttributeId::new(id));
            self.rest = rest;
        }

        let mut lines = 0;
        if let Some(after) = self.rest.strip_prefix(LINES_MARKER) {
            let (digits, rest) = split_base36(after);
            lines = parse_base36(digits).ok_or_else(|| {
                ChangesetError::malformed(format!("invalid line count `|{digits}`"))
            })?;
            self.rest = rest;
        }

        let mut chars = self.rest.chars();
        let opcode =
            chars.next().ok_or_else(|| ChangesetError::malformed("operation has no opcode"))?;
        let kind = OpKind::from_opcode(opcode)
            .ok_or_else(|| ChangesetError::malformed(format!("unknown opcode `{opcode}`")))?;

        let (digits, rest) = split_base36(chars.as_str());
        let count = parse_base36(digits).ok_or_else(|| {
            ChangesetError::malformed(format!("operation `{opcode}` has no character count"))
        })?;
        if count == 0 {
            return Err(ChangesetError::malformed(format!("operation `{opcode}0` is empty")));
        }
        if lines > count {
            return Err(ChangesetError::malformed(format!(
                "operation spans {lines} lines but only {count} characters"
            )));
        }

        self.rest = rest;
        Ok(Operation { kind, chars: count, lines, attribs })
    }
}

impl Iterator for OpParser<'_> {
    type Item = Result<Operation, ChangesetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        let parsed = self.parse_next();
        self.failed = parsed.is_err();
        Some(parsed)
    }
}

/// Forward-only cursor over a char bank.
#[derive(Debug, Clone)]
pub struct BankCursor<'a> {
    rest: &'a str,
    remaining: usize,
}

impl<'a> BankCursor<'a> {
    pub fn new(bank: &'a str) -> Self {
        Self { rest: bank, remaining: bank.chars().count() }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Takes the next `count` characters.
    pub fn take(&mut self, count: usize) -> Result<&'a str, ChangesetError> {
        if count > self.remaining {
            return Err(ChangesetError::BankUnderflow {
                requested: count,
                remaining: self.remaining,
            });
        }

        let end = byte_offset(self.rest, count).unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        self.remaining -= count;
        Ok(taken)
    }
}

fn is_base36_digit(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_lowercase()
}

fn split_base36(input: &str) -> (&str, &str) {
    let end = input.find(|c: char| !is_base36_digit(c)).unwrap_or(input.len());
    input.split_at(end)
}

fn parse_base36(digits: &str) -> Option<usize> {
    if digits.is_empty() {
        return None;
    }
    usize::from_str_radix(digits, 36).ok()
}

fn to_base36(mut value: usize) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[value % 36]);
        value /= 36;
    }
    digits.iter().rev().map(|&digit| char::from(digit)).collect()
}
