// Changesets: the compact diff encoding spoken by the collaborative session.
//
// A changeset transforms a document of `old_len` characters into one of
// `new_len` characters through a run of keep/insert/delete operations plus a
// bank of literal inserted text.

mod builder;
mod codec;
mod combine;
mod replay;

use thiserror::Error;

use crate::attributes::AttributeId;

pub use builder::ChangesetBuilder;
pub use codec::{BankCursor, OpParser};
pub use combine::{CombineOptions, CombinedOp, Combiner};
pub use replay::{
    apply_edits, byte_offset, plan_replay, replay, DocumentSink, ReplayError, ReplayReport,
    SinkError, TextBuffer, TextEdit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Keep,
    Insert,
    Delete,
}

impl OpKind {
    pub const fn opcode(self) -> char {
        match self {
            Self::Keep => '=',
            Self::Insert => '+',
            Self::Delete => '-',
        }
    }

    pub fn from_opcode(opcode: char) -> Option<Self> {
        match opcode {
            '=' => Some(Self::Keep),
            '+' => Some(Self::Insert),
            '-' => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One diff primitive.
///
/// `lines` counts how many of the `chars` characters are line breaks; it is
/// carried for the session's benefit and never affects positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    pub chars: usize,
    pub lines: usize,
    pub attribs: Vec<AttributeId>,
}

impl Operation {
    pub fn new(kind: OpKind, chars: usize, lines: usize) -> Self {
        Self { kind, chars, lines, attribs: Vec::new() }
    }

    pub fn keep(chars: usize, lines: usize) -> Self {
        Self::new(OpKind::Keep, chars, lines)
    }

    pub fn insert(chars: usize, lines: usize) -> Self {
        Self::new(OpKind::Insert, chars, lines)
    }

    pub fn delete(chars: usize, lines: usize) -> Self {
        Self::new(OpKind::Delete, chars, lines)
    }

    pub fn with_attribs(mut self, attribs: Vec<AttributeId>) -> Self {
        self.attribs = attribs;
        self
    }

    pub fn is_plain(&self) -> bool {
        self.attribs.is_empty()
    }

    /// Characters of the old document this operation consumes.
    pub fn old_len(&self) -> usize {
        match self.kind {
            OpKind::Keep | OpKind::Delete => self.chars,
            OpKind::Insert => 0,
        }
    }

    /// Characters of the new document this operation produces.
    pub fn new_len(&self) -> usize {
        match self.kind {
            OpKind::Keep | OpKind::Insert => self.chars,
            OpKind::Delete => 0,
        }
    }

    /// Characters this operation draws from the char bank.
    pub fn bank_len(&self) -> usize {
        match self.kind {
            OpKind::Insert => self.chars,
            OpKind::Keep | OpKind::Delete => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    old_len: usize,
    new_len: usize,
    ops: Vec<Operation>,
    char_bank: String,
}

impl Changeset {
    /// Builds a changeset, checking that the operations consume exactly
    /// `old_len` characters and draw exactly the whole char bank.
    pub fn new(
        old_len: usize,
        ops: Vec<Operation>,
        char_bank: impl Into<String>,
    ) -> Result<Self, ChangesetError> {
        let char_bank = char_bank.into();

        for (index, op) in ops.iter().enumerate() {
            if op.chars == 0 {
                return Err(ChangesetError::malformed(format!("operation {index} has zero length")));
            }
            if op.lines > op.chars {
                return Err(ChangesetError::malformed(format!(
                    "operation {index} spans {} lines but only {} characters",
                    op.lines, op.chars
                )));
            }
        }

        let consumed = checked_total(&ops, Operation::old_len)?;
        if consumed != old_len {
            return Err(ChangesetError::malformed(format!(
                "operations consume {consumed} characters of a {old_len}-character document"
            )));
        }

        let drawn = checked_total(&ops, Operation::bank_len)?;
        let bank_len = char_bank.chars().count();
        if drawn != bank_len {
            return Err(ChangesetError::malformed(format!(
                "operations insert {drawn} characters but the char bank holds {bank_len}"
            )));
        }

        let deleted = checked_total(&ops, |op| if op.kind == OpKind::Delete { op.chars } else { 0 })?;
        let new_len = old_len
            .checked_add(drawn)
            .and_then(|grown| grown.checked_sub(deleted))
            .ok_or_else(|| ChangesetError::malformed("new document length overflows"))?;

        Ok(Self { old_len, new_len, ops, char_bank })
    }

    /// A changeset that leaves a document of `len` characters untouched.
    pub fn identity(len: usize) -> Self {
        let ops = if len == 0 { Vec::new() } else { vec![Operation::keep(len, 0)] };
        Self { old_len: len, new_len: len, ops, char_bank: String::new() }
    }

    pub fn decode(encoded: &str) -> Result<Self, ChangesetError> {
        codec::decode(encoded)
    }

    pub fn encode(&self) -> String {
        codec::encode(self)
    }

    pub fn old_len(&self) -> usize {
        self.old_len
    }

    pub fn new_len(&self) -> usize {
        self.new_len
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn char_bank(&self) -> &str {
        &self.char_bank
    }

    pub fn bank_cursor(&self) -> BankCursor<'_> {
        BankCursor::new(&self.char_bank)
    }

    /// True when the changeset carries attributes but changes no text.
    pub fn is_pure_attribution(&self) -> bool {
        self.ops.iter().all(|op| op.kind == OpKind::Keep)
    }

    /// Applies the raw operations to `text` in one pass, without combining.
    pub fn apply_to_text(&self, text: &str) -> Result<String, ReplayError> {
        let actual = text.chars().count();
        if actual != self.old_len {
            return Err(ReplayError::LengthMismatch { expected: self.old_len, actual });
        }

        let mut old_chars = text.chars();
        let mut bank = self.bank_cursor();
        let mut out = String::with_capacity(text.len() + self.char_bank.len());

        for op in &self.ops {
            match op.kind {
                OpKind::Keep => out.extend(old_chars.by_ref().take(op.chars)),
                OpKind::Insert => out.push_str(bank.take(op.chars)?),
                OpKind::Delete => {
                    old_chars.by_ref().take(op.chars).for_each(drop);
                }
            }
        }

        Ok(out)
    }
}

/// Sums a per-operation length, failing instead of wrapping.
fn checked_total(
    ops: &[Operation],
    len: impl Fn(&Operation) -> usize,
) -> Result<usize, ChangesetError> {
    ops.iter()
        .try_fold(0usize, |total, op| total.checked_add(len(op)))
        .ok_or_else(|| ChangesetError::malformed("operation lengths overflow"))
}

impl std::fmt::Display for Changeset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for Changeset {
    type Err = ChangesetError;

    fn from_str(encoded: &str) -> Result<Self, Self::Err> {
        Self::decode(encoded)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChangesetError {
    #[error("malformed changeset: {reason}")]
    Malformed { reason: String },

    #[error("char bank underflow: needed {requested} characters, {remaining} remain")]
    BankUnderflow { requested: usize, remaining: usize },
}

impl ChangesetError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed { reason: reason.into() }
    }
}
