// Incremental changeset construction over a document of known length.

use super::{Changeset, ChangesetError, Operation};
use crate::attributes::{Attribute, AttributePool};

/// Builds a changeset one operation at a time, resolving attributes through
/// the document's pool.
///
/// Old-document text left unconsumed when [`ChangesetBuilder::build`] runs
/// becomes a trailing plain keep.
#[derive(Debug, Clone)]
pub struct ChangesetBuilder {
    old_len: usize,
    consumed: usize,
    ops: Vec<Operation>,
    char_bank: String,
}

impl ChangesetBuilder {
    pub fn new(old_len: usize) -> Self {
        Self { old_len, consumed: 0, ops: Vec::new(), char_bank: String::new() }
    }

    /// Keeps `chars` characters, setting `attributes` on them. An attribute
    /// with an empty value clears that key.
    pub fn keep(
        &mut self,
        chars: usize,
        lines: usize,
        attributes: &[Attribute],
        pool: &mut AttributePool,
    ) -> &mut Self {
        if chars > 0 {
            let attribs = pool.resolve(attributes);
            self.ops.push(Operation::keep(chars, lines).with_attribs(attribs));
            self.consumed = self.consumed.saturating_add(chars);
        }
        self
    }

    /// Keeps `text`, which must match the old document at this position.
    pub fn keep_text(
        &mut self,
        text: &str,
        attributes: &[Attribute],
        pool: &mut AttributePool,
    ) -> &mut Self {
        self.keep(text.chars().count(), line_breaks(text), attributes, pool)
    }

    pub fn insert(
        &mut self,
        text: &str,
        attributes: &[Attribute],
        pool: &mut AttributePool,
    ) -> &mut Self {
        let chars = text.chars().count();
        if chars > 0 {
            let attribs = pool.resolve(attributes);
            self.ops.push(Operation::insert(chars, line_breaks(text)).with_attribs(attribs));
            self.char_bank.push_str(text);
        }
        self
    }

    pub fn remove(&mut self, chars: usize, lines: usize) -> &mut Self {
        if chars > 0 {
            self.ops.push(Operation::delete(chars, lines));
            self.consumed = self.consumed.saturating_add(chars);
        }
        self
    }

    /// Fails when more old characters were consumed than the document holds.
    pub fn build(mut self) -> Result<Changeset, ChangesetError> {
        if self.consumed < self.old_len {
            self.ops.push(Operation::keep(self.old_len - self.consumed, 0));
        }
        Changeset::new(self.old_len, self.ops, self.char_bank)
    }
}

fn line_breaks(text: &str) -> usize {
    text.matches('\n').count()
}
