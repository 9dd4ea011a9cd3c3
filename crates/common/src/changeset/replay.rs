// Position-mapped replay of a combined operation stream onto a document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::combine::{CombineOptions, CombinedOp, Combiner};
use super::{Changeset, ChangesetError};

/// A document that accepts position-addressed edits.
///
/// Offsets and lengths are in characters and always refer to the document
/// as it stands after every previous call.
pub trait DocumentSink {
    fn len_chars(&self) -> usize;

    fn replace_range(&mut self, offset: usize, old_len: usize, text: &str) -> Result<(), SinkError>;
}

/// One sink call produced by replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: usize,
    pub delete_len: usize,
    pub text: String,
}

/// Summary of one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub edits: usize,
    pub old_len: usize,
    pub new_len: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("edit at {offset}+{old_len} is outside a {len}-character document")]
    OutOfBounds { offset: usize, old_len: usize, len: usize },

    #[error("document rejected edit: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error(transparent)]
    Changeset(#[from] ChangesetError),

    #[error("document has {actual} characters but the changeset expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Resolves a changeset into the minimal list of sink calls.
///
/// Nothing is applied here, so a bank underflow surfaces before any document
/// sees a partial replay.
pub fn plan_replay(
    changeset: &Changeset,
    options: CombineOptions,
) -> Result<Vec<TextEdit>, ChangesetError> {
    let mut bank = changeset.bank_cursor();
    let mut edits = Vec::new();
    let mut pos = 0usize;

    for op in Combiner::new(changeset.ops().iter().cloned(), options) {
        match op {
            CombinedOp::Keep(keep) => pos += keep.chars,
            CombinedOp::Insert(insert) => {
                let text = bank.take(insert.chars)?;
                edits.push(TextEdit { offset: pos, delete_len: 0, text: text.to_owned() });
                pos += insert.chars;
            }
            CombinedOp::Delete(delete) => {
                edits.push(TextEdit { offset: pos, delete_len: delete.chars, text: String::new() });
            }
            CombinedOp::Replace { deleted, inserted } => {
                let text = bank.take(inserted.chars)?;
                edits.push(TextEdit {
                    offset: pos,
                    delete_len: deleted.chars,
                    text: text.to_owned(),
                });
                pos += inserted.chars;
            }
        }
    }

    Ok(edits)
}

pub fn apply_edits<S>(edits: &[TextEdit], sink: &mut S) -> Result<(), SinkError>
where
    S: DocumentSink + ?Sized,
{
    for edit in edits {
        sink.replace_range(edit.offset, edit.delete_len, &edit.text)?;
    }
    Ok(())
}

/// Decoded changeset → combined stream → sink calls.
pub fn replay<S>(
    changeset: &Changeset,
    sink: &mut S,
    options: CombineOptions,
) -> Result<ReplayReport, ReplayError>
where
    S: DocumentSink + ?Sized,
{
    let actual = sink.len_chars();
    if actual != changeset.old_len() {
        return Err(ReplayError::LengthMismatch { expected: changeset.old_len(), actual });
    }

    let edits = plan_replay(changeset, options)?;
    apply_edits(&edits, sink)?;

    Ok(ReplayReport {
        edits: edits.len(),
        old_len: changeset.old_len(),
        new_len: changeset.new_len(),
    })
}

/// Byte offset of the `char_index`-th character, or of the end of `text`
/// when `char_index` equals its length.
pub fn byte_offset(text: &str, char_index: usize) -> Option<usize> {
    text.char_indices().map(|(index, _)| index).chain(std::iter::once(text.len())).nth(char_index)
}

/// Plain in-memory text addressed by character offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    len_chars: usize,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len_chars = text.chars().count();
        Self { text, len_chars }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl DocumentSink for TextBuffer {
    fn len_chars(&self) -> usize {
        self.len_chars
    }

    fn replace_range(&mut self, offset: usize, old_len: usize, text: &str) -> Result<(), SinkError> {
        let out_of_bounds = || SinkError::OutOfBounds { offset, old_len, len: self.len_chars };
        let start = byte_offset(&self.text, offset).ok_or_else(out_of_bounds)?;
        let end = byte_offset(&self.text[start..], old_len).ok_or_else(out_of_bounds)? + start;

        self.text.replace_range(start..end, text);
        self.len_chars = self.len_chars - old_len + text.chars().count();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::Operation;

    /// Records every sink call while applying it to a buffer.
    #[derive(Default)]
    struct RecordingSink {
        buffer: TextBuffer,
        calls: Vec<(usize, usize, String)>,
    }

    impl DocumentSink for RecordingSink {
        fn len_chars(&self) -> usize {
            self.buffer.len_chars()
        }

        fn replace_range(
            &mut self,
            offset: usize,
            old_len: usize,
            text: &str,
        ) -> Result<(), SinkError> {
            self.calls.push((offset, old_len, text.to_owned()));
            self.buffer.replace_range(offset, old_len, text)
        }
    }

    fn scenario_changeset() -> Changeset {
        Changeset::decode("Z:5>2=2-1+3$abc").unwrap()
    }

    #[test]
    fn replays_keep_delete_insert_as_one_replace() {
        let mut sink = RecordingSink { buffer: TextBuffer::new("hello"), ..Default::default() };
        let report = replay(&scenario_changeset(), &mut sink, CombineOptions::default()).unwrap();

        assert_eq!(sink.buffer.as_str(), "heabclo");
        assert_eq!(sink.calls, vec![(2, 1, "abc".to_owned())]);
        assert_eq!(report, ReplayReport { edits: 1, old_len: 5, new_len: 7 });
    }

    #[test]
    fn combined_replay_saves_one_call_over_raw_operations() {
        let changeset = scenario_changeset();

        let mut raw = RecordingSink { buffer: TextBuffer::new("hello"), ..Default::default() };
        let mut pos = 0;
        let mut bank = changeset.bank_cursor();
        for op in changeset.ops() {
            match op.kind {
                crate::changeset::OpKind::Keep => pos += op.chars,
                crate::changeset::OpKind::Insert => {
                    raw.replace_range(pos, 0, bank.take(op.chars).unwrap()).unwrap();
                    pos += op.chars;
                }
                crate::changeset::OpKind::Delete => raw.replace_range(pos, op.chars, "").unwrap(),
            }
        }

        let mut combined = RecordingSink { buffer: TextBuffer::new("hello"), ..Default::default() };
        replay(&changeset, &mut combined, CombineOptions::default()).unwrap();

        assert_eq!(raw.calls, vec![(2, 1, String::new()), (2, 0, "abc".to_owned())]);
        assert_eq!(combined.calls.len(), raw.calls.len() - 1);
        assert_eq!(combined.buffer, raw.buffer);
    }

    #[test]
    fn position_advances_past_inserted_text_after_replace() {
        // "abcdef": replace "b" with "XY", keep "cd", delete "e", insert "Z".
        let changeset = Changeset::decode("Z:6>1=1-1+2=2-1+1$XYZ").unwrap();
        let mut sink = RecordingSink { buffer: TextBuffer::new("abcdef"), ..Default::default() };
        replay(&changeset, &mut sink, CombineOptions::default()).unwrap();

        assert_eq!(sink.calls, vec![(1, 1, "XY".to_owned()), (5, 1, "Z".to_owned())]);
        assert_eq!(sink.buffer.as_str(), "aXYcdZf");
    }

    #[test]
    fn pure_deletes_do_not_advance_position() {
        let changeset = Changeset::decode("Z:6<3-1=1-2$").unwrap();
        let mut sink = RecordingSink { buffer: TextBuffer::new("abcdef"), ..Default::default() };
        replay(&changeset, &mut sink, CombineOptions::default()).unwrap();

        assert_eq!(sink.calls, vec![(0, 1, String::new()), (1, 2, String::new())]);
        assert_eq!(sink.buffer.as_str(), "bef");
    }

    #[test]
    fn attribute_only_changeset_issues_no_sink_calls() {
        let changeset = Changeset::decode("Z:5>0*0=2*1=3$").unwrap();
        let mut sink = RecordingSink { buffer: TextBuffer::new("hello"), ..Default::default() };
        let report = replay(&changeset, &mut sink, CombineOptions::default()).unwrap();

        assert!(sink.calls.is_empty());
        assert_eq!(report.edits, 0);
    }

    #[test]
    fn rejects_document_of_the_wrong_length_without_editing() {
        let mut sink = RecordingSink { buffer: TextBuffer::new("hell"), ..Default::default() };
        let error = replay(&scenario_changeset(), &mut sink, CombineOptions::default()).unwrap_err();

        assert_eq!(error, ReplayError::LengthMismatch { expected: 5, actual: 4 });
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn hand_built_bank_underflow_is_caught_before_any_edit() {
        // Operations are only reachable through a validated changeset, so the
        // planner is driven with an empty bank directly.
        let ops = vec![Operation::insert(2, 0)];
        let mut bank = crate::changeset::BankCursor::new("a");
        let planned: Result<Vec<_>, _> = Combiner::new(ops, CombineOptions::default())
            .map(|op| bank.take(op.new_len()).map(str::to_owned))
            .collect();
        assert_eq!(planned, Err(ChangesetError::BankUnderflow { requested: 2, remaining: 1 }));
    }

    #[test]
    fn text_buffer_edits_by_character_offset() {
        let mut buffer = TextBuffer::new("🙂中文");
        buffer.replace_range(1, 1, "ab").unwrap();
        assert_eq!(buffer.as_str(), "🙂ab文");
        assert_eq!(buffer.len_chars(), 4);

        assert_eq!(
            buffer.replace_range(3, 2, ""),
            Err(SinkError::OutOfBounds { offset: 3, old_len: 2, len: 4 })
        );
    }

    #[test]
    fn byte_offset_maps_character_indices() {
        assert_eq!(byte_offset("a🙂b", 0), Some(0));
        assert_eq!(byte_offset("a🙂b", 2), Some(5));
        assert_eq!(byte_offset("a🙂b", 3), Some(6));
        assert_eq!(byte_offset("a🙂b", 4), None);
    }
}
