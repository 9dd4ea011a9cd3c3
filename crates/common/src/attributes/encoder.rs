// Attribute spans → pure re-attribution changeset.

use serde::{Deserialize, Serialize};

use super::{Attribute, AttributeError, AttributePool};
use crate::changeset::{Changeset, ChangesetBuilder, ChangesetError};

/// A run of existing text and the attributes it should carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpan {
    pub chars: usize,
    #[serde(default)]
    pub lines: usize,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl AttributeSpan {
    pub fn new(chars: usize, lines: usize, attributes: Vec<Attribute>) -> Self {
        Self { chars, lines, attributes }
    }
}

/// Encodes spans partitioning a `document_len`-character document as one
/// keep per non-empty span.
///
/// Coverage and line counts are checked before any pair is allocated, so a
/// rejected call leaves the pool untouched.
pub fn encode_spans(
    spans: &[AttributeSpan],
    document_len: usize,
    pool: &mut AttributePool,
) -> Result<Changeset, AttributeError> {
    let covered = spans.iter().fold(0usize, |total, span| total.saturating_add(span.chars));
    if covered != document_len {
        return Err(AttributeError::SpanCoverageMismatch { expected: document_len, actual: covered });
    }
    if let Some(span) = spans.iter().find(|span| span.lines > span.chars) {
        return Err(ChangesetError::malformed(format!(
            "span of {} characters cannot hold {} lines",
            span.chars, span.lines
        ))
        .into());
    }

    let mut builder = ChangesetBuilder::new(document_len);
    for span in spans {
        builder.keep(span.chars, span.lines, &span.attributes, pool);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeId;
    use crate::changeset::Operation;

    fn red() -> Attribute {
        Attribute::new("color", "red")
    }

    #[test]
    fn each_span_becomes_one_attributed_keep() {
        let mut pool = AttributePool::new();
        pool.id_for("bold", "true");

        let spans = [
            AttributeSpan::new(4, 1, vec![red(), Attribute::new("bold", "true")]),
            AttributeSpan::new(0, 0, vec![red()]),
            AttributeSpan::new(6, 0, vec![]),
        ];
        let changeset = encode_spans(&spans, 10, &mut pool).unwrap();

        assert_eq!(
            changeset.ops(),
            &[
                Operation::keep(4, 1).with_attribs(vec![AttributeId::new(0), AttributeId::new(1)]),
                Operation::keep(6, 0),
            ]
        );
        assert_eq!(changeset.old_len(), 10);
        assert_eq!(changeset.new_len(), 10);
        assert!(changeset.is_pure_attribution());
        assert_eq!(changeset.encode(), "Z:a>0*0*1|1=4=6$");
    }

    #[test]
    fn short_coverage_is_rejected_without_allocating() {
        let mut pool = AttributePool::new();
        let spans = [AttributeSpan::new(5, 0, vec![red()]), AttributeSpan::new(4, 0, vec![])];

        let error = encode_spans(&spans, 10, &mut pool).unwrap_err();

        assert_eq!(error, AttributeError::SpanCoverageMismatch { expected: 10, actual: 9 });
        assert!(pool.is_empty());
    }

    #[test]
    fn over_coverage_is_rejected() {
        let mut pool = AttributePool::new();
        let error = encode_spans(&[AttributeSpan::new(3, 0, vec![])], 2, &mut pool).unwrap_err();
        assert_eq!(error, AttributeError::SpanCoverageMismatch { expected: 2, actual: 3 });
    }

    #[test]
    fn spans_with_more_lines_than_characters_are_rejected() {
        let mut pool = AttributePool::new();
        let spans = [AttributeSpan::new(1, 5, vec![red()])];

        let error = encode_spans(&spans, 1, &mut pool).unwrap_err();

        assert!(matches!(error, AttributeError::Changeset(ChangesetError::Malformed { .. })));
        assert!(pool.is_empty());
    }

    #[test]
    fn encoded_spans_decode_back() {
        let mut pool = AttributePool::new();
        let spans = [AttributeSpan::new(3, 3, vec![red()]), AttributeSpan::new(2, 0, vec![])];
        let changeset = encode_spans(&spans, 5, &mut pool).unwrap();
        assert_eq!(Changeset::decode(&changeset.encode()), Ok(changeset));
    }

    #[test]
    fn huge_span_counts_are_a_coverage_mismatch() {
        let mut pool = AttributePool::new();
        let spans = [AttributeSpan::new(usize::MAX, 0, vec![]), AttributeSpan::new(2, 0, vec![])];
        let error = encode_spans(&spans, 4, &mut pool).unwrap_err();
        assert_eq!(error, AttributeError::SpanCoverageMismatch { expected: 4, actual: usize::MAX });
    }

    #[test]
    fn empty_document_encodes_to_identity() {
        let mut pool = AttributePool::new();
        let changeset = encode_spans(&[], 0, &mut pool).unwrap();
        assert_eq!(changeset, Changeset::identity(0));
        assert_eq!(changeset.encode(), "Z:0>0$");
    }

    #[test]
    fn span_ids_are_stable_across_calls() {
        let mut pool = AttributePool::new();
        let spans = [AttributeSpan::new(2, 0, vec![red()])];
        let first = encode_spans(&spans, 2, &mut pool).unwrap();
        let second = encode_spans(&spans, 2, &mut pool).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.len(), 1);
    }
}
