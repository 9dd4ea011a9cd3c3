// The bridge's mirror of one shared session document, backed by yrs.

use std::sync::Arc;

use padsync_common::attributes::{Attribute, AttributeError, AttributePool};
use padsync_common::changeset::{
    apply_edits, byte_offset, plan_replay, Changeset, ChangesetError, CombineOptions, DocumentSink,
    OpKind, ReplayError, SinkError, TextBuffer, TextEdit,
};
use padsync_common::identity::DocumentIdentity;
use padsync_common::types::{Diagnostic, RunState};
use thiserror::Error;
use yrs::types::Attrs;
use yrs::{Any, Doc, GetString, Text, Transact};

const TEXT_NAME: &str = "text";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PadError {
    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

impl From<ChangesetError> for PadError {
    fn from(error: ChangesetError) -> Self {
        Self::Replay(error.into())
    }
}

impl From<SinkError> for PadError {
    fn from(error: SinkError) -> Self {
        Self::Replay(error.into())
    }
}

/// Attributes to set on a character range of the post-edit text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Format {
    offset: usize,
    len: usize,
    attributes: Vec<Attribute>,
}

/// A validated changeset, ready to commit without further checks.
#[derive(Debug, Clone)]
pub struct PadPlan {
    edits: Vec<TextEdit>,
    formats: Vec<Format>,
    new_len: usize,
}

impl PadPlan {
    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    pub fn new_len(&self) -> usize {
        self.new_len
    }
}

/// One pad: yrs text, attribute pool, latest diagnostics and run state.
///
/// `content` mirrors the yrs text so character offsets can be mapped to
/// the UTF-8 offsets yrs indexes by.
pub struct Pad {
    identity: DocumentIdentity,
    doc: Doc,
    content: TextBuffer,
    pool: AttributePool,
    diagnostics: Vec<Diagnostic>,
    run_state: Option<RunState>,
    revision: u64,
}

impl Pad {
    pub fn new(identity: DocumentIdentity, initial_text: &str) -> Self {
        let doc = Doc::new();
        let text = doc.get_or_insert_text(TEXT_NAME);
        if !initial_text.is_empty() {
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 0, initial_text);
        }

        Self {
            identity,
            doc,
            content: TextBuffer::new(initial_text),
            pool: AttributePool::new(),
            diagnostics: Vec::new(),
            run_state: None,
            revision: 0,
        }
    }

    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    /// Current text as stored in the yrs document.
    pub fn text(&self) -> String {
        let text = self.doc.get_or_insert_text(TEXT_NAME);
        text.get_string(&self.doc.transact())
    }

    pub fn len_chars(&self) -> usize {
        self.content.len_chars()
    }

    /// Number of changesets committed since the pad was created.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pool(&self) -> &AttributePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut AttributePool {
        &mut self.pool
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn replace_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = diagnostics;
    }

    pub fn run_state(&self) -> Option<RunState> {
        self.run_state
    }

    pub fn set_run_state(&mut self, state: RunState) {
        self.run_state = Some(state);
    }

    /// Checks length, attribute ids and bank usage, and stages the edits.
    /// The pad is not touched.
    pub fn plan(&self, changeset: &Changeset, options: CombineOptions) -> Result<PadPlan, PadError> {
        let actual = self.len_chars();
        if actual != changeset.old_len() {
            return Err(ReplayError::LengthMismatch { expected: changeset.old_len(), actual }.into());
        }

        let mut formats = Vec::new();
        let mut pos = 0;
        for op in changeset.ops() {
            if op.kind == OpKind::Delete {
                continue;
            }
            if !op.is_plain() {
                let attributes = self.pool.attributes(&op.attribs)?.into_iter().cloned().collect();
                formats.push(Format { offset: pos, len: op.chars, attributes });
            }
            pos += op.chars;
        }

        let edits = plan_replay(changeset, options)?;
        let mut staged = self.content.clone();
        apply_edits(&edits, &mut staged)?;

        Ok(PadPlan { edits, formats, new_len: staged.len_chars() })
    }

    /// Applies a plan from [`Pad::plan`] in one yrs transaction and returns
    /// the new revision.
    pub fn commit(&mut self, plan: PadPlan) -> Result<u64, PadError> {
        let text = self.doc.get_or_insert_text(TEXT_NAME);
        {
            let mut txn = self.doc.transact_mut();

            for edit in &plan.edits {
                let (start, end) = byte_range(self.content.as_str(), edit.offset, edit.delete_len)?;
                if end > start {
                    text.remove_range(&mut txn, start, end - start);
                }
                if !edit.text.is_empty() {
                    text.insert(&mut txn, start, &edit.text);
                }
                self.content.replace_range(edit.offset, edit.delete_len, &edit.text)?;
            }

            for format in &plan.formats {
                let (start, end) = byte_range(self.content.as_str(), format.offset, format.len)?;
                text.format(&mut txn, start, end - start, to_yrs_attrs(&format.attributes));
            }
        }

        self.revision += 1;
        Ok(self.revision)
    }

    pub fn apply(&mut self, changeset: &Changeset, options: CombineOptions) -> Result<u64, PadError> {
        let plan = self.plan(changeset, options)?;
        self.commit(plan)
    }
}

fn byte_range(text: &str, offset: usize, len: usize) -> Result<(u32, u32), SinkError> {
    let out_of_bounds = || SinkError::OutOfBounds { offset, old_len: len, len: text.chars().count() };
    let start = byte_offset(text, offset).ok_or_else(out_of_bounds)?;
    let end = byte_offset(&text[start..], len).ok_or_else(out_of_bounds)? + start;

    let to_u32 =
        |value: usize| u32::try_from(value).map_err(|_| SinkError::Rejected("pad exceeds 4 GiB".into()));
    Ok((to_u32(start)?, to_u32(end)?))
}

fn to_yrs_attrs(attributes: &[Attribute]) -> Attrs {
    attributes
        .iter()
        .map(|attribute| {
            let value = if attribute.is_clear() {
                Any::Null
            } else {
                Any::String(Arc::from(attribute.value.as_str()))
            };
            (Arc::from(attribute.key.as_str()), value)
        })
        .collect()
}
