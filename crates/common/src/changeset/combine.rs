// Streaming reduction of an operation stream before replay.
//
// Adjacent same-kind operations merge, a delete run followed by an insert run
// collapses into a single replace, and a replace keeps absorbing inserts.
// Only one pending operation is ever buffered.

use serde::{Deserialize, Serialize};

use super::{OpKind, Operation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineOptions {
    /// Also merge adjacent same-kind operations whose attribute lists are
    /// identical. When false, attribute-bearing operations pass through
    /// untouched.
    pub merge_equal_attributes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombinedOp {
    Keep(Operation),
    Insert(Operation),
    Delete(Operation),
    /// A delete run immediately followed by one or more inserts. The inserted
    /// text is still in the char bank.
    Replace { deleted: Operation, inserted: Operation },
}

impl CombinedOp {
    pub fn old_len(&self) -> usize {
        match self {
            Self::Keep(op) | Self::Insert(op) | Self::Delete(op) => op.old_len(),
            Self::Replace { deleted, .. } => deleted.chars,
        }
    }

    pub fn new_len(&self) -> usize {
        match self {
            Self::Keep(op) | Self::Insert(op) | Self::Delete(op) => op.new_len(),
            Self::Replace { inserted, .. } => inserted.chars,
        }
    }
}

impl From<Operation> for CombinedOp {
    fn from(op: Operation) -> Self {
        match op.kind {
            OpKind::Keep => Self::Keep(op),
            OpKind::Insert => Self::Insert(op),
            OpKind::Delete => Self::Delete(op),
        }
    }
}

/// Lazy combiner over any operation iterator. Single pass, not restartable.
#[derive(Debug)]
pub struct Combiner<I> {
    ops: I,
    pending: Option<CombinedOp>,
    options: CombineOptions,
}

impl<I> Combiner<I>
where
    I: Iterator<Item = Operation>,
{
    pub fn new(ops: impl IntoIterator<IntoIter = I>, options: CombineOptions) -> Self {
        Self { ops: ops.into_iter(), pending: None, options }
    }

    fn mergeable(&self, left: &Operation, right: &Operation) -> bool {
        if left.is_plain() && right.is_plain() {
            return true;
        }
        self.options.merge_equal_attributes && left.attribs == right.attribs
    }

    /// Folds `op` into `pending`, or hands `pending` back when they cannot
    /// be combined.
    fn fold_op(
        &self,
        pending: CombinedOp,
        op: Operation,
    ) -> Result<CombinedOp, (CombinedOp, Operation)> {
        match (pending, op.kind) {
            (CombinedOp::Keep(mut keep), OpKind::Keep) if self.mergeable(&keep, &op) => {
                absorb(&mut keep, &op);
                Ok(CombinedOp::Keep(keep))
            }
            (CombinedOp::Insert(mut insert), OpKind::Insert) if self.mergeable(&insert, &op) => {
                absorb(&mut insert, &op);
                Ok(CombinedOp::Insert(insert))
            }
            (CombinedOp::Delete(mut delete), OpKind::Delete) if self.mergeable(&delete, &op) => {
                absorb(&mut delete, &op);
                Ok(CombinedOp::Delete(delete))
            }
            (CombinedOp::Delete(deleted), OpKind::Insert) if deleted.is_plain() && op.is_plain() => {
                Ok(CombinedOp::Replace { deleted, inserted: op })
            }
            (CombinedOp::Replace { deleted, mut inserted }, OpKind::Insert)
                if self.mergeable(&inserted, &op) =>
            {
                absorb(&mut inserted, &op);
                Ok(CombinedOp::Replace { deleted, inserted })
            }
            (pending, _) => Err((pending, op)),
        }
    }
}

impl<I> Iterator for Combiner<I>
where
    I: Iterator<Item = Operation>,
{
    type Item = CombinedOp;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(op) = self.ops.next() else {
                return self.pending.take();
            };

            let Some(pending) = self.pending.take() else {
                self.pending = Some(CombinedOp::from(op));
                continue;
            };

            match self.fold_op(pending, op) {
                Ok(combined) => self.pending = Some(combined),
                Err((ready, op)) => {
                    self.pending = Some(CombinedOp::from(op));
                    return Some(ready);
                }
            }
        }
    }
}

fn absorb(into: &mut Operation, op: &Operation) {
    into.chars += op.chars;
    into.lines += op.lines;
}
