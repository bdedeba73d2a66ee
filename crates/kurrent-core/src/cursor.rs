//! Transactional, push-back capable cursor.
//!
//! [`TransactionalCursor`] is the backtracking primitive the whole parser is
//! built on. Grammar rules consume items speculatively inside a transaction;
//! if the rule does not apply, the transaction is rolled back and the cursor
//! is exactly where it was before the attempt.
//!
//! The same cursor is used at three granularities: lines (block grammar),
//! characters (inline tokenizer) and lexemes (inline grammar).
//!
//! # Model
//!
//! Items come from a pending stack (filled by [`push`](TransactionalCursor::push)
//! and by rollbacks) and, once that is empty, from the underlying iterator.
//! Each open transaction keeps an undo record of what happened while it was
//! on top of the stack: which items were consumed and how many were pushed.
//! Rolling back replays the record in reverse; committing folds the record
//! into the enclosing transaction so that an outer rollback still undoes it.

use crate::error::EndOfStream;

/// One undoable step recorded by a transaction.
#[derive(Debug, Clone)]
enum Step<T> {
    /// An item was handed out by `next()`.
    Consumed(T),
    /// An item was put in front of the stream by `push()`.
    Pushed,
}

/// Handle for an open transaction.
///
/// Obtained from [`TransactionalCursor::begin_transaction`] and closed with
/// either [`commit`](TransactionalCursor::commit) or
/// [`rollback`](TransactionalCursor::rollback).
#[derive(Debug)]
#[must_use = "a transaction must be committed or rolled back"]
pub struct Transaction {
    depth: usize,
    committed: bool,
}

impl Transaction {
    /// Whether the transaction was committed.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Nesting depth of this transaction, starting at 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A cursor over any iterator that supports push-back and nested
/// transactions.
///
/// # Example
///
/// ```rust
/// use kurrent_core::cursor::TransactionalCursor;
///
/// let mut cursor = TransactionalCursor::new(vec![1, 2, 3].into_iter());
/// let attempt: Result<(), ()> = cursor.try_with(|c| {
///     assert_eq!(c.next(), Some(1));
///     assert_eq!(c.next(), Some(2));
///     Err(())
/// });
/// assert!(attempt.is_err());
/// assert_eq!(cursor.next(), Some(1));
/// ```
#[derive(Debug)]
pub struct TransactionalCursor<T, I> {
    source: I,
    /// Items to hand out before touching `source`; the last one is next.
    pending: Vec<T>,
    /// Undo records, innermost transaction last.
    records: Vec<Vec<Step<T>>>,
}

impl<T, I> TransactionalCursor<T, I>
where
    T: Clone,
    I: Iterator<Item = T>,
{
    /// Wrap an iterator.
    pub fn new(source: I) -> Self {
        Self {
            source,
            pending: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Number of currently open transactions.
    #[inline]
    pub fn depth(&self) -> usize {
        self.records.len()
    }

    /// Make `item` the next value returned by `next()`.
    pub fn push(&mut self, item: T) {
        self.pending.push(item);
        if let Some(record) = self.records.last_mut() {
            record.push(Step::Pushed);
        }
    }

    /// Push several items so that they are returned in the given order.
    pub fn push_many(&mut self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        for item in items.into_iter().rev() {
            self.push(item);
        }
    }

    /// Replace the next item with `item`, returning the item it replaced.
    ///
    /// Returns `None` (and pushes nothing) at end of stream.
    pub fn replace(&mut self, item: T) -> Option<T> {
        let old = self.next()?;
        self.push(item);
        Some(old)
    }

    /// Look at the next item without consuming it.
    pub fn peek(&mut self) -> Option<T> {
        let item = self.next()?;
        self.push(item.clone());
        Some(item)
    }

    /// Open a new, innermost transaction.
    pub fn begin_transaction(&mut self) -> Transaction {
        self.records.push(Vec::new());
        Transaction {
            depth: self.records.len(),
            committed: false,
        }
    }

    /// Keep everything consumed during `transaction`.
    pub fn commit(&mut self, transaction: &mut Transaction) {
        let record = self.close(transaction);
        if let Some(outer) = self.records.last_mut() {
            outer.extend(record);
        }
        transaction.committed = true;
    }

    /// Undo everything that happened during `transaction`.
    pub fn rollback(&mut self, transaction: &mut Transaction) {
        self.rollback_with(transaction, |item| item);
    }

    /// Undo `transaction`, passing every replayed item through `clean`.
    ///
    /// Only items that were consumed are cleaned; items pushed during the
    /// transaction are discarded verbatim.
    pub fn rollback_with(&mut self, transaction: &mut Transaction, mut clean: impl FnMut(T) -> T) {
        let record = self.close(transaction);
        for step in record.into_iter().rev() {
            match step {
                Step::Consumed(item) => self.pending.push(clean(item)),
                Step::Pushed => {
                    self.pending.pop();
                }
            }
        }
        transaction.committed = false;
    }

    /// Run `attempt` inside a transaction, committing on `Ok` and rolling
    /// back on `Err`.
    pub fn try_with<R, E>(
        &mut self,
        attempt: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut transaction = self.begin_transaction();
        match attempt(self) {
            Ok(value) => {
                self.commit(&mut transaction);
                Ok(value)
            }
            Err(err) => {
                self.rollback(&mut transaction);
                Err(err)
            }
        }
    }

    /// Collect up to `n` upcoming items without consuming them.
    ///
    /// If fewer than `n` items remain, the short result is returned when
    /// `allow_short` is set and [`EndOfStream`] otherwise.
    pub fn lookahead(&mut self, n: usize, allow_short: bool) -> Result<Vec<T>, EndOfStream> {
        let mut transaction = self.begin_transaction();
        let mut items = Vec::with_capacity(n);
        while items.len() < n {
            match self.next() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        self.rollback(&mut transaction);
        if items.len() < n && !allow_short {
            return Err(EndOfStream);
        }
        Ok(items)
    }

    /// Remove and return everything currently buffered, in stream order.
    ///
    /// Items still in the underlying iterator are not touched.
    pub fn take_pending(&mut self) -> Vec<T> {
        debug_assert!(
            self.records.is_empty(),
            "pending items taken while a transaction is open"
        );
        let mut pending = std::mem::take(&mut self.pending);
        pending.reverse();
        pending
    }

    /// Mutable access to the underlying iterator.
    pub(crate) fn source_mut(&mut self) -> &mut I {
        &mut self.source
    }

    fn close(&mut self, transaction: &Transaction) -> Vec<Step<T>> {
        debug_assert_eq!(
            transaction.depth,
            self.records.len(),
            "transactions must be closed innermost first"
        );
        self.records.pop().unwrap_or_default()
    }
}

impl<T, I> Iterator for TransactionalCursor<T, I>
where
    T: Clone,
    I: Iterator<Item = T>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = match self.pending.pop() {
            Some(item) => item,
            None => self.source.next()?,
        };
        if let Some(record) = self.records.last_mut() {
            record.push(Step::Consumed(item.clone()));
        }
        Some(item)
    }
}
