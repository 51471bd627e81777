//! Reordering buffer for out-of-order completions.

use std::collections::BTreeMap;

/// Holds completed items until every earlier sequence number has been
/// released.
///
/// Owned by a single consumer, so it needs no locking.
#[derive(Debug)]
pub struct CompletionBuffer<T> {
    pending: BTreeMap<u64, T>,
    next_expected: u64,
}

impl<T> CompletionBuffer<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_expected: 0,
        }
    }

    /// Stores the item for `seq`.
    ///
    /// Returns `false` and drops the item if `seq` was already released or
    /// is already buffered.
    pub fn insert(&mut self, seq: u64, item: T) -> bool {
        if seq < self.next_expected || self.pending.contains_key(&seq) {
            return false;
        }
        self.pending.insert(seq, item);
        true
    }

    /// Removes the item for the next expected sequence number, if present.
    pub fn pop_next(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next_expected)?;
        self.next_expected += 1;
        Some(item)
    }

    /// Sequence number the next release must carry.
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for CompletionBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
