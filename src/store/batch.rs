//! # Batch View
//!
//! In many places it is efficient to batch an operation up against multiple
//! entries. A [`BatchView`] is a fixed-capacity container of (offset, slot)
//! pairs pulled from one store under a single lock acquisition, for bulk
//! consumers (writeback scans, readahead, teardown).
//!
//! ## Why Offsets Travel With the Entries
//!
//! A private page records its own position, but sentinel slots have no
//! intrinsic offset identity: every `Hole` is the same value and every `Zero`
//! points at the same shared page. A bulk consumer that tried to read the
//! offset off the resource would be lost the moment it met a sentinel, so the
//! view attaches the offset to every entry explicitly instead of keeping it
//! out-of-band.

use smallvec::SmallVec;

use super::index::Store;
use super::slot::Slot;
use crate::config::BATCH_CAPACITY;

/// One entry of a batch view: the offset is explicit, the slot is a snapshot.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub offset: u64,
    pub slot: Slot,
}

/// Up to [`BATCH_CAPACITY`] consecutive occupied entries of one store.
#[derive(Debug, Clone, Default)]
pub struct BatchView {
    entries: SmallVec<[BatchEntry; BATCH_CAPACITY]>,
}

impl BatchView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills a view with the occupied entries at or above `start`, in offset
    /// order, under one read-lock acquisition. The snapshots carry the same
    /// staleness caveat as [`Store::lookup`].
    pub fn lookup(store: &Store, start: u64) -> Self {
        let entries = store
            .lookup_range(start, BATCH_CAPACITY)
            .into_iter()
            .map(|(offset, slot)| BatchEntry { offset, slot })
            .collect();

        Self { entries }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Slots still available before the view is full.
    pub fn space(&self) -> usize {
        BATCH_CAPACITY - self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == BATCH_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BatchEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a BatchView {
    type Item = &'a BatchEntry;
    type IntoIter = std::slice::Iter<'a, BatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
