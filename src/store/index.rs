//! # Per-Store Sparse Index
//!
//! A [`Store`] owns the ordered mapping from offset to [`Slot`] for one
//! logical file. The map is sparse: most offsets have no entry at all, and
//! occupied offsets often share a physical resource through sentinel slots.
//!
//! ## Lock Discipline
//!
//! The map is mutated only under the store's write lock. Read-side lookups
//! take the shared read lock, clone the slot (cloning an `Arc` there keeps
//! the resource alive past the guard, so nothing a reader holds can be freed
//! underneath it), and promise no freshness beyond the moment of the read.
//!
//! [`Store::replace`] is the single synchronization primitive every higher
//! protocol builds on: one write-lock acquisition in which the identity
//! compare and the slot write happen together. There is no separate "check"
//! call to misuse; the race window between observing a slot and acting on it
//! is closed structurally.
//!
//! ## Entry Accounting
//!
//! `len()` tracks live entries (the `nrpages` analog). It is maintained under
//! the write lock but stored atomically so readers can sample it without
//! contending.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use eyre::{bail, Result};
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::slot::Slot;
use super::StoreId;
use crate::config::BATCH_CAPACITY;

/// Caller invoked an operation on a slot state that violates its documented
/// precondition. The operation aborts with no partial mutation.
#[derive(Debug)]
pub struct SlotStateError {
    pub store: StoreId,
    pub offset: u64,
    pub detail: &'static str,
}

impl std::fmt::Display for SlotStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slot precondition violated at store {} offset {}: {}",
            self.store, self.offset, self.detail
        )
    }
}

impl std::error::Error for SlotStateError {}

/// Outcome of a compare-and-replace attempt.
#[derive(Debug)]
pub enum ReplaceOutcome {
    /// The expected value matched; the new slot is installed.
    Installed,
    /// Another thread changed the slot first. Carries the current slot so the
    /// loser can adopt the winner's result.
    Lost(Option<Slot>),
}

impl ReplaceOutcome {
    pub fn installed(&self) -> bool {
        matches!(self, ReplaceOutcome::Installed)
    }
}

/// One logical sparse container: the offset → slot mapping for one open file.
#[derive(Debug)]
pub struct Store {
    id: StoreId,
    slots: RwLock<BTreeMap<u64, Slot>>,
    nr_entries: AtomicU64,
}

impl Store {
    pub(crate) fn new(id: StoreId) -> Self {
        Self {
            id,
            slots: RwLock::new(BTreeMap::new()),
            nr_entries: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Snapshot of the slot at `offset`. `None` means never populated.
    ///
    /// The snapshot carries no freshness promise; callers acting on it must
    /// re-validate through [`Store::replace`].
    pub fn lookup(&self, offset: u64) -> Option<Slot> {
        self.slots.read().get(&offset).cloned()
    }

    /// Number of live entries (sentinels and private pages).
    pub fn len(&self) -> u64 {
        self.nr_entries.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically replaces the slot at `offset` with `new` iff its current
    /// value is identical (by [`Slot::same_entry`], never by content) to
    /// `expected`. `expected: None` asks to install into an absent slot.
    ///
    /// Expecting an occupied slot at an offset that has no entry is a caller
    /// bug and fails with [`SlotStateError`] rather than reporting a race.
    pub fn replace(
        &self,
        offset: u64,
        expected: Option<&Slot>,
        new: Slot,
    ) -> Result<ReplaceOutcome> {
        let mut slots = self.slots.write();

        match (slots.get(&offset), expected) {
            (None, None) => {
                slots.insert(offset, new);
                self.nr_entries.fetch_add(1, Ordering::AcqRel);
                Ok(ReplaceOutcome::Installed)
            }
            (None, Some(_)) => bail!(SlotStateError {
                store: self.id,
                offset,
                detail: "expected an occupied slot but the offset has no entry",
            }),
            (Some(current), Some(exp)) if current.same_entry(exp) => {
                slots.insert(offset, new);
                Ok(ReplaceOutcome::Installed)
            }
            (Some(current), _) => Ok(ReplaceOutcome::Lost(Some(current.clone()))),
        }
    }

    /// Removes the entry at `offset` unconditionally, returning what was
    /// there. The caller has already accounted for (or will dispose of) the
    /// removed resource.
    pub(crate) fn delete(&self, offset: u64) -> Option<Slot> {
        let mut slots = self.slots.write();
        let removed = slots.remove(&offset);
        // Decrement while still holding the guard, so len() never reports an
        // entry the map no longer has.
        if removed.is_some() {
            self.nr_entries.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// Removes every entry, returning them for caller-side disposal.
    pub(crate) fn drain(&self) -> Vec<(u64, Slot)> {
        let mut slots = self.slots.write();
        let drained: Vec<_> = std::mem::take(&mut *slots).into_iter().collect();
        self.nr_entries.store(0, Ordering::Release);
        drained
    }

    /// Ordered snapshot of up to `max` entries starting at `start`, taken
    /// under one read-lock acquisition.
    pub(crate) fn lookup_range(
        &self,
        start: u64,
        max: usize,
    ) -> SmallVec<[(u64, Slot); BATCH_CAPACITY]> {
        self.slots
            .read()
            .range(start..)
            .take(max)
            .map(|(offset, slot)| (*offset, slot.clone()))
            .collect()
    }
}
