//! # COW Engine
//!
//! [`HoleStore`] ties the pieces together: the store registry, the shared
//! zero page, the page allocator, and the accounting service. It implements
//! the four protocols that move a slot between states:
//!
//! - **COW** ([`HoleStore::cow`]): sentinel → private page, exactly once per
//!   offset under contention
//! - **Un-duplication** ([`HoleStore::undupe`], [`HoleStore::unback`]):
//!   private all-zero page → sentinel
//! - **Truncation** ([`HoleStore::truncate`]): any state → absent
//! - **Generic install** ([`HoleStore::replace_entry`],
//!   [`HoleStore::insert_page`]): first materialization of an offset
//!
//! ## The COW Race
//!
//! COW is optimistic: allocation and content population happen outside the
//! store lock (allocation may block), then a single locked compare-and-replace
//! decides the winner. The loser's allocation is fully released and the loser
//! adopts the winner's page, so at most one private page is ever installed
//! per offset per race and callers on both sides end up holding the same
//! page:
//!
//! ```text
//! thread A                         thread B
//! --------                         --------
//! observe Hole at offset 7         observe Hole at offset 7
//! allocate pA, zero, uptodate      allocate pB, zero, uptodate
//! lock: slot == Hole? yes          .
//!   install Page(pA)               .
//! unlock, return pA                lock: slot == Hole? no (Page(pA))
//!                                  unlock, drop pB, return pA
//! ```
//!
//! ## Accounting
//!
//! Counter updates happen at the call sites that change their inputs: a
//! sentinel install records a hole, a winning COW records a COW, a truncated
//! sentinel records the removal. The counters are injected (see
//! [`HoleAccounting`]) and shared across every store in the engine.
//!
//! ## Unsupported Dedup
//!
//! Reconstruction of deduplicated arbitrary content is not implemented.
//! Requesting it fails with the recoverable [`DedupUnsupportedError`] and the
//! refused kind can never be installed, so the COW path can never encounter a
//! content-dedup sentinel it cannot rebuild.

use std::sync::Arc;

use eyre::{bail, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::batch::BatchView;
use super::index::{ReplaceOutcome, SlotStateError, Store};
use super::page::{PageAllocator, PagePosition, PhysicalPage};
use super::slot::{SentinelKind, Slot};
use super::StoreId;
use crate::accounting::HoleAccounting;
use crate::memory::MemoryBudget;

/// The deduplication policy reached the unimplemented content-reconstruction
/// branch. Recoverable: nothing was mutated.
#[derive(Debug)]
pub struct DedupUnsupportedError {
    pub store: StoreId,
    pub offset: u64,
}

impl std::fmt::Display for DedupUnsupportedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "content-based deduplication is not supported (store {} offset {})",
            self.store, self.offset
        )
    }
}

impl std::error::Error for DedupUnsupportedError {}

/// Process-wide engine: one shared zero page, one accounting service, one
/// allocator, and the registry of open stores.
#[derive(Debug)]
pub struct HoleStore {
    stores: RwLock<HashMap<StoreId, Arc<Store>>>,
    allocator: PageAllocator,
    zero_page: Arc<PhysicalPage>,
    accounting: Arc<HoleAccounting>,
}

impl HoleStore {
    /// Engine with no memory budget: page allocation never fails.
    pub fn new() -> Self {
        Self::with_budget(None)
    }

    pub fn with_budget(budget: Option<Arc<MemoryBudget>>) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            allocator: PageAllocator::new(budget),
            zero_page: PhysicalPage::new_zero_page(),
            accounting: Arc::new(HoleAccounting::new()),
        }
    }

    pub fn accounting(&self) -> &Arc<HoleAccounting> {
        &self.accounting
    }

    pub fn budget(&self) -> Option<&Arc<MemoryBudget>> {
        self.allocator.budget()
    }

    /// The process-wide zero page backing every `Zero` slot.
    pub fn zero_page(&self) -> &Arc<PhysicalPage> {
        &self.zero_page
    }

    // ------------------------------------------------------------------
    // Store registry
    // ------------------------------------------------------------------

    /// Returns the store for `id`, creating it if needed. Idempotent.
    pub fn open_store(&self, id: StoreId) -> Arc<Store> {
        if let Some(store) = self.stores.read().get(&id) {
            return Arc::clone(store);
        }

        let mut stores = self.stores.write();
        Arc::clone(stores.entry(id).or_insert_with(|| Arc::new(Store::new(id))))
    }

    pub fn store(&self, id: StoreId) -> Option<Arc<Store>> {
        self.stores.read().get(&id).cloned()
    }

    /// Drops a store, truncating every remaining offset and reconciling the
    /// hole counters. Returns the number of entries removed.
    pub fn remove_store(&self, id: StoreId) -> usize {
        let Some(store) = self.stores.write().remove(&id) else {
            return 0;
        };

        let drained = store.drain();
        for (_, slot) in &drained {
            match slot {
                Slot::Hole | Slot::Zero(_) => self.accounting.record_truncated_hole(),
                Slot::Page(page) => page.set_position(None),
            }
        }
        drained.len()
    }

    // ------------------------------------------------------------------
    // COW
    // ------------------------------------------------------------------

    /// Materializes a private page at an offset currently holding `observed`,
    /// a sentinel the caller read from the index.
    ///
    /// Allocation happens outside the lock and may fail with
    /// `AllocationError`; the caller retries the whole operation (re-fault)
    /// if it wants to. Losing the race to another COW is not an error: the
    /// loser's allocation is released and the winner's page is returned, so
    /// every racing caller ends up with the same installed page.
    pub fn cow(&self, store: &Store, offset: u64, observed: &Slot) -> Result<Arc<PhysicalPage>> {
        if observed.is_page() {
            bail!(SlotStateError {
                store: store.id(),
                offset,
                detail: "cow requires a sentinel slot, not a private page",
            });
        }

        let new_page = self.allocator.allocate()?;

        // Populate before publishing: both sentinel kinds mean all-zero
        // content. The page must be valid the instant it becomes reachable.
        //
        // SAFETY: the page was just allocated and is not yet published into
        // any index; this thread holds the sole handle.
        unsafe {
            new_page.zero_fill();
        }
        new_page.mark_uptodate();
        new_page.set_position(Some(PagePosition {
            store: store.id(),
            offset,
        }));

        match store.replace(offset, Some(observed), Slot::Page(Arc::clone(&new_page)))? {
            ReplaceOutcome::Installed => {
                self.accounting.record_cow();
                Ok(new_page)
            }
            ReplaceOutcome::Lost(current) => {
                // Somebody beat us to it: release our allocation and adopt
                // the winner's page.
                new_page.set_position(None);
                drop(new_page);

                match current {
                    Some(Slot::Page(winner)) => Ok(winner),
                    _ => bail!(SlotStateError {
                        store: store.id(),
                        offset,
                        detail: "slot changed to a non-page entry during cow",
                    }),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Un-duplication
    // ------------------------------------------------------------------

    /// Retires `page`, installed at `offset` with all-zero content, back to
    /// the shared zero page.
    ///
    /// Precondition: the caller keeps the page's content stable for the
    /// duration of the call (no concurrent writer), and `page` is the page
    /// actually installed at the offset.
    pub fn undupe(&self, store: &Store, offset: u64, page: &Arc<PhysicalPage>) -> Result<()> {
        let sentinel = Slot::Zero(Arc::clone(&self.zero_page));
        self.retire_page(store, offset, page, sentinel)
    }

    /// Like [`HoleStore::undupe`], but leaves the offset entirely unbacked.
    pub fn unback(&self, store: &Store, offset: u64, page: &Arc<PhysicalPage>) -> Result<()> {
        self.retire_page(store, offset, page, Slot::Hole)
    }

    fn retire_page(
        &self,
        store: &Store,
        offset: u64,
        page: &Arc<PhysicalPage>,
        sentinel: Slot,
    ) -> Result<()> {
        debug_assert!(page.is_zeroed(), "retiring a page with non-zero content");

        let observed = Slot::Page(Arc::clone(page));
        match store.replace(offset, Some(&observed), sentinel)? {
            ReplaceOutcome::Installed => {
                // No longer referenced from the index. The caller may still
                // hold a handle, so this does not always free the page.
                page.set_position(None);
                self.accounting.record_hole();
                Ok(())
            }
            ReplaceOutcome::Lost(_) => bail!(SlotStateError {
                store: store.id(),
                offset,
                detail: "installed page does not match the page being retired",
            }),
        }
    }

    // ------------------------------------------------------------------
    // Generic install
    // ------------------------------------------------------------------

    /// Installs a sentinel of `kind` at `offset`: marks an absent offset as a
    /// hole, or replaces the private page currently there.
    ///
    /// Precondition: the caller has made the slot stable (an absent offset it
    /// owns, or a page it holds locked against writers). A concurrent change
    /// underneath this call is therefore a caller bug, not a race to resolve.
    pub fn replace_entry(&self, store: &Store, offset: u64, kind: SentinelKind) -> Result<()> {
        let sentinel = match kind {
            SentinelKind::Hole => Slot::Hole,
            SentinelKind::Zero => Slot::Zero(Arc::clone(&self.zero_page)),
            SentinelKind::Data => bail!(DedupUnsupportedError {
                store: store.id(),
                offset,
            }),
        };

        let current = store.lookup(offset);
        if let Some(slot) = &current {
            // Already the requested sentinel: nothing to do.
            if slot.same_entry(&sentinel) {
                return Ok(());
            }
        }

        match store.replace(offset, current.as_ref(), sentinel)? {
            ReplaceOutcome::Installed => {
                match current {
                    // First materialization, or a page giving way to a
                    // sentinel: one more hole exists.
                    None => self.accounting.record_hole(),
                    Some(Slot::Page(page)) => {
                        page.set_position(None);
                        self.accounting.record_hole();
                    }
                    // Sentinel kind changed; the hole population did not.
                    Some(Slot::Hole) | Some(Slot::Zero(_)) => {}
                }
                Ok(())
            }
            ReplaceOutcome::Lost(_) => bail!(SlotStateError {
                store: store.id(),
                offset,
                detail: "slot changed concurrently during replace_entry",
            }),
        }
    }

    /// Installs a private page at an absent offset (first write). The page's
    /// position is recorded before it becomes reachable.
    pub fn insert_page(&self, store: &Store, offset: u64, page: Arc<PhysicalPage>) -> Result<()> {
        page.set_position(Some(PagePosition {
            store: store.id(),
            offset,
        }));

        match store.replace(offset, None, Slot::Page(Arc::clone(&page)))? {
            ReplaceOutcome::Installed => Ok(()),
            ReplaceOutcome::Lost(_) => {
                page.set_position(None);
                bail!(SlotStateError {
                    store: store.id(),
                    offset,
                    detail: "offset is already occupied",
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Truncation
    // ------------------------------------------------------------------

    /// Removes the entry at `offset` unconditionally and reconciles sentinel
    /// accounting. A removed private page is returned for the caller to
    /// dispose of (generic cache-eviction code owns page disposal; this
    /// engine owns only the index and sentinel bookkeeping).
    ///
    /// Precondition: the caller has exclusive access to the offset range (no
    /// concurrent COW or un-duplication on the same offset).
    pub fn truncate(&self, store: &Store, offset: u64) -> Option<Slot> {
        let removed = store.delete(offset);

        if let Some(slot) = &removed {
            if slot.is_sentinel() {
                self.accounting.record_truncated_hole();
            }
        }

        removed
    }

    // ------------------------------------------------------------------
    // Batch view
    // ------------------------------------------------------------------

    /// Bounded ordered snapshot of entries starting at `start`, for bulk
    /// consumers. Sentinel entries carry their offset explicitly; see
    /// [`BatchView`].
    pub fn batch_lookup(&self, store: &Store, start: u64) -> BatchView {
        BatchView::lookup(store, start)
    }
}

impl Default for HoleStore {
    fn default() -> Self {
        Self::new()
    }
}
