//! # Physical Pages
//!
//! A [`PhysicalPage`] is the unit the COW engine materializes: a `PAGE_SIZE`
//! buffer plus the metadata the index and cache-management code need to reason
//! about it.
//!
//! ## Page Metadata
//!
//! - `uptodate`: the content is valid and may be read. Set before a page is
//!   published into an index, never cleared while the page is installed.
//! - `position`: the (store, offset) the page is installed at, recorded on the
//!   page itself so cache-management code can do reverse lookups. Cleared when
//!   the page loses its slot (un-duplication, lost COW race).
//!
//! ## Ownership
//!
//! Pages are handed around as `Arc<PhysicalPage>`: the index holds one clone
//! per occupied slot, callers hold their own. Reference counting is structural
//! (clone-on-share, drop-on-release); a page's buffer is freed exactly when
//! the last handle drops, and the budget charge is refunded at that moment by
//! the `Drop` impl.
//!
//! ## Allocation
//!
//! [`PageAllocator`] charges `PAGE_SIZE` per page against the `Pages` pool of
//! an optional [`MemoryBudget`]. Refusal surfaces as an `AllocationError`,
//! which the COW path propagates to its caller unchanged. Allocation may block
//! on the allocator's CAS loop but never runs under a store lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;

use super::StoreId;
use crate::config::PAGE_SIZE;
use crate::memory::{MemoryBudget, Pool};

/// Where a page is installed: one store, one offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePosition {
    pub store: StoreId,
    pub offset: u64,
}

pub struct PhysicalPage {
    data: Box<[u8; PAGE_SIZE]>,
    uptodate: AtomicBool,
    position: Mutex<Option<PagePosition>>,
    budget: Option<Arc<MemoryBudget>>,
}

impl PhysicalPage {
    /// The budget charge, if any, must already be paid; `Drop` refunds it.
    fn new(budget: Option<Arc<MemoryBudget>>) -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
            uptodate: AtomicBool::new(false),
            position: Mutex::new(None),
            budget,
        }
    }

    /// Creates the process-wide shared zero page: zero-filled, marked
    /// up-to-date, charged to no budget. The engine never frees it.
    pub(crate) fn new_zero_page() -> Arc<Self> {
        let page = Self::new(None);
        page.mark_uptodate();
        Arc::new(page)
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Mutable view of the page buffer through a shared handle.
    ///
    /// # Safety
    ///
    /// The caller must guarantee exclusivity: no other mutable reference
    /// exists and no concurrent reader observes the buffer while it is
    /// mutated. Inside this crate that means the page has not yet been
    /// published into an index and the caller holds the sole handle.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn data_mut_unchecked(&self) -> &mut [u8] {
        let ptr = self.data.as_ptr() as *mut u8;
        // SAFETY: the pointer is derived from a Box and valid for PAGE_SIZE
        // bytes; exclusivity is the caller's contract per the function doc.
        std::slice::from_raw_parts_mut(ptr, PAGE_SIZE)
    }

    /// Fills the buffer with zeroes.
    ///
    /// # Safety
    ///
    /// Same contract as [`PhysicalPage::data_mut_unchecked`]: the caller
    /// holds the sole handle and the page is not published into any index,
    /// so no other reference can observe the buffer during the write.
    pub unsafe fn zero_fill(&self) {
        self.data_mut_unchecked().fill(0);
    }

    pub fn is_uptodate(&self) -> bool {
        self.uptodate.load(Ordering::Acquire)
    }

    pub fn mark_uptodate(&self) {
        self.uptodate.store(true, Ordering::Release);
    }

    pub fn position(&self) -> Option<PagePosition> {
        *self.position.lock()
    }

    pub(crate) fn set_position(&self, position: Option<PagePosition>) {
        *self.position.lock() = position;
    }

    /// True when every byte of the buffer is zero. Used to check the
    /// un-duplication precondition in debug builds and by tests.
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl Drop for PhysicalPage {
    fn drop(&mut self) {
        if let Some(budget) = &self.budget {
            budget.release(Pool::Pages, PAGE_SIZE);
        }
    }
}

impl std::fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalPage")
            .field("uptodate", &self.is_uptodate())
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

/// Allocates private pages against an optional memory budget.
#[derive(Debug, Clone, Default)]
pub struct PageAllocator {
    budget: Option<Arc<MemoryBudget>>,
}

impl PageAllocator {
    pub fn new(budget: Option<Arc<MemoryBudget>>) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Option<&Arc<MemoryBudget>> {
        self.budget.as_ref()
    }

    /// Allocates one zero-initialized page. Fails with `AllocationError` when
    /// the budget refuses the charge; the caller decides whether to retry.
    pub fn allocate(&self) -> Result<Arc<PhysicalPage>> {
        if let Some(budget) = &self.budget {
            budget.allocate(Pool::Pages, PAGE_SIZE)?;
        }

        Ok(Arc::new(PhysicalPage::new(self.budget.clone())))
    }
}
