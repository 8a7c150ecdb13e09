//! # Slot Value Model
//!
//! Each occupied offset in a store holds one [`Slot`]. Absence of an entry is
//! modeled as `Option::<Slot>::None` ("never populated"), which is distinct
//! from [`Slot::Hole`] ("known empty, not yet materialized").
//!
//! ## Identity, Not Content
//!
//! The compare-and-replace protocol compares slots by identity: `Hole` only
//! equals `Hole`, and resource-backed slots compare by pointer equality of the
//! underlying page. Two private pages with identical bytes are still distinct
//! entries; content never participates in the comparison. This is what lets a
//! racing COW detect "someone else already replaced this exact sentinel"
//! without reading page content under the lock.

use std::sync::Arc;

use super::page::PhysicalPage;

/// The value stored at one occupied offset.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Logically all-zero, backed by nothing.
    Hole,
    /// Logically all-zero, backed by the process-wide shared zero page. The
    /// held `Arc` clone is this slot's reference on the shared resource.
    Zero(Arc<PhysicalPage>),
    /// Store-private page with offset-specific content, exclusively owned by
    /// this offset until COW, un-duplication, or truncation moves it.
    Page(Arc<PhysicalPage>),
}

impl Slot {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Slot::Hole | Slot::Zero(_))
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Slot::Page(_))
    }

    /// The backing resource, if the slot has one.
    pub fn backing(&self) -> Option<&Arc<PhysicalPage>> {
        match self {
            Slot::Hole => None,
            Slot::Zero(page) | Slot::Page(page) => Some(page),
        }
    }

    /// Identity comparison for the compare-and-replace protocol.
    pub fn same_entry(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Hole, Slot::Hole) => true,
            (Slot::Zero(a), Slot::Zero(b)) => Arc::ptr_eq(a, b),
            (Slot::Page(a), Slot::Page(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Which sentinel a generic install request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    /// Unbacked hole.
    Hole,
    /// Shared zero page.
    Zero,
    /// Deduplicated arbitrary content. Reconstruction is not implemented;
    /// install requests are refused with a recoverable error.
    Data,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PageAllocator;

    #[test]
    fn test_hole_equals_only_hole() {
        let page = PageAllocator::new(None).allocate().unwrap();
        assert!(Slot::Hole.same_entry(&Slot::Hole));
        assert!(!Slot::Hole.same_entry(&Slot::Page(page.clone())));
        assert!(!Slot::Hole.same_entry(&Slot::Zero(page)));
    }

    #[test]
    fn test_pages_compare_by_identity_not_content() {
        let a = PageAllocator::new(None).allocate().unwrap();
        let b = PageAllocator::new(None).allocate().unwrap();

        // Same (all-zero) content, different pages.
        assert!(a.is_zeroed() && b.is_zeroed());
        assert!(!Slot::Page(a.clone()).same_entry(&Slot::Page(b)));
        assert!(Slot::Page(a.clone()).same_entry(&Slot::Page(a)));
    }

    #[test]
    fn test_zero_and_page_never_match() {
        let page = PageAllocator::new(None).allocate().unwrap();
        assert!(!Slot::Zero(page.clone()).same_entry(&Slot::Page(page)));
    }

    #[test]
    fn test_sentinel_classification() {
        let page = PageAllocator::new(None).allocate().unwrap();
        assert!(Slot::Hole.is_sentinel());
        assert!(Slot::Zero(page.clone()).is_sentinel());
        assert!(!Slot::Page(page.clone()).is_sentinel());
        assert!(Slot::Page(page).is_page());
    }

    #[test]
    fn test_backing_resource() {
        let page = PageAllocator::new(None).allocate().unwrap();
        assert!(Slot::Hole.backing().is_none());
        assert!(Slot::Zero(page.clone()).backing().is_some());
        assert!(Slot::Page(page).backing().is_some());
    }
}
