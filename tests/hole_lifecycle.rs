//! # Hole Lifecycle Tests
//!
//! End-to-end walks through the slot state machine: absent → sentinel →
//! private page → sentinel → absent, checking content equivalence, counter
//! consistency, and truncation finality at every step.
//!
//! ## Test Goals
//!
//! 1. **Sentinel equivalence**: content read through any sentinel is all-zero
//! 2. **Round-trip**: undupe followed by cow reproduces zero content on a
//!    freshly allocated page
//! 3. **Truncation finality**: a truncated offset reads as absent and no
//!    engine-held reference to its resource survives
//! 4. **Recoverability**: a failed allocation leaves the index untouched and
//!    the same call succeeds once memory is available again

use std::sync::{Arc, Barrier};
use std::thread;

use holestore::{
    AllocationError, HoleStore, MemoryBudget, Pool, SentinelKind, Slot, PAGE_SIZE,
};

#[test]
fn test_two_writers_one_page_then_truncate() {
    // Store with offsets 0..3 absent; offset 1 becomes a hole; two writers
    // race to COW it; the survivor is truncated away.
    let engine = Arc::new(HoleStore::new());
    let store = engine.open_store(1);

    for offset in 0..4 {
        assert!(store.lookup(offset).is_none());
    }

    engine.replace_entry(&store, 1, SentinelKind::Hole).unwrap();
    assert_eq!(engine.accounting().counters().cur_holes, 1);

    let observed = store.lookup(1).unwrap();
    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        let observed = observed.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            engine.cow(&store, 1, &observed).unwrap()
        }));
    }
    let pages: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Exactly one page was installed; the other thread received it back.
    assert!(Arc::ptr_eq(&pages[0], &pages[1]));
    let counters = engine.accounting().counters();
    assert_eq!(counters.cur_holes, 0);
    assert_eq!(counters.total_cowed, 1);

    // Truncating a private page changes no hole counter.
    engine.truncate(&store, 1);
    assert!(store.lookup(1).is_none());
    assert_eq!(engine.accounting().counters(), counters);
}

#[test]
fn test_sentinel_content_is_all_zero() {
    let engine = HoleStore::new();
    let store = engine.open_store(1);

    // The shared zero page itself.
    assert_eq!(engine.zero_page().data().len(), PAGE_SIZE);
    assert!(engine.zero_page().is_zeroed());
    assert!(engine.zero_page().is_uptodate());

    // A Zero slot reads through to the shared page.
    engine.replace_entry(&store, 5, SentinelKind::Zero).unwrap();
    let slot = store.lookup(5).unwrap();
    let backing = slot.backing().unwrap();
    assert!(Arc::ptr_eq(backing, engine.zero_page()));
    assert!(backing.data().iter().all(|&b| b == 0));

    // A Hole has no backing; materializing it yields the same zero content.
    engine.replace_entry(&store, 6, SentinelKind::Hole).unwrap();
    let observed = store.lookup(6).unwrap();
    assert!(observed.backing().is_none());
    let page = engine.cow(&store, 6, &observed).unwrap();
    assert!(page.data().iter().all(|&b| b == 0));
}

#[test]
fn test_undupe_cow_round_trip() {
    let engine = HoleStore::new();
    let store = engine.open_store(1);

    engine.replace_entry(&store, 3, SentinelKind::Hole).unwrap();
    let observed = store.lookup(3).unwrap();
    let first = engine.cow(&store, 3, &observed).unwrap();

    // The page stayed all-zero, so dedup policy retires it.
    engine.undupe(&store, 3, &first).unwrap();
    let sentinel = store.lookup(3).unwrap();
    assert!(sentinel.is_sentinel());

    // A later write faults it back in: same content, fresh allocation.
    let second = engine.cow(&store, 3, &sentinel).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.is_zeroed());
    assert!(second.is_uptodate());
    assert_eq!(second.position().unwrap().offset, 3);

    let counters = engine.accounting().counters();
    assert_eq!(counters.total_holes, 2);
    assert_eq!(counters.total_cowed, 2);
    assert_eq!(counters.cur_holes, 0);
}

#[test]
fn test_truncation_releases_the_last_reference() {
    let budget = Arc::new(MemoryBudget::with_limit(64 * 1024 * 1024));
    let engine = HoleStore::with_budget(Some(Arc::clone(&budget)));
    let store = engine.open_store(1);

    engine.replace_entry(&store, 0, SentinelKind::Hole).unwrap();
    let observed = store.lookup(0).unwrap();
    let page = engine.cow(&store, 0, &observed).unwrap();
    assert_eq!(budget.stats().pages_used, PAGE_SIZE);

    let removed = engine.truncate(&store, 0).unwrap();
    assert!(store.lookup(0).is_none());

    // The engine no longer references the page; once the caller drops its
    // handle and the removed snapshot, the buffer is gone.
    drop(removed);
    drop(page);
    assert_eq!(budget.stats().pages_used, 0);

    // Truncating a sentinel entry reconciles the hole count.
    engine.replace_entry(&store, 9, SentinelKind::Zero).unwrap();
    assert_eq!(engine.accounting().counters().cur_holes, 1);
    let removed = engine.truncate(&store, 9).unwrap();
    assert!(matches!(removed, Slot::Zero(_)));
    assert_eq!(engine.accounting().counters().cur_holes, 0);
}

#[test]
fn test_failed_allocation_is_recoverable_by_retry() {
    let budget = Arc::new(MemoryBudget::with_limit(holestore::config::MIN_BUDGET_FLOOR));
    let engine = HoleStore::with_budget(Some(Arc::clone(&budget)));
    let store = engine.open_store(1);

    engine.replace_entry(&store, 0, SentinelKind::Hole).unwrap();

    // Exhaust the budget with an unrelated charge.
    let hog = budget.total_limit();
    budget.allocate(Pool::Shared, hog).unwrap();

    let observed = store.lookup(0).unwrap();
    let err = engine.cow(&store, 0, &observed).unwrap_err();
    assert!(err.downcast_ref::<AllocationError>().is_some());
    assert!(matches!(store.lookup(0), Some(Slot::Hole)));

    // Memory frees up; the caller re-faults with the same observation.
    budget.release(Pool::Shared, hog);
    let page = engine.cow(&store, 0, &observed).unwrap();
    assert!(page.is_uptodate());
    assert_eq!(engine.accounting().counters().total_cowed, 1);
}

#[test]
fn test_store_teardown_reconciles_everything() {
    let budget = Arc::new(MemoryBudget::with_limit(64 * 1024 * 1024));
    let engine = HoleStore::with_budget(Some(Arc::clone(&budget)));

    let store_a = engine.open_store(1);
    let store_b = engine.open_store(2);

    engine.replace_entry(&store_a, 0, SentinelKind::Hole).unwrap();
    engine.replace_entry(&store_a, 1, SentinelKind::Zero).unwrap();
    engine.replace_entry(&store_b, 0, SentinelKind::Hole).unwrap();
    let observed = store_b.lookup(0).unwrap();
    let page = engine.cow(&store_b, 0, &observed).unwrap();
    drop(page);

    assert_eq!(engine.accounting().counters().cur_holes, 2);

    assert_eq!(engine.remove_store(1), 2);
    assert_eq!(engine.accounting().counters().cur_holes, 0);

    assert_eq!(engine.remove_store(2), 1);
    // Dropping store B's index released the last reference to its page.
    assert_eq!(budget.stats().pages_used, 0);
}
