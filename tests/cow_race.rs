//! # Concurrent COW Race Tests
//!
//! These tests verify the engine's core concurrency guarantee under real
//! thread contention: for any offset, no matter how many writers race to COW
//! the same sentinel, exactly one private page is ever installed, every loser
//! releases its allocation, and every racing caller walks away holding the
//! winner's page.
//!
//! ## Test Goals
//!
//! 1. **At-most-one-install**: one installed page per offset per race
//! 2. **Loser adoption**: all racers return the same page instance
//! 3. **No leaks**: the memory budget shows exactly one live page per
//!    COW'd offset after the dust settles
//! 4. **Counter consistency**: the hole counters agree with the index
//!    contents even under contention

use std::sync::{Arc, Barrier};
use std::thread;

use holestore::{HoleStore, MemoryBudget, SentinelKind, PAGE_SIZE};

const RACERS: usize = 8;

#[test]
fn test_at_most_one_install_per_offset() {
    let budget = Arc::new(MemoryBudget::with_limit(64 * 1024 * 1024));
    let engine = Arc::new(HoleStore::with_budget(Some(Arc::clone(&budget))));
    let store = engine.open_store(1);

    engine.replace_entry(&store, 1, SentinelKind::Hole).unwrap();
    let observed = store.lookup(1).unwrap();

    let barrier = Arc::new(Barrier::new(RACERS));
    let mut handles = Vec::new();

    for _ in 0..RACERS {
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

    // Every racer adopted the same installed page.
    let winner = &pages[0];
    for page in &pages {
        assert!(Arc::ptr_eq(winner, page));
    }
    assert!(winner.is_uptodate());
    assert!(winner.is_zeroed());

    // The installed slot is the winner, and the losers' allocations were
    // refunded: exactly one page buffer is charged against the budget.
    let installed = store.lookup(1).unwrap();
    assert!(Arc::ptr_eq(installed.backing().unwrap(), winner));
    assert_eq!(budget.stats().pages_used, PAGE_SIZE);

    let counters = engine.accounting().counters();
    assert_eq!(counters.cur_holes, 0);
    assert_eq!(counters.total_holes, 1);
    assert_eq!(counters.total_cowed, 1);
}

#[test]
fn test_races_on_many_offsets_stay_independent() {
    const OFFSETS: u64 = 16;

    let budget = Arc::new(MemoryBudget::with_limit(64 * 1024 * 1024));
    let engine = Arc::new(HoleStore::with_budget(Some(Arc::clone(&budget))));
    let store = engine.open_store(1);

    for offset in 0..OFFSETS {
        engine
            .replace_entry(&store, offset, SentinelKind::Zero)
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(RACERS));
    let mut handles = Vec::new();

    for _ in 0..RACERS {
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);

        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut pages = Vec::new();
            for offset in 0..OFFSETS {
                let observed = store.lookup(offset).unwrap();
                if observed.is_page() {
                    // Another racer already won this offset; a real fault
                    // path would just use the installed page.
                    pages.push(observed.backing().unwrap().clone());
                } else {
                    pages.push(engine.cow(&store, offset, &observed).unwrap());
                }
            }
            pages
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // All racers converged on the same page per offset.
    for offset in 0..OFFSETS {
        let installed = store.lookup(offset).unwrap();
        let winner = installed.backing().unwrap();
        for pages in &results {
            assert!(Arc::ptr_eq(&pages[offset as usize], winner));
        }
    }

    drop(results);
    assert_eq!(budget.stats().pages_used, OFFSETS as usize * PAGE_SIZE);

    let counters = engine.accounting().counters();
    assert_eq!(counters.cur_holes, 0);
    assert_eq!(counters.total_holes, OFFSETS);
    assert_eq!(counters.total_cowed, OFFSETS);
}

#[test]
fn test_concurrent_marking_and_cowing_keeps_counters_consistent() {
    let engine = Arc::new(HoleStore::new());
    let threads = 4;
    let per_thread = 64u64;

    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::new();

    // Each thread works a disjoint store: mark holes, COW half of them.
    for t in 0..threads {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);

        handles.push(thread::spawn(move || {
            let store = engine.open_store(t as u32);
            barrier.wait();

            for offset in 0..per_thread {
                engine
                    .replace_entry(&store, offset, SentinelKind::Hole)
                    .unwrap();
            }
            for offset in 0..per_thread / 2 {
                let observed = store.lookup(offset).unwrap();
                engine.cow(&store, offset, &observed).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total = threads as u64 * per_thread;
    let cowed = threads as u64 * (per_thread / 2);

    let counters = engine.accounting().counters();
    assert_eq!(counters.total_holes, total);
    assert_eq!(counters.total_cowed, cowed);
    assert_eq!(counters.cur_holes, total - cowed);
    assert!(counters.total_cowed <= counters.total_holes);

    // cur_holes matches the number of live sentinel entries across stores.
    let mut live_sentinels = 0u64;
    for t in 0..threads {
        let store = engine.store(t as u32).unwrap();
        for offset in 0..per_thread {
            if store.lookup(offset).is_some_and(|s| s.is_sentinel()) {
                live_sentinels += 1;
            }
        }
    }
    assert_eq!(counters.cur_holes, live_sentinels);
}
