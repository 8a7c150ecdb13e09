//! # Hole Accounting
//!
//! Process-wide telemetry for sentinel-backed offsets. Three counters track
//! the lifecycle of holes across every store sharing one engine:
//!
//! - `cur_holes`: offsets currently holding a sentinel (hole or shared zero)
//! - `total_holes`: sentinels ever installed (monotonic)
//! - `total_cowed`: sentinels ever replaced by a private page (monotonic)
//!
//! ## Design
//!
//! The counters are advisory telemetry, not correctness-critical state, but
//! they carry invariants the engine relies on in tests:
//!
//! - no counter is ever negative (decrements saturate at zero)
//! - `total_cowed <= total_holes` (every COW consumed an installed sentinel)
//! - `cur_holes` equals the number of live sentinel entries across all stores
//!
//! Mutation happens at the same call sites that change the counters' inputs:
//! the engine records a hole, a COW, or a truncation immediately after the
//! index mutation that makes it true. The service is injected (constructed
//! once with the engine, shared by `Arc`) rather than ambient, so tests can
//! observe it in isolation.
//!
//! ## Thread Safety
//!
//! All counters are atomics; no lock is required. The engine's per-store write
//! lock already serializes the index mutations that drive the counters, so the
//! counters can only lag a concurrent reader by an in-flight operation, never
//! drift.

use std::sync::atomic::{AtomicU64, Ordering};

/// Injected counter service. One per engine, shared by `Arc`.
#[derive(Debug, Default)]
pub struct HoleAccounting {
    cur_holes: AtomicU64,
    total_holes: AtomicU64,
    total_cowed: AtomicU64,
}

/// Point-in-time snapshot of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoleCounters {
    pub cur_holes: u64,
    pub total_holes: u64,
    pub total_cowed: u64,
}

impl std::fmt::Display for HoleCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "holes:{}/{},cowed:{}",
            self.cur_holes, self.total_holes, self.total_cowed
        )
    }
}

impl HoleAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sentinel was installed at an offset that did not hold one.
    pub fn record_hole(&self) {
        self.cur_holes.fetch_add(1, Ordering::AcqRel);
        self.total_holes.fetch_add(1, Ordering::AcqRel);
    }

    /// A sentinel was replaced by a private page.
    pub fn record_cow(&self) {
        self.dec_cur_holes();
        self.total_cowed.fetch_add(1, Ordering::AcqRel);
    }

    /// A sentinel entry was truncated out of its store.
    pub fn record_truncated_hole(&self) {
        self.dec_cur_holes();
    }

    pub fn counters(&self) -> HoleCounters {
        HoleCounters {
            cur_holes: self.cur_holes.load(Ordering::Acquire),
            total_holes: self.total_holes.load(Ordering::Acquire),
            total_cowed: self.total_cowed.load(Ordering::Acquire),
        }
    }

    fn dec_cur_holes(&self) {
        loop {
            let current = self.cur_holes.load(Ordering::Acquire);
            debug_assert!(current > 0, "cur_holes decremented below zero");
            let new_value = current.saturating_sub(1);

            match self.cur_holes.compare_exchange_weak(
                current,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }
}
