//! # holestore - Deduplicated COW Backing for a Sparse Page Store
//!
//! holestore is an in-memory cache that maps (store, offset) pairs to data
//! pages without materializing a physical page for every offset. Offsets
//! whose content is absent ("a hole") or all-zero share a single physical
//! resource through sentinel entries; the first divergent write transparently
//! copy-on-writes a private page into place, exactly once per offset no
//! matter how many writers race for it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use holestore::{HoleStore, SentinelKind};
//!
//! let engine = HoleStore::new();
//! let store = engine.open_store(1);
//!
//! // Mark an offset as a hole: logically zero, backed by nothing.
//! engine.replace_entry(&store, 7, SentinelKind::Hole)?;
//!
//! // First write faults: COW a private zero-filled page into place.
//! let observed = store.lookup(7).unwrap();
//! let page = engine.cow(&store, 7, &observed)?;
//!
//! // File shrank: drop the entry and reconcile accounting.
//! engine.truncate(&store, 7);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Fault/Write Path (external)        │
//! ├─────────────────────────────────────────┤
//! │   HoleStore: COW · undupe · truncate     │
//! │   replace_entry · batch_lookup           │
//! ├───────────────────┬─────────────────────┤
//! │  Store (sparse    │  Shared zero page + │
//! │  offset → slot    │  HoleAccounting     │
//! │  index, per-file) │  (process-wide)     │
//! ├───────────────────┴─────────────────────┤
//! │   PageAllocator over MemoryBudget        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Preemptible shared-memory threads. Each store carries one `RwLock`; every
//! mutation is a single write-lock acquisition combining the identity compare
//! with the slot write, so two writers can never linearize inconsistently.
//! Allocation and content population run outside the lock. A COW loser
//! releases its allocation and adopts the winner's page; nothing is retried
//! internally.
//!
//! ## Error Model
//!
//! All fallible APIs return `eyre::Result`. Typed errors are downcastable:
//!
//! - [`AllocationError`] - budget refused a page; recoverable, caller may
//!   re-fault and retry
//! - [`SlotStateError`] - a documented precondition was violated; the
//!   operation aborted with no partial mutation
//! - [`DedupUnsupportedError`] - content-based dedup reconstruction was
//!   requested, which is not implemented
//!
//! ## Module Overview
//!
//! - [`store`]: sparse index, slot model, COW engine, batch view
//! - [`memory`]: memory budget and page allocation
//! - [`accounting`]: process-wide hole counters
//! - [`config`]: centralized constants

pub mod accounting;
pub mod config;
pub mod memory;
pub mod store;

pub use accounting::{HoleAccounting, HoleCounters};
pub use memory::{AllocationError, BudgetStats, MemoryBudget, Pool};
pub use store::{
    BatchEntry, BatchView, DedupUnsupportedError, HoleStore, PageAllocator, PagePosition,
    PhysicalPage, ReplaceOutcome, SentinelKind, Slot, SlotStateError, Store, StoreId,
    BATCH_CAPACITY, PAGE_SIZE,
};
