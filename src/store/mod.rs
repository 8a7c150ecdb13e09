//! # Store Module
//!
//! This module implements the sparse index and COW engine at the heart of
//! holestore: the mapping from (store, offset) to a slot value, and the locked
//! protocols that move a slot between sentinel and private-page states without
//! ever installing two pages at one offset or leaking an allocation.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            HoleStore (engine)                 │
//! │  zero page · accounting · allocator · stores  │
//! ├──────────────────────────────────────────────┤
//! │  Store (one per file): RwLock<BTreeMap>       │
//! │    offset → Slot { Hole | Zero | Page }       │
//! ├──────────────────────────────────────────────┤
//! │  PhysicalPage: PAGE_SIZE buffer + uptodate    │
//! │  flag + recorded (store, offset) position     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Sentinel Sharing
//!
//! Many offsets share one physical resource through sentinel slots:
//!
//! - `Hole`: the offset is known all-zero and has no backing at all
//! - `Zero`: the offset is backed by the single process-wide zero page,
//!   reference-counted through `Arc` clones held by each pointing slot
//!
//! The first divergent write COWs a private page into place; the inverse
//! operation retires a private all-zero page back to a sentinel.
//!
//! ## Lock Discipline
//!
//! Each store carries one `parking_lot::RwLock`. Read-side lookups take the
//! shared lock and return a snapshot with no freshness promise. Every mutation
//! runs as a single write-lock acquisition in which the decision (identity
//! compare) and the write happen together, so check-then-act races are closed
//! structurally. Page allocation and content population never run under the
//! lock.
//!
//! ## Module Organization
//!
//! - `page`: physical page, allocator, shared zero page
//! - `slot`: the slot value model and identity comparison
//! - `index`: per-store sparse index (lookup / replace / delete)
//! - `engine`: COW, un-duplication, truncation, generic installer
//! - `batch`: fixed-capacity batch view for bulk consumers

mod batch;
mod engine;
mod index;
mod page;
mod slot;

pub use batch::{BatchEntry, BatchView};
pub use engine::{DedupUnsupportedError, HoleStore};
pub use index::{ReplaceOutcome, SlotStateError, Store};
pub use page::{PageAllocator, PagePosition, PhysicalPage};
pub use slot::{SentinelKind, Slot};

pub use crate::config::{BATCH_CAPACITY, PAGE_SIZE};

/// Identifier of one logical store (one open file's cached content).
pub type StoreId = u32;
