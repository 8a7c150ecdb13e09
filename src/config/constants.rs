//! # Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Constants that depend
//! on each other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (16384 bytes)
//!       │
//!       ├─> PAGES_RESERVED (must hold at least one page, or the COW
//!       │     path can never allocate a private page)
//!       │
//!       └─> MemoryBudget charge unit: every private page charges
//!             exactly PAGE_SIZE against the Pages pool
//!
//! PAGES_RESERVED (512 KB)
//!       │
//!       └─> TOTAL_RESERVED (sum of all reserved pools)
//!             │
//!             └─> MIN_BUDGET_FLOOR (must cover TOTAL_RESERVED or the
//!                   reserved pool is a guarantee the budget cannot keep)
//!
//! BATCH_CAPACITY (15 entries)
//!       │
//!       └─> BatchView inline storage; bulk consumers see at most this
//!             many (offset, slot) pairs per lookup
//! ```
//!
//! ## Critical Invariants
//!
//! These invariants are enforced by compile-time assertions:
//!
//! 1. `PAGE_SIZE` is a power of two (offset arithmetic assumes it)
//! 2. `PAGES_RESERVED >= PAGE_SIZE` (at least one page always allocatable)
//! 3. `MIN_BUDGET_FLOOR >= TOTAL_RESERVED` (floor covers all reservations)
//! 4. `BATCH_CAPACITY > 0` (an empty batch view is useless)
//!
//! ## Usage
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{PAGE_SIZE, BATCH_CAPACITY};
//! ```

// ============================================================================
// PAGE LAYOUT
// ============================================================================

/// Size of every physical page in bytes, including the shared zero page.
///
/// 16KB pages: larger than the common 4KB OS page for better sequential
/// throughput, still a clean multiple of every OS page size we run on.
pub const PAGE_SIZE: usize = 16384;

const _: () = assert!(PAGE_SIZE.is_power_of_two(), "PAGE_SIZE must be a power of two");

// ============================================================================
// BATCH VIEW
// ============================================================================

/// Maximum number of (offset, slot) entries a `BatchView` holds.
///
/// Bulk consumers that want more entries issue another lookup starting past
/// the last offset they saw. Sized so the view's inline storage stays small
/// enough to live on the stack.
pub const BATCH_CAPACITY: usize = 15;

const _: () = assert!(BATCH_CAPACITY > 0, "BATCH_CAPACITY must be non-zero");

// ============================================================================
// MEMORY BUDGET
// The budget constants define reservation pools. Total reserved is the sum
// of all pools; the remaining budget is shared dynamically.
// ============================================================================

/// Percentage of system RAM used when auto-detecting the budget limit.
pub const DEFAULT_BUDGET_PERCENT: usize = 25;

/// Absolute minimum budget regardless of detected system memory (4 MB).
pub const MIN_BUDGET_FLOOR: usize = 4 * 1024 * 1024;

/// Minimum guaranteed allocation for private page buffers (512 KB).
pub const PAGES_RESERVED: usize = 512 * 1024;

/// Sum of all reserved pools. The shared pool is the budget remainder.
pub const TOTAL_RESERVED: usize = PAGES_RESERVED;

const _: () = assert!(
    PAGES_RESERVED >= PAGE_SIZE,
    "PAGES_RESERVED must hold at least one page"
);

const _: () = assert!(
    MIN_BUDGET_FLOOR >= TOTAL_RESERVED,
    "MIN_BUDGET_FLOOR must cover all reserved pools"
);
