//! # Memory Budget Management
//!
//! This module provides memory budget tracking and enforcement for holestore.
//! Every private page materialized by the COW engine charges [`PAGE_SIZE`]
//! bytes against the budget; the charge is refunded when the page is dropped.
//!
//! ## Architecture
//!
//! The budget uses a **reserved minimum + shared pool** model:
//!
//! ```text
//! +----------------------------------------------------------+
//! |                  Total Memory Budget                      |
//! |  (default: 25% of system RAM, minimum floor: 4 MB)       |
//! +----------------------------------------------------------+
//! |                                                          |
//! |  Reserved Pool (guaranteed minimum):                     |
//! |  +----------+                                            |
//! |  | Pages    |                                            |
//! |  | 512 KB   |                                            |
//! |  +----------+                                            |
//! |                                                          |
//! |  Shared Pool (remainder):                                |
//! |  +----------------------------------------------------+  |
//! |  | Available to page allocation when reserved exceeded|  |
//! |  +----------------------------------------------------+  |
//! |                                                          |
//! +----------------------------------------------------------+
//! ```
//!
//! ## Enforcement Model
//!
//! Hard limits: allocations that would exceed the budget are refused with an
//! [`AllocationError`]. The COW engine never retries internally; the refusal
//! bubbles to the caller, which decides whether to re-fault and try again.
//!
//! ## Configuration
//!
//! ```rust,ignore
//! // Auto-detect (25% of system RAM, 4MB floor)
//! let budget = MemoryBudget::auto_detect();
//!
//! // Explicit limit
//! let budget = MemoryBudget::with_limit(16 * 1024 * 1024); // 16 MB
//! ```
//!
//! [`PAGE_SIZE`]: crate::config::PAGE_SIZE

mod budget;

pub use budget::{AllocationError, BudgetStats, MemoryBudget, Pool};
