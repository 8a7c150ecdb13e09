//! # Configuration Module
//!
//! This module centralizes all configuration constants for holestore. Constants
//! are grouped by their functional area and interdependencies are documented
//! and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The page size, batch capacity, and memory budget pools all depend on each
//! other: the budget floor must cover at least the reserved page pool, and the
//! reserved page pool must hold at least one page or the COW path can never
//! allocate. Co-locating the values with compile-time checks prevents the
//! constants from drifting apart.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
