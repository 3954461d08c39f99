//! Common utility functions shared across the ledgers.
//!
//! # Design Principles
//!
//! - **Pure functions only** - no side effects, no I/O
//! - **One case policy** - every name comparison in the domain goes through
//!   [`normalize_for_lookup`], so case handling is a single testable rule

pub mod string;

pub use string::{eq_for_lookup, normalize_for_lookup, starts_with_for_lookup, title_case};
