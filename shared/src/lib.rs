//! Shared types and models for the POS inventory platform
//!
//! This crate contains the domain vocabulary and the pure stock arithmetic
//! used by the backend: ledger valuation, receipt state transitions,
//! movement impact rules and report windows. Nothing in here performs I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
