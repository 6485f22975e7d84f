//! HTTP handlers

pub mod grn;
pub mod health;
pub mod inventory;
pub mod inventory_report;

pub use grn::*;
pub use health::*;
pub use inventory::*;
pub use inventory_report::*;
