//! Domain models for the POS inventory platform

mod catalog;
mod code;
mod event;
mod ledger;
mod movement;
mod receipt;
mod report;

pub use catalog::*;
pub use code::*;
pub use event::*;
pub use ledger::*;
pub use movement::*;
pub use receipt::*;
pub use report::*;
