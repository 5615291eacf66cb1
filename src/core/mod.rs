//! Core transfer module
//!
//! Range planning, positioned range copies, the parallel transfer engine
//! and the backup/restore entry points built on top of them.

mod backup;
mod engine;
mod planner;
mod transfer;

pub use backup::*;
pub use engine::*;
pub use planner::*;
pub use transfer::*;
