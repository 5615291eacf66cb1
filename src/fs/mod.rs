//! File system collaborators
//!
//! Destination naming and pre-allocation used by the backup entry points.

mod allocate;
mod naming;

pub use allocate::*;
pub use naming::*;
