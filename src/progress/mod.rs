//! Progress reporting module
//!
//! Observers receive transfer events from the engine: a tracing sink for
//! logs, an indicatif bar for interactive terminals, and a silent default.

mod observer;
mod reporter;

pub use observer::*;
pub use reporter::*;
