//! Configuration module for chunkback
//!
//! Provides the command-line arguments and the runtime settings
//! layered from defaults, an optional JSON file and the environment.

mod settings;

pub use settings::*;
