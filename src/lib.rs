//! # Chunkback - Parallel Chunked File Backup
//!
//! Chunkback copies a single file into a timestamped backup location by
//! splitting it into contiguous byte ranges and moving every range on its own
//! worker thread, then restores a backup the same way.
//!
//! ## Features
//!
//! - **Range Planning**: Exact, gap-free partitions bounded by worker count and chunk size
//! - **Parallel Transfer**: Bounded rayon pool per call, positioned handles per task
//! - **Zero-copy**: `copy_file_range` on Linux with a buffered fallback
//! - **Bounded Wait**: A timeout yields a distinct incomplete outcome instead of hanging
//! - **Sequential Mode**: Whole-file copy on a single worker with the same bounded wait
//!
//! ## Quick Start
//!
//! ```no_run
//! use chunkback::config::BackupConfig;
//! use chunkback::core::BackupManager;
//! use std::path::Path;
//!
//! let manager = BackupManager::new(BackupConfig::default());
//!
//! let backup = manager.backup(Path::new("/data/input.bin")).unwrap();
//! manager.restore(&backup, Path::new("/data/restored.bin")).unwrap();
//! ```
//!
//! ## Driving the Engine Directly
//!
//! ```no_run
//! use chunkback::core::{plan, FileRangeTransfer, ParallelTransferEngine};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let ranges = plan(3 * 1024 * 1024, 4, 1024 * 1024);
//! let engine = ParallelTransferEngine::new(Arc::new(FileRangeTransfer::default()));
//!
//! // Destination must already exist at its final size
//! let report = engine
//!     .execute(Path::new("/src.bin"), Path::new("/dst.bin"), &ranges, 4, Duration::from_secs(30))
//!     .unwrap();
//! println!("Copied {} bytes in {:?}", report.bytes_copied, report.duration);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod progress;

// Re-export commonly used types
pub use config::{BackupConfig, TransferMode};
pub use crate::core::{BackupManager, ParallelTransferEngine, TransferOutcome, TransferRange, TransferReport};
pub use error::{BackupError, Result};
pub use progress::{ProgressReporter, TracingObserver, TransferObserver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use chunkback::prelude::*;
    //! ```

    pub use crate::config::{BackupConfig, TransferMode};
    pub use crate::core::{
        plan, BackupManager, CancellationToken, FileRangeTransfer, ParallelTransferEngine,
        RangeTransfer, TransferOutcome, TransferRange, TransferReport,
    };
    pub use crate::error::{BackupError, Result};
    pub use crate::fs::{DestinationAllocator, DestinationNamer, PreallocatingAllocator, TimestampNamer};
    pub use crate::progress::{NullObserver, ProgressReporter, TracingObserver, TransferObserver};
}
