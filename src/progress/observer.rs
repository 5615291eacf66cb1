//! Transfer event sinks
//!
//! The engine reports every notable event through [`TransferObserver`].
//! Methods are called from the collecting thread only, but implementations
//! must still be `Send + Sync` so one observer can be shared by several
//! operations.

use crate::core::{TransferRange, TransferReport};
use crate::error::BackupError;
use std::path::Path;
use std::time::Duration;

/// Receives transfer lifecycle events; every method defaults to a no-op
pub trait TransferObserver: Send + Sync {
    /// A transfer is about to schedule its tasks
    fn transfer_started(&self, _source: &Path, _dest: &Path, _total_bytes: u64, _ranges: usize) {}

    /// A task copied its whole range
    fn range_completed(&self, _index: usize, _range: TransferRange, _bytes: u64) {}

    /// A task copied fewer bytes than its range length
    fn short_transfer(&self, _index: usize, _range: TransferRange, _copied: u64) {}

    /// A task hit an I/O fault
    fn task_failed(&self, _index: usize, _range: TransferRange, _error: &BackupError) {}

    /// The bounded wait elapsed with tasks still unconfirmed
    fn timed_out(&self, _outstanding: usize, _timeout: Duration) {}

    /// The transfer has an aggregate outcome
    fn transfer_finished(&self, _report: &TransferReport) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TransferObserver for NullObserver {}

/// Emits events as `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn transfer_started(&self, source: &Path, dest: &Path, total_bytes: u64, ranges: usize) {
        tracing::debug!(
            "Transferring {} ({}) to {} in {} range(s)",
            source.display(),
            humansize::format_size(total_bytes, humansize::BINARY),
            dest.display(),
            ranges
        );
    }

    fn range_completed(&self, index: usize, range: TransferRange, bytes: u64) {
        tracing::trace!("Range {} {} done ({} bytes)", index, range, bytes);
    }

    fn short_transfer(&self, index: usize, range: TransferRange, copied: u64) {
        tracing::warn!(
            "Short transfer on range {} {}: copied {} of {} bytes",
            index,
            range,
            copied,
            range.length
        );
    }

    fn task_failed(&self, index: usize, range: TransferRange, error: &BackupError) {
        tracing::error!("Range {} {} failed: {}", index, range, error);
    }

    fn timed_out(&self, outstanding: usize, timeout: Duration) {
        tracing::error!(
            "Timed out after {} with {} range(s) unconfirmed",
            humantime::format_duration(timeout),
            outstanding
        );
    }

    fn transfer_finished(&self, report: &TransferReport) {
        if report.is_success() {
            tracing::debug!(
                "Transfer finished: {} range(s), {} in {:.1?} ({}/s)",
                report.ranges_planned(),
                humansize::format_size(report.bytes_copied, humansize::BINARY),
                report.duration,
                humansize::format_size(report.throughput() as u64, humansize::BINARY)
            );
        }
    }
}
