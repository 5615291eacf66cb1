//! Terminal progress reporter
//!
//! Uses indicatif for a byte progress bar with throughput and ETA, plus a
//! status spinner for warnings and failures. Every event is also forwarded to
//! [`TracingObserver`] so log output stays the same with or without a bar.

use crate::core::{TransferRange, TransferReport};
use crate::error::BackupError;
use crate::progress::{TracingObserver, TransferObserver};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Progress reporter for backup and restore transfers
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Byte progress bar
    bytes_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
    /// Start of the current transfer
    start_time: Mutex<Instant>,
    /// Total bytes to copy
    total_bytes: AtomicU64,
    /// Bytes copied so far
    bytes_copied: AtomicU64,
    /// Ranges planned
    total_ranges: AtomicU64,
    /// Ranges confirmed
    ranges_done: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let bytes_bar = multi.add(ProgressBar::new(0));
        bytes_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bytes_bar.set_prefix("Data");

        Self {
            multi,
            bytes_bar,
            status,
            start_time: Mutex::new(Instant::now()),
            total_bytes: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            total_ranges: AtomicU64::new(0),
            ranges_done: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a reporter that tracks counters without drawing
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Check if progress is drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    /// Get elapsed time since the last transfer started
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }

    /// Get a snapshot of the counters
    pub fn summary(&self) -> ProgressSummary {
        let elapsed = self.elapsed();
        let bytes_copied = self.bytes_copied.load(Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();

        ProgressSummary {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            bytes_copied,
            total_ranges: self.total_ranges.load(Ordering::Relaxed),
            ranges_done: self.ranges_done.load(Ordering::Relaxed),
            elapsed,
            throughput: if secs > 0.0 { bytes_copied as f64 / secs } else { 0.0 },
        }
    }

    fn add_bytes(&self, bytes: u64) {
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
        self.ranges_done.fetch_add(1, Ordering::Relaxed);
        self.bytes_bar.inc(bytes);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferObserver for ProgressReporter {
    fn transfer_started(&self, source: &Path, dest: &Path, total_bytes: u64, ranges: usize) {
        TracingObserver.transfer_started(source, dest, total_bytes, ranges);

        *self
            .start_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
        self.total_bytes.store(total_bytes, Ordering::Relaxed);
        self.bytes_copied.store(0, Ordering::Relaxed);
        self.total_ranges.store(ranges as u64, Ordering::Relaxed);
        self.ranges_done.store(0, Ordering::Relaxed);

        self.bytes_bar.reset();
        self.bytes_bar.set_length(total_bytes);
        self.set_status(&format!("{} -> {}", source.display(), dest.display()));
    }

    fn range_completed(&self, index: usize, range: TransferRange, bytes: u64) {
        TracingObserver.range_completed(index, range, bytes);
        self.add_bytes(bytes);
    }

    fn short_transfer(&self, index: usize, range: TransferRange, copied: u64) {
        TracingObserver.short_transfer(index, range, copied);
        self.add_bytes(copied);
        self.set_status(&format!("short transfer on range {}", index));
    }

    fn task_failed(&self, index: usize, range: TransferRange, error: &BackupError) {
        TracingObserver.task_failed(index, range, error);
        self.set_status(&format!("range {} failed", index));
    }

    fn timed_out(&self, outstanding: usize, timeout: Duration) {
        TracingObserver.timed_out(outstanding, timeout);
    }

    fn transfer_finished(&self, report: &TransferReport) {
        TracingObserver.transfer_finished(report);

        if report.is_success() {
            self.status.finish_with_message(format!(
                "✓ {} range(s), {}",
                report.ranges_planned(),
                humansize::format_size(report.bytes_copied, humansize::BINARY)
            ));
            self.bytes_bar.finish();
        } else {
            self.status.finish_with_message(format!(
                "✗ {}/{} range(s) confirmed",
                report.ranges_completed(),
                report.ranges_planned()
            ));
            self.bytes_bar.abandon();
        }
    }
}

/// Progress snapshot
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Total bytes to transfer
    pub total_bytes: u64,
    /// Bytes copied so far
    pub bytes_copied: u64,
    /// Ranges planned
    pub total_ranges: u64,
    /// Ranges confirmed
    pub ranges_done: u64,
    /// Elapsed time
    pub elapsed: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
}

impl ProgressSummary {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.bytes_copied as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reporter_counts_ranges() {
        let reporter = ProgressReporter::disabled();
        assert!(!reporter.is_enabled());

        reporter.transfer_started(Path::new("a"), Path::new("b"), 1000, 4);
        reporter.range_completed(0, TransferRange::new(0, 250), 250);
        reporter.short_transfer(1, TransferRange::new(250, 250), 250);

        let summary = reporter.summary();
        assert_eq!(summary.total_bytes, 1000);
        assert_eq!(summary.bytes_copied, 500);
        assert_eq!(summary.total_ranges, 4);
        assert_eq!(summary.ranges_done, 2);
        assert_eq!(summary.percentage(), 50.0);
    }

    #[test]
    fn test_elapsed_restarts_per_transfer() {
        let reporter = ProgressReporter::disabled();
        std::thread::sleep(Duration::from_millis(300));
        assert!(reporter.elapsed() >= Duration::from_millis(300));

        reporter.transfer_started(Path::new("a"), Path::new("b"), 100, 1);
        assert!(reporter.elapsed() < Duration::from_millis(300));
        assert!(reporter.summary().elapsed < Duration::from_millis(300));
    }

    #[test]
    fn test_counters_reset_per_transfer() {
        let reporter = ProgressReporter::disabled();

        reporter.transfer_started(Path::new("a"), Path::new("b"), 100, 1);
        reporter.range_completed(0, TransferRange::new(0, 100), 100);
        reporter.transfer_started(Path::new("b"), Path::new("c"), 200, 2);

        let summary = reporter.summary();
        assert_eq!(summary.total_bytes, 200);
        assert_eq!(summary.bytes_copied, 0);
        assert_eq!(summary.percentage(), 0.0);
    }
}
