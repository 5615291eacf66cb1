//! Parallel transfer engine
//!
//! Runs one transfer task per planned range on a worker pool built for the
//! invocation, funnels every task outcome through a channel to a single
//! collector on the calling thread, and folds them into one result.

use crate::core::{CancellationToken, RangeTransfer, TransferRange};
use crate::error::{BackupError, Result};
use crate::progress::{NullObserver, TransferObserver};
use crossbeam::channel::{unbounded, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One range bound to its source and destination
#[derive(Debug, Clone)]
pub struct TransferTask {
    /// Position of the range in the plan
    pub index: usize,
    /// Bytes this task moves
    pub range: TransferRange,
    /// File read from
    pub source: PathBuf,
    /// File written to
    pub dest: PathBuf,
}

impl TransferTask {
    /// Create a new task
    pub fn new(index: usize, range: TransferRange, source: &Path, dest: &Path) -> Self {
        Self {
            index,
            range,
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
        }
    }

    /// Execute the task and classify its result
    pub fn run(&self, transfer: &dyn RangeTransfer, cancel: &CancellationToken) -> TaskReport {
        let start = Instant::now();

        let outcome = match transfer.transfer(&self.source, &self.dest, self.range, cancel) {
            Ok(copied) if copied >= self.range.length => TaskOutcome::Succeeded { bytes: copied },
            Ok(copied) if cancel.is_cancelled() => TaskOutcome::Cancelled { copied },
            Ok(copied) => TaskOutcome::SucceededWithWarning {
                copied,
                expected: self.range.length,
            },
            Err(source) => TaskOutcome::Failed(BackupError::Task {
                index: self.index,
                offset: self.range.offset,
                length: self.range.length,
                source,
            }),
        };

        TaskReport {
            index: self.index,
            range: self.range,
            outcome,
            duration: start.elapsed(),
        }
    }
}

/// Lifecycle of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Scheduled, not yet picked up by a worker
    Pending,
    /// A worker is copying the range
    Running,
    /// All bytes copied
    Succeeded,
    /// Finished with fewer bytes than requested
    SucceededWithWarning,
    /// I/O fault
    Failed,
    /// Stopped after the cancellation signal
    Cancelled,
}

impl TaskState {
    /// True for states that count as a confirmed copy
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Succeeded | Self::SucceededWithWarning)
    }
}

/// Terminal result of one task
#[derive(Debug)]
pub enum TaskOutcome {
    /// All bytes copied
    Succeeded { bytes: u64 },
    /// Short transfer without an I/O fault
    SucceededWithWarning { copied: u64, expected: u64 },
    /// I/O fault inside the task
    Failed(BackupError),
    /// The task saw the cancellation signal before finishing
    Cancelled { copied: u64 },
}

impl TaskOutcome {
    /// State this outcome leaves the task in
    pub fn state(&self) -> TaskState {
        match self {
            Self::Succeeded { .. } => TaskState::Succeeded,
            Self::SucceededWithWarning { .. } => TaskState::SucceededWithWarning,
            Self::Failed(_) => TaskState::Failed,
            Self::Cancelled { .. } => TaskState::Cancelled,
        }
    }
}

/// Outcome of one task together with its range
#[derive(Debug)]
pub struct TaskReport {
    /// Position of the range in the plan
    pub index: usize,
    /// Range the task covered
    pub range: TransferRange,
    /// What happened
    pub outcome: TaskOutcome,
    /// Time spent in the task
    pub duration: Duration,
}

/// Aggregate outcome of a transfer
#[derive(Debug)]
pub enum TransferOutcome {
    /// Every task reported success
    Success,
    /// At least one task failed; carries the first failure by completion order
    Failed { first: BackupError, failed: usize },
    /// The wait elapsed before every task confirmed
    Incomplete { outstanding: usize },
}

/// Aggregate result plus statistics
#[derive(Debug)]
pub struct TransferReport {
    /// Overall outcome
    pub outcome: TransferOutcome,
    /// Final state of every task, indexed like the plan
    pub task_states: Vec<TaskState>,
    /// Tasks that reported a short transfer
    pub warnings: usize,
    /// Bytes written by tasks that reported back
    pub bytes_copied: u64,
    /// Wall time of the whole transfer
    pub duration: Duration,
    /// Wait that applied to this transfer
    pub timeout: Duration,
}

/// Numbers that survive a successful transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSummary {
    /// Ranges transferred
    pub ranges: usize,
    /// Short-transfer warnings
    pub warnings: usize,
    /// Bytes written
    pub bytes_copied: u64,
    /// Wall time
    pub duration: Duration,
}

impl TransferReport {
    /// Check if the transfer was completely successful
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Success)
    }

    /// Number of ranges planned
    pub fn ranges_planned(&self) -> usize {
        self.task_states.len()
    }

    /// Number of ranges whose copy was confirmed
    pub fn ranges_completed(&self) -> usize {
        self.task_states.iter().filter(|s| s.is_confirmed()).count()
    }

    /// Average throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes_copied as f64 / secs
        } else {
            0.0
        }
    }

    /// Convert into the single error a caller sees, or the summary on success
    pub fn into_result(self) -> Result<TransferSummary> {
        let summary = TransferSummary {
            ranges: self.ranges_planned(),
            warnings: self.warnings,
            bytes_copied: self.bytes_copied,
            duration: self.duration,
        };

        match self.outcome {
            TransferOutcome::Success => Ok(summary),
            TransferOutcome::Failed { first, failed } => Err(BackupError::TransferFailed {
                failed,
                source: Box::new(first),
            }),
            TransferOutcome::Incomplete { outstanding } => Err(BackupError::Incomplete {
                outstanding,
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Folds task reports into a transfer report
struct OutcomeCollector {
    states: Vec<TaskState>,
    first_failure: Option<BackupError>,
    failed: usize,
    warnings: usize,
    bytes_copied: u64,
}

impl OutcomeCollector {
    fn new(tasks: usize) -> Self {
        Self {
            states: vec![TaskState::Pending; tasks],
            first_failure: None,
            failed: 0,
            warnings: 0,
            bytes_copied: 0,
        }
    }

    fn started(&mut self, index: usize) {
        if self.states[index] == TaskState::Pending {
            self.states[index] = TaskState::Running;
        }
    }

    fn record(&mut self, report: TaskReport, observer: &dyn TransferObserver) {
        self.states[report.index] = report.outcome.state();

        match report.outcome {
            TaskOutcome::Succeeded { bytes } => {
                self.bytes_copied += bytes;
                observer.range_completed(report.index, report.range, bytes);
            }
            TaskOutcome::SucceededWithWarning { copied, .. } => {
                self.bytes_copied += copied;
                self.warnings += 1;
                observer.short_transfer(report.index, report.range, copied);
            }
            TaskOutcome::Failed(error) => {
                observer.task_failed(report.index, report.range, &error);
                self.failed += 1;
                if self.first_failure.is_none() {
                    self.first_failure = Some(error);
                }
            }
            TaskOutcome::Cancelled { copied } => {
                self.bytes_copied += copied;
                tracing::debug!("Task {} cancelled after {} bytes", report.index, copied);
            }
        }
    }

    fn outstanding(&self) -> usize {
        self.states
            .iter()
            .filter(|s| !s.is_confirmed() && **s != TaskState::Failed)
            .count()
    }

    fn finish(self, duration: Duration, timeout: Duration) -> TransferReport {
        let outstanding = self.outstanding();

        let outcome = match self.first_failure {
            Some(first) => TransferOutcome::Failed {
                first,
                failed: self.failed,
            },
            None if outstanding > 0 => TransferOutcome::Incomplete { outstanding },
            None => TransferOutcome::Success,
        };

        TransferReport {
            outcome,
            task_states: self.states,
            warnings: self.warnings,
            bytes_copied: self.bytes_copied,
            duration,
            timeout,
        }
    }
}

/// Messages from workers to the collector
enum WorkerEvent {
    Started(usize),
    Finished(TaskReport),
}

/// Executes planned ranges and aggregates their outcomes
pub struct ParallelTransferEngine {
    transfer: Arc<dyn RangeTransfer>,
    observer: Arc<dyn TransferObserver>,
}

impl ParallelTransferEngine {
    /// Create an engine around a range copier
    pub fn new(transfer: Arc<dyn RangeTransfer>) -> Self {
        Self {
            transfer,
            observer: Arc::new(NullObserver),
        }
    }

    /// Set the observability sink
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one task per range concurrently and wait at most `timeout`.
    ///
    /// The destination must already exist at its final size. The worker pool
    /// holds `min(concurrency, ranges.len())` threads and is released before
    /// returning, including on timeout; stalled workers are left to notice the
    /// cancellation signal on their own.
    pub fn execute(
        &self,
        source: &Path,
        dest: &Path,
        ranges: &[TransferRange],
        concurrency: usize,
        timeout: Duration,
    ) -> Result<TransferReport> {
        let workers = concurrency.max(1).min(ranges.len().max(1));
        self.run_ranges(source, dest, ranges, workers, false, timeout)
    }

    /// Run the ranges one after another, in plan order, on a single worker.
    ///
    /// Applies the same classification, aggregation and bounded wait as
    /// [`execute`](Self::execute). A range still copying when the wait elapses
    /// is cancelled and every range after it stays outstanding.
    pub fn execute_sequential(
        &self,
        source: &Path,
        dest: &Path,
        ranges: &[TransferRange],
        timeout: Duration,
    ) -> Result<TransferReport> {
        self.run_ranges(source, dest, ranges, 1, true, timeout)
    }

    fn run_ranges(
        &self,
        source: &Path,
        dest: &Path,
        ranges: &[TransferRange],
        workers: usize,
        in_order: bool,
        timeout: Duration,
    ) -> Result<TransferReport> {
        let start = Instant::now();
        let total_bytes: u64 = ranges.iter().map(|r| r.length).sum();
        self.observer
            .transfer_started(source, dest, total_bytes, ranges.len());

        let mut collector = OutcomeCollector::new(ranges.len());

        if ranges.is_empty() {
            let report = collector.finish(start.elapsed(), timeout);
            self.observer.transfer_finished(&report);
            return Ok(report);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("chunkback-worker-{}", i))
            .build()
            .map_err(|e| BackupError::ThreadPoolError(e.to_string()))?;

        let (event_tx, event_rx) = unbounded();
        let cancel = CancellationToken::new();
        let tasks: Vec<TransferTask> = ranges
            .iter()
            .enumerate()
            .map(|(index, range)| TransferTask::new(index, *range, source, dest))
            .collect();

        if in_order {
            let transfer = Arc::clone(&self.transfer);
            let cancel = cancel.clone();
            let event_tx = event_tx.clone();

            pool.spawn(move || {
                for task in &tasks {
                    run_reporting(task, transfer.as_ref(), &cancel, &event_tx);
                }
            });
        } else {
            for task in tasks {
                let transfer = Arc::clone(&self.transfer);
                let cancel = cancel.clone();
                let event_tx = event_tx.clone();

                pool.spawn(move || run_reporting(&task, transfer.as_ref(), &cancel, &event_tx));
            }
        }
        drop(event_tx);

        // A timeout too large to represent as an instant means waiting without a deadline
        let deadline = start.checked_add(timeout);
        let mut finished = 0;

        while finished < ranges.len() {
            let event = match deadline {
                Some(deadline) => event_rx.recv_deadline(deadline),
                None => event_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match event {
                Ok(WorkerEvent::Started(index)) => collector.started(index),
                Ok(WorkerEvent::Finished(report)) => {
                    finished += 1;
                    collector.record(report, self.observer.as_ref());
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancel.cancel();
                    self.observer.timed_out(ranges.len() - finished, timeout);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Does not block on workers still inside a syscall
        drop(pool);

        let report = collector.finish(start.elapsed(), timeout);
        self.observer.transfer_finished(&report);
        Ok(report)
    }
}

/// Run one task on a worker and report its progress to the collector
fn run_reporting(
    task: &TransferTask,
    transfer: &dyn RangeTransfer,
    cancel: &CancellationToken,
    events: &Sender<WorkerEvent>,
) {
    if cancel.is_cancelled() {
        let _ = events.send(WorkerEvent::Finished(TaskReport {
            index: task.index,
            range: task.range,
            outcome: TaskOutcome::Cancelled { copied: 0 },
            duration: Duration::ZERO,
        }));
        return;
    }

    let _ = events.send(WorkerEvent::Started(task.index));
    let report = task.run(transfer, cancel);
    let _ = events.send(WorkerEvent::Finished(report));
}
