//! Backup and restore entry points
//!
//! [`BackupManager`] wires the planner, the destination collaborators, the
//! transfer engine and the observer together for one configuration.

use crate::config::{BackupConfig, TransferMode};
use crate::core::{plan, plan_sequential, FileRangeTransfer, ParallelTransferEngine, RangeTransfer, TransferSummary};
use crate::error::{IoResultExt, Result};
use crate::fs::{DestinationAllocator, DestinationNamer, PreallocatingAllocator, TimestampNamer};
use crate::progress::{TracingObserver, TransferObserver};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Backs files up into timestamped locations and restores them
pub struct BackupManager {
    config: BackupConfig,
    namer: Arc<dyn DestinationNamer>,
    allocator: Arc<dyn DestinationAllocator>,
    transfer: Arc<dyn RangeTransfer>,
    observer: Arc<dyn TransferObserver>,
}

impl BackupManager {
    /// Create a manager with the default collaborators for `config`
    pub fn new(config: BackupConfig) -> Self {
        let namer = Arc::new(TimestampNamer::new(config.resolved_root()));
        let transfer = Arc::new(FileRangeTransfer::new(config.buffer_size));

        Self {
            config,
            namer,
            allocator: Arc::new(PreallocatingAllocator),
            transfer,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the destination namer
    pub fn with_namer(mut self, namer: Arc<dyn DestinationNamer>) -> Self {
        self.namer = namer;
        self
    }

    /// Replace the destination allocator
    pub fn with_allocator(mut self, allocator: Arc<dyn DestinationAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Replace the range copier
    pub fn with_transfer(mut self, transfer: Arc<dyn RangeTransfer>) -> Self {
        self.transfer = transfer;
        self
    }

    /// Set the observability sink
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Configuration this manager runs with
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Back up `source` and return the path of the new backup file.
    ///
    /// A backup that does not complete is removed again, so a returned path
    /// always names a complete copy.
    pub fn backup(&self, source: &Path) -> Result<PathBuf> {
        let span = tracing::info_span!("backup", source = %source.display());
        let _guard = span.enter();

        let size = readable_size(source)?;
        let dest = self.namer.next_path(source);

        match self.copy(source, &dest, size) {
            Ok(summary) => {
                tracing::info!(
                    "Backed up {} to {} ({}, {} range(s))",
                    source.display(),
                    dest.display(),
                    humansize::format_size(summary.bytes_copied, humansize::BINARY),
                    summary.ranges
                );
                Ok(dest)
            }
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&dest) {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "Could not remove incomplete backup {}: {}",
                            dest.display(),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Restore `backup` into `restored`, byte for byte
    pub fn restore(&self, backup: &Path, restored: &Path) -> Result<()> {
        let span = tracing::info_span!("restore", backup = %backup.display());
        let _guard = span.enter();

        let size = readable_size(backup)?;
        let summary = self.copy(backup, restored, size)?;

        tracing::info!(
            "Restored {} to {} ({})",
            backup.display(),
            restored.display(),
            humansize::format_size(summary.bytes_copied, humansize::BINARY)
        );
        Ok(())
    }

    fn copy(&self, source: &Path, dest: &Path, size: u64) -> Result<TransferSummary> {
        self.allocator.allocate(dest, size)?;

        let engine = ParallelTransferEngine::new(Arc::clone(&self.transfer))
            .with_observer(Arc::clone(&self.observer));
        let timeout = self.config.timeout();

        let report = match self.config.mode {
            TransferMode::Parallel => {
                let workers = self.config.worker_count();
                let ranges = plan(size, workers, self.config.max_chunk_bytes);
                engine.execute(source, dest, &ranges, workers, timeout)?
            }
            TransferMode::Sequential => {
                let ranges = plan_sequential(size);
                engine.execute_sequential(source, dest, &ranges, timeout)?
            }
        };

        report.into_result()
    }
}

/// Size of `path`, after checking it can be opened for reading
fn readable_size(path: &Path) -> Result<u64> {
    let file = File::open(path).with_path(path)?;
    let metadata = file.metadata().with_path(path)?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationToken, TransferRange};
    use crate::error::BackupError;
    use std::io;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> BackupConfig {
        BackupConfig {
            base_dir: dir.to_path_buf(),
            threads: 4,
            max_chunk_bytes: 8 * 1024,
            buffer_size: 1024,
            ..Default::default()
        }
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    found.extend(files_under(&path));
                } else {
                    found.push(path);
                }
            }
        }
        found
    }

    struct BrokenTransfer;

    impl RangeTransfer for BrokenTransfer {
        fn transfer(
            &self,
            _source: &Path,
            _dest: &Path,
            range: TransferRange,
            _cancel: &CancellationToken,
        ) -> io::Result<u64> {
            if range.offset > 0 {
                Err(io::Error::new(io::ErrorKind::Other, "device unplugged"))
            } else {
                Ok(range.length)
            }
        }
    }

    struct StallTransfer;

    impl RangeTransfer for StallTransfer {
        fn transfer(
            &self,
            _source: &Path,
            _dest: &Path,
            _range: TransferRange,
            cancel: &CancellationToken,
        ) -> io::Result<u64> {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(0)
        }
    }

    #[test]
    fn test_backup_then_restore() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.bin");
        let content: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        std::fs::write(&source, &content).unwrap();

        let manager = BackupManager::new(config_in(dir.path()));
        let backup = manager.backup(&source).unwrap();

        assert!(backup.starts_with(dir.path().join("backups")));
        assert_eq!(std::fs::read(&backup).unwrap(), content);

        let restored = dir.path().join("out/restored.bin");
        manager.restore(&backup, &restored).unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), content);
    }

    #[test]
    fn test_sequential_mode() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.bin");
        std::fs::write(&source, vec![42u8; 20_000]).unwrap();

        let config = BackupConfig {
            mode: TransferMode::Sequential,
            ..config_in(dir.path())
        };
        let backup = BackupManager::new(config).backup(&source).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), vec![42u8; 20_000]);
    }

    #[test]
    fn test_restore_over_longer_file() {
        let dir = TempDir::new().unwrap();
        let backup = dir.path().join("backup.dat");
        let restored = dir.path().join("restored.bin");
        std::fs::write(&backup, b"short").unwrap();
        std::fs::write(&restored, b"a much longer stale file").unwrap();

        BackupManager::new(config_in(dir.path()))
            .restore(&backup, &restored)
            .unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), b"short");
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("nope.bin");

        let err = BackupManager::new(config_in(dir.path()))
            .backup(&source)
            .unwrap_err();
        assert_eq!(err.path().unwrap(), &source);
        assert!(files_under(&dir.path().join("backups")).is_empty());
    }

    #[test]
    fn test_failed_backup_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.bin");
        std::fs::write(&source, vec![1u8; 40_000]).unwrap();

        let err = BackupManager::new(config_in(dir.path()))
            .with_transfer(Arc::new(BrokenTransfer))
            .backup(&source)
            .unwrap_err();

        assert!(matches!(err, BackupError::TransferFailed { .. }));
        assert!(err.to_string().contains("device unplugged"));
        assert!(files_under(&dir.path().join("backups")).is_empty());
    }

    #[test]
    fn test_stalled_backup_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.bin");
        std::fs::write(&source, vec![1u8; 20_000]).unwrap();

        let config = BackupConfig {
            timeout_secs: 1,
            ..config_in(dir.path())
        };

        let started = Instant::now();
        let err = BackupManager::new(config)
            .with_transfer(Arc::new(StallTransfer))
            .backup(&source)
            .unwrap_err();

        assert!(err.is_incomplete());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(files_under(&dir.path().join("backups")).is_empty());
    }

    #[test]
    fn test_stalled_sequential_backup_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.bin");
        std::fs::write(&source, vec![1u8; 20_000]).unwrap();

        let config = BackupConfig {
            timeout_secs: 1,
            mode: TransferMode::Sequential,
            ..config_in(dir.path())
        };

        let started = Instant::now();
        let err = BackupManager::new(config)
            .with_transfer(Arc::new(StallTransfer))
            .backup(&source)
            .unwrap_err();

        assert!(err.is_incomplete());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(files_under(&dir.path().join("backups")).is_empty());
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.bin");
        let content: Vec<u8> = (0..40_000u32).map(|i| (i % 241) as u8).collect();
        std::fs::write(&source, &content).unwrap();

        for mode in [TransferMode::Parallel, TransferMode::Sequential] {
            let config = BackupConfig {
                timeout_secs: u64::MAX,
                mode,
                ..config_in(dir.path())
            };
            let backup = BackupManager::new(config).backup(&source).unwrap();
            assert_eq!(std::fs::read(&backup).unwrap(), content);
        }
    }

    #[test]
    fn test_empty_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("empty.bin");
        std::fs::write(&source, b"").unwrap();

        let manager = BackupManager::new(config_in(dir.path()));
        let backup = manager.backup(&source).unwrap();
        assert_eq!(std::fs::metadata(&backup).unwrap().len(), 0);

        let restored = dir.path().join("restored.bin");
        manager.restore(&backup, &restored).unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), b"");
    }
}
