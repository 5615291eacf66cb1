//! Chunkback CLI - back up a file, then restore it
//!
//! Usage: `chunkback <SOURCE> <RESTORED>`. Tuning comes from `CHUNKBACK_*`
//! environment variables.

use chunkback::config::{BackupConfig, CliArgs};
use chunkback::core::BackupManager;
use chunkback::error::Result;
use chunkback::progress::{ProgressReporter, TracingObserver, TransferObserver};
use clap::error::ErrorKind;
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = BackupConfig::from_env()?;

    tracing::debug!(
        "Mode {}, {} worker(s), chunks up to {}, timeout {}",
        config.mode.name(),
        config.worker_count(),
        humansize::format_size(config.max_chunk_bytes, humansize::BINARY),
        humantime::format_duration(config.timeout())
    );

    let observer: Arc<dyn TransferObserver> = if console::Term::stderr().is_term() {
        Arc::new(ProgressReporter::new())
    } else {
        Arc::new(TracingObserver)
    };

    let manager = BackupManager::new(config).with_observer(observer);

    let start = Instant::now();
    let backup = manager.backup(&args.source)?;
    tracing::info!(
        "Backup written to {} in {}",
        backup.display(),
        format_millis(start.elapsed())
    );

    let start = Instant::now();
    manager.restore(&backup, &args.restored)?;
    tracing::info!(
        "Restored to {} in {}",
        args.restored.display(),
        format_millis(start.elapsed())
    );

    Ok(())
}

/// Elapsed time truncated to whole milliseconds
fn format_millis(elapsed: Duration) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
}
