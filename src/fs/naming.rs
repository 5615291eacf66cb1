//! Backup destination naming
//!
//! Backups land under `<base>/<root>/<year>/<month>/<day>/<millis>/backup_<millis>.dat`
//! where `<millis>` is the local wall-clock time in milliseconds since the
//! Unix epoch.

use chrono::{DateTime, Datelike, Local, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

/// Produces a distinct destination path for each backup
pub trait DestinationNamer: Send + Sync {
    /// Path the next backup of `source` should be written to
    fn next_path(&self, source: &Path) -> PathBuf;
}

/// Date-and-timestamp based namer
#[derive(Debug)]
pub struct TimestampNamer {
    root: PathBuf,
    last_millis: AtomicI64,
}

impl TimestampNamer {
    /// Create a namer rooted at an already resolved directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_millis: AtomicI64::new(i64::MIN),
        }
    }

    /// Directory every backup is placed under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a backup taken at `at`, ignoring uniqueness
    pub fn path_for<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> PathBuf {
        let millis = at.timestamp_millis();
        self.root
            .join(format!("{:04}", at.year()))
            .join(format!("{:02}", at.month()))
            .join(format!("{:02}", at.day()))
            .join(millis.to_string())
            .join(format!("backup_{}.dat", millis))
    }

    /// Never hand out the same millisecond twice from one namer
    fn claim(&self, now: DateTime<Local>) -> DateTime<Local> {
        let wanted = now.timestamp_millis();
        let mut last = self.last_millis.load(Ordering::SeqCst);

        loop {
            let next = if wanted > last { wanted } else { last + 1 };
            match self
                .last_millis
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return now + chrono::Duration::milliseconds(next - wanted),
                Err(actual) => last = actual,
            }
        }
    }
}

impl DestinationNamer for TimestampNamer {
    fn next_path(&self, _source: &Path) -> PathBuf {
        let at = self.claim(Local::now());
        self.path_for(&at)
    }
}
