//! Positioned range transfers
//!
//! Each transfer task opens its own source and destination handles and moves
//! one byte range between matching offsets. On Linux the kernel copies the
//! range with `copy_file_range`; everywhere else, and whenever the kernel
//! refuses, a buffered seek/read/write loop does the work.

use crate::core::TransferRange;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bytes moved per kernel call before the cancellation flag is polled again
#[cfg(target_os = "linux")]
const ZERO_COPY_SLICE: u64 = 8 * 1024 * 1024;

/// Shared, cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every task holding a clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Moves one byte range from a source file to the same offset in a destination file.
///
/// Implementations open their own handles; nothing is shared between calls.
/// Returning fewer bytes than `range.length` without an error is a short
/// transfer. Implementations should stop early once `cancel` is raised.
pub trait RangeTransfer: Send + Sync {
    /// Copy `range` and return the number of bytes written
    fn transfer(
        &self,
        source: &Path,
        dest: &Path,
        range: TransferRange,
        cancel: &CancellationToken,
    ) -> io::Result<u64>;
}

/// Default file-to-file range copier
#[derive(Debug, Clone)]
pub struct FileRangeTransfer {
    buffer_size: usize,
    use_zero_copy: bool,
}

impl FileRangeTransfer {
    /// Create a copier with the given buffer size for the buffered path
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            use_zero_copy: cfg!(target_os = "linux"),
        }
    }

    /// Always use the buffered path
    pub fn buffered(buffer_size: usize) -> Self {
        Self {
            use_zero_copy: false,
            ..Self::new(buffer_size)
        }
    }

    /// Buffered copy - reliable fallback
    fn copy_buffered(
        &self,
        src: &mut File,
        dst: &mut File,
        range: TransferRange,
        cancel: &CancellationToken,
    ) -> io::Result<u64> {
        src.seek(SeekFrom::Start(range.offset))?;
        dst.seek(SeekFrom::Start(range.offset))?;

        let capacity = (self.buffer_size as u64).min(range.length) as usize;
        let mut buffer = vec![0u8; capacity];
        let mut copied = 0u64;

        while copied < range.length && !cancel.is_cancelled() {
            let want = ((range.length - copied) as usize).min(buffer.len());
            let read = match src.read(&mut buffer[..want]) {
                Ok(0) => break, // EOF
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            dst.write_all(&buffer[..read])?;
            copied += read as u64;
        }

        Ok(copied)
    }

    /// Kernel-side copy; `Ok(None)` means the kernel refused before moving any byte
    #[cfg(target_os = "linux")]
    fn copy_zero_copy(
        &self,
        src: &File,
        dst: &File,
        range: TransferRange,
        cancel: &CancellationToken,
    ) -> io::Result<Option<u64>> {
        use std::os::unix::io::AsRawFd;

        let src_fd = src.as_raw_fd();
        let dst_fd = dst.as_raw_fd();

        let mut offset_in = range.offset as libc::loff_t;
        let mut offset_out = range.offset as libc::loff_t;
        let mut copied = 0u64;

        while copied < range.length && !cancel.is_cancelled() {
            let to_copy = (range.length - copied).min(ZERO_COPY_SLICE) as usize;

            let result = unsafe {
                libc::copy_file_range(src_fd, &mut offset_in, dst_fd, &mut offset_out, to_copy, 0)
            };

            if result < 0 {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::EXDEV | libc::ENOSYS | libc::EOPNOTSUPP | libc::EINVAL)
                        if copied == 0 =>
                    {
                        return Ok(None)
                    }
                    _ => return Err(err),
                }
            }

            if result == 0 {
                break; // EOF
            }

            copied += result as u64;
        }

        Ok(Some(copied))
    }
}

impl Default for FileRangeTransfer {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

impl RangeTransfer for FileRangeTransfer {
    fn transfer(
        &self,
        source: &Path,
        dest: &Path,
        range: TransferRange,
        cancel: &CancellationToken,
    ) -> io::Result<u64> {
        let mut src = File::open(source)?;
        let mut dst = OpenOptions::new().write(true).open(dest)?;

        #[cfg(target_os = "linux")]
        if self.use_zero_copy {
            if let Some(copied) = self.copy_zero_copy(&src, &dst, range, cancel)? {
                return Ok(copied);
            }
            tracing::debug!("copy_file_range unavailable for {}, using buffered copy", range);
        }

        self.copy_buffered(&mut src, &mut dst, range, cancel)
    }
}
