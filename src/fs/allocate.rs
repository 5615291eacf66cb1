//! Destination pre-allocation

use crate::error::{IoResultExt, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// Makes sure a destination file exists at its final size before any range
/// is written into it
pub trait DestinationAllocator: Send + Sync {
    /// Create `path` (and its parents) with exactly `len` bytes
    fn allocate(&self, path: &Path, len: u64) -> Result<()>;
}

/// Creates parent directories and sizes the file with `set_len`
#[derive(Debug, Default, Clone, Copy)]
pub struct PreallocatingAllocator;

impl DestinationAllocator for PreallocatingAllocator {
    fn allocate(&self, path: &Path, len: u64) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_path(parent)?;
            }
        }

        if let Ok(metadata) = std::fs::metadata(path) {
            if metadata.is_file() && metadata.len() == len {
                return Ok(());
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_path(path)?;
        file.set_len(len).with_path(path)?;

        tracing::debug!("Allocated {} ({} bytes)", path.display(), len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_parents_and_sizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/out.dat");

        PreallocatingAllocator.allocate(&path, 4096).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn test_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.dat");

        PreallocatingAllocator.allocate(&path, 10).unwrap();
        std::fs::write(&path, b"0123456789").unwrap();
        PreallocatingAllocator.allocate(&path, 10).unwrap();

        // Content of a correctly sized file is untouched
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[test]
    fn test_resizes_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.dat");
        std::fs::write(&path, vec![7u8; 100]).unwrap();

        PreallocatingAllocator.allocate(&path, 40).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 40);
    }

    #[test]
    fn test_zero_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.dat");

        PreallocatingAllocator.allocate(&path, 0).unwrap();
        assert!(path.is_file());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_parent_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let err = PreallocatingAllocator
            .allocate(&blocker.join("out.dat"), 1)
            .unwrap_err();
        assert_eq!(err.path().unwrap(), &blocker);
    }
}
