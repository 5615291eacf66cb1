//! Configuration settings for chunkback
//!
//! Defines the CLI arguments, the runtime configuration and its defaults.

use crate::error::{BackupError, IoResultExt, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional JSON config file
pub const ENV_CONFIG: &str = "CHUNKBACK_CONFIG";
/// Backup root directory, relative to the base directory unless absolute
pub const ENV_ROOT: &str = "CHUNKBACK_ROOT";
/// Base directory the backup root is resolved against
pub const ENV_BASE_DIR: &str = "CHUNKBACK_BASE_DIR";
/// Worker thread count (0 = auto-detect)
pub const ENV_THREADS: &str = "CHUNKBACK_THREADS";
/// Maximum chunk size (e.g. 4M, 1G)
pub const ENV_CHUNK_SIZE: &str = "CHUNKBACK_CHUNK_SIZE";
/// Per-attempt wait for all transfer tasks (e.g. 30s, 2m)
pub const ENV_TIMEOUT: &str = "CHUNKBACK_TIMEOUT";
/// Transfer mode (parallel or sequential)
pub const ENV_MODE: &str = "CHUNKBACK_MODE";

/// Default maximum chunk size (64 MB)
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 64 * 1024 * 1024;
/// Default wait for all transfer tasks
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Chunkback - back up a file in parallel chunks, then restore it
#[derive(Parser, Debug, Clone)]
#[command(name = "chunkback")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parallel chunked file backup and restore")]
#[command(long_about = r#"
Backs up SOURCE into a timestamped location under the backup root, then
restores that backup into RESTORED.

Tuning is read from the environment:
  CHUNKBACK_CONFIG      JSON config file
  CHUNKBACK_ROOT        backup root (default: backups)
  CHUNKBACK_BASE_DIR    directory the root is resolved against (default: .)
  CHUNKBACK_THREADS     worker threads, 0 = auto (default: 0)
  CHUNKBACK_CHUNK_SIZE  maximum chunk size (default: 64M)
  CHUNKBACK_TIMEOUT     wait for all chunks (default: 30s)
  CHUNKBACK_MODE        parallel | sequential (default: parallel)
  RUST_LOG              log filter (default: info)
"#)]
pub struct CliArgs {
    /// File to back up
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Path the backup is restored into
    #[arg(value_name = "RESTORED")]
    pub restored: PathBuf,
}

/// How transfer tasks are executed
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Split into chunks copied concurrently
    #[default]
    Parallel,
    /// Copy the whole file as one range on a single worker
    Sequential,
}

impl TransferMode {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backup root directory
    pub backup_root: PathBuf,
    /// Directory a relative backup root is resolved against
    pub base_dir: PathBuf,
    /// Worker thread count (0 = auto-detect)
    pub threads: usize,
    /// Largest byte range handed to a single task
    pub max_chunk_bytes: u64,
    /// Buffer size for the buffered copy path
    pub buffer_size: usize,
    /// Wait for all tasks, in seconds
    pub timeout_secs: u64,
    /// Transfer mode
    pub mode: TransferMode,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_root: PathBuf::from("backups"),
            base_dir: PathBuf::from("."),
            threads: 0, // Auto-detect
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            buffer_size: 1024 * 1024, // 1MB
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            mode: TransferMode::Parallel,
        }
    }
}

impl BackupConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Wait applied to one transfer
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backup root resolved against the base directory
    pub fn resolved_root(&self) -> PathBuf {
        if self.backup_root.is_absolute() {
            self.backup_root.clone()
        } else {
            self.base_dir.join(&self.backup_root)
        }
    }

    /// Load a config from a JSON file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Build the config from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(root) = lookup(ENV_ROOT) {
            config.backup_root = PathBuf::from(root);
        }
        if let Some(base) = lookup(ENV_BASE_DIR) {
            config.base_dir = PathBuf::from(base);
        }
        if let Some(threads) = lookup(ENV_THREADS) {
            config.threads = threads
                .trim()
                .parse()
                .map_err(|_| BackupError::config(format!("Invalid thread count: {}", threads)))?;
        }
        if let Some(size) = lookup(ENV_CHUNK_SIZE) {
            config.max_chunk_bytes = parse_size(&size)
                .map_err(|e| BackupError::config(format!("Invalid chunk size: {}", e)))?;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            config.timeout_secs = humantime::parse_duration(timeout.trim())
                .map_err(|e| BackupError::config(format!("Invalid timeout: {}", e)))?
                .as_secs();
        }
        if let Some(mode) = lookup(ENV_MODE) {
            config.mode = mode
                .parse()
                .map_err(|e| BackupError::config(format!("Invalid mode: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_bytes == 0 {
            return Err(BackupError::config("chunk size must be at least 1 byte"));
        }
        if self.buffer_size == 0 {
            return Err(BackupError::config("buffer size must be at least 1 byte"));
        }
        if self.timeout_secs == 0 {
            return Err(BackupError::config("timeout must be at least 1 second"));
        }
        Ok(())
    }
}

/// Parse a chunk size such as `65536`, `512K`, `1.5MiB` or `2G` into bytes.
///
/// Units are binary (`K` = 1024). Fractions are only accepted together with
/// a unit, since a plain byte count must be whole.
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim();
    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let split = size
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(size.len());
    let (number, unit) = size.split_at(split);

    let shift = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 0,
        "K" | "KB" | "KIB" => 10,
        "M" | "MB" | "MIB" => 20,
        "G" | "GB" | "GIB" => 30,
        "T" | "TB" | "TIB" => 40,
        other => return Err(format!("Unknown size unit: {}", other)),
    };
    let multiplier = 1u64 << shift;

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("Size too large: {}", size));
    }

    if shift == 0 {
        return Err(format!("Invalid byte count: {}", size));
    }

    let fractional: f64 = number
        .parse()
        .map_err(|_| format!("Invalid number: {}", number))?;
    let bytes = (fractional * multiplier as f64).round();
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(format!("Size too large: {}", size));
    }

    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("1m").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("2T").unwrap(), 2 << 40);
        assert_eq!(parse_size("1.5M").unwrap(), 1536 * 1024);
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-1M").is_err());
        assert!(parse_size("10X").is_err());
    }

    #[test]
    fn test_parse_size_rejects_fractional_bytes() {
        assert!(parse_size("1.5").is_err());
        assert!(parse_size("10.25B").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = BackupConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.mode, TransferMode::Parallel);
        assert_eq!(config.resolved_root(), PathBuf::from("./backups"));
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_env_overrides() {
        let config = BackupConfig::from_lookup(lookup_from(&[
            (ENV_ROOT, "vault"),
            (ENV_BASE_DIR, "/srv"),
            (ENV_THREADS, "3"),
            (ENV_CHUNK_SIZE, "4M"),
            (ENV_TIMEOUT, "2m"),
            (ENV_MODE, "Sequential"),
        ]))
        .unwrap();

        assert_eq!(config.resolved_root(), PathBuf::from("/srv/vault"));
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.max_chunk_bytes, 4 * 1024 * 1024);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.mode, TransferMode::Sequential);
    }

    #[test]
    fn test_absolute_root_ignores_base() {
        let config = BackupConfig {
            backup_root: PathBuf::from("/var/backups"),
            base_dir: PathBuf::from("/home/me"),
            ..Default::default()
        };
        assert_eq!(config.resolved_root(), PathBuf::from("/var/backups"));
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(BackupConfig::from_lookup(lookup_from(&[(ENV_THREADS, "many")])).is_err());
        assert!(BackupConfig::from_lookup(lookup_from(&[(ENV_CHUNK_SIZE, "0")])).is_err());
        assert!(BackupConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT, "soon")])).is_err());
        assert!(BackupConfig::from_lookup(lookup_from(&[(ENV_MODE, "turbo")])).is_err());
    }

    #[test]
    fn test_json_file_then_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunkback.json");
        std::fs::write(&path, r#"{ "threads": 2, "timeout_secs": 5, "backup_root": "from-file" }"#)
            .unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = BackupConfig::from_lookup(lookup_from(&[
            (ENV_CONFIG, path_str.as_str()),
            (ENV_ROOT, "from-env"),
        ]))
        .unwrap();

        assert_eq!(config.threads, 2);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.backup_root, PathBuf::from("from-env"));
        assert_eq!(config.max_chunk_bytes, DEFAULT_MAX_CHUNK_BYTES);
    }

    #[test]
    fn test_cli_requires_two_paths() {
        assert!(CliArgs::try_parse_from(["chunkback", "a.bin"]).is_err());
        assert!(CliArgs::try_parse_from(["chunkback", "a", "b", "c"]).is_err());

        let args = CliArgs::try_parse_from(["chunkback", "a.bin", "b.bin"]).unwrap();
        assert_eq!(args.source, PathBuf::from("a.bin"));
        assert_eq!(args.restored, PathBuf::from("b.bin"));
    }
}
