//! SQLite store configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection settings applied to every connection the store opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file
    pub path: PathBuf,
    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u32,
    /// Page cache size (negative: KiB, positive: pages)
    pub cache_size: i64,
    /// Memory-mapped I/O size in bytes, 0 disables it
    pub mmap_size: u64,
    /// Open query connections read-only
    pub read_only: bool,
    /// Write-ahead logging for writable connections; read-only readers of a
    /// WAL database need write access to its directory
    pub wal_mode: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gob.db"),
            busy_timeout_ms: 5000,
            cache_size: -16000,
            mmap_size: 0,
            read_only: true,
            wal_mode: false,
        }
    }
}

impl SqliteConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn with_mmap_size(mut self, bytes: u64) -> Self {
        self.mmap_size = bytes;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
