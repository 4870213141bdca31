//! Per-file mutual exclusion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of one async mutex per target file.
///
/// Paths are made absolute before lookup, so `named.conf` and
/// `./named.conf` share a lock.
#[derive(Debug, Default)]
pub struct FileLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl FileLocks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `path`.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(lock_key(path)).or_default().clone();
        lock.lock_owned().await
    }

    /// Number of files that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no file has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

fn lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_file_is_exclusive() {
        let locks = FileLocks::new();
        let _held = locks.acquire(Path::new("named.conf")).await;

        let second = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(Path::new("./named.conf")),
        )
        .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_different_files_do_not_block() {
        let locks = FileLocks::new();
        let _a = locks.acquire(Path::new("/tmp/a.zone")).await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Path::new("/tmp/b.zone")))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let locks = FileLocks::new();
        drop(locks.acquire(Path::new("/tmp/c.zone")).await);
        let _again = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Path::new("/tmp/c.zone")))
            .await
            .unwrap();
    }
}
