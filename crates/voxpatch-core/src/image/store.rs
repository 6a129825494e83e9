//! Backing stores for a [`BinaryImage`](super::BinaryImage).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Whole-file byte store. An image loads once and persists once per commit.
pub trait ByteStore {
    fn load(&mut self) -> Result<Vec<u8>>;

    /// Replace the stored bytes. Implementations must not leave a
    /// partially written state behind on failure.
    fn persist(&mut self, bytes: &[u8]) -> Result<()>;

    fn describe(&self) -> String;
}

/// File on disk, replaced by write-then-rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn load(&mut self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    fn persist(&mut self, bytes: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        if let Ok(metadata) = fs::metadata(&self.path) {
            temp.as_file().set_permissions(metadata.permissions())?;
        }
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        debug!("Persisted {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store, used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Vec<u8>,
    persist_count: usize,
    fail_persist: bool,
}

impl MemoryStore {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Default::default()
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn persist_count(&self) -> usize {
        self.persist_count
    }

    /// Make subsequent persists fail, simulating a storage error.
    pub fn set_fail_persist(&mut self, fail: bool) {
        self.fail_persist = fail;
    }
}

impl ByteStore for MemoryStore {
    fn load(&mut self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn persist(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_persist {
            return Err(Error::Io(std::io::Error::other("persist disabled")));
        }
        self.bytes = bytes.to_vec();
        self.persist_count += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("<memory: {} bytes>", self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_store_replaces_contents() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), b"abcdef").unwrap();

        let mut store = FileStore::new(file.path());
        assert_eq!(store.load().unwrap(), b"abcdef");
        store.persist(b"ABCDEF").unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), b"ABCDEF");
    }

    #[test]
    fn test_file_store_missing_file() {
        let mut store = FileStore::new("/nonexistent/voxpatch/module.node");
        assert!(store.load().unwrap_err().is_not_found());
    }

    #[test]
    fn test_memory_store_failure_keeps_bytes() {
        let mut store = MemoryStore::new(vec![1, 2, 3]);
        store.set_fail_persist(true);
        assert!(store.persist(&[9, 9, 9]).is_err());
        assert_eq!(store.bytes(), &[1, 2, 3]);
        assert_eq!(store.persist_count(), 0);
    }
}
