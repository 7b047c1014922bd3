//! In-memory filesystem implementation for tests
//!
//! Stores each file as a shared byte vector. Besides serving as a drop-in
//! `FileSystem`, it lets tests read back the raw stored bytes and patch
//! arbitrary ranges to simulate on-disk corruption, without touching the
//! real filesystem.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::fs::{FileHandle, FileSystem};

type SharedBytes = Arc<Mutex<Vec<u8>>>;

/// Filesystem keeping every file in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, SharedBytes>>>,
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MemoryFileSystem {
    /// Create an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the full contents of a file, if it exists.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock();
        files.get(path).map(|bytes| bytes.lock().clone())
    }

    /// Overwrite a byte range of an existing file in place. Used by tests
    /// to plant corruption at known offsets.
    ///
    /// # Panics
    ///
    /// Panics if the file does not exist or the range falls outside it.
    pub fn patch(&self, path: &Path, offset: usize, bytes: &[u8]) {
        let files = self.files.lock();
        let file = files.get(path).expect("patching a file that does not exist");
        let mut data = file.lock();
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path) || self.dirs.lock().contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut dirs = self.dirs.lock();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            dirs.insert(current.clone());
        }
        Ok(())
    }

    fn open_read_write(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        let mut files = self.files.lock();
        let bytes = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone();
        Ok(Box::new(MemoryFile { bytes }))
    }
}

/// Handle over an in-memory file.
pub struct MemoryFile {
    bytes: SharedBytes,
}

impl FileHandle for MemoryFile {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.bytes.lock().len() as u64)
    }

    fn resize(&mut self, len: u64) -> io::Result<()> {
        self.bytes.lock().resize(len as usize, 0);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let data = self.bytes.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of in-memory file",
            ));
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let mut data = self.bytes.lock();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
