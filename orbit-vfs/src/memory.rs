//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::r#trait::normalize_path;
use crate::VirtualFileSystem;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// An in-memory file system.
///
/// Files live in a `BTreeMap` keyed by normalized, forward-slash paths.
/// Clones share the same storage, so a host can keep a handle and add
/// scripts after the file system was handed to a context.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    /// Create a new empty memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory file system pre-populated with files.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let fs = Self::new();
        for (path, content) in files {
            fs.insert(path.as_ref(), content);
        }
        fs
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let key = Self::key(path.as_ref());
        // 锁中毒时数据仍然可用
        let mut files = match self.files.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        files.insert(key, content.into());
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(path: &Path) -> String {
        normalize_path(path).to_string_lossy().replace('\\', "/")
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let key = Self::key(path);
        let files = self.files.read().map_err(|_| VfsError::Io {
            message: String::from("Lock poisoned"),
        })?;

        tracing::trace!(target: "orbit::vfs", path = %key, "memory read");
        files
            .get(&key)
            .cloned()
            .ok_or(VfsError::NotFound { path: key })
    }

    fn exists(&self, path: &Path) -> bool {
        let key = Self::key(path);
        match self.files.read() {
            Ok(files) => files.contains_key(&key),
            Err(_) => false,
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.exists(path)
    }
}
