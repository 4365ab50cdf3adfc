//! Native file system implementation

use crate::error::{VfsError, VfsResult};
use crate::r#trait::normalize_path;
use crate::VirtualFileSystem;
use std::path::{Path, PathBuf};

/// Native OS file system, optionally confined to a root directory.
///
/// With a root, relative paths are resolved against it and paths that
/// normalize to somewhere outside the root are rejected.
#[derive(Debug, Clone, Default)]
pub struct NativeFileSystem {
    root: Option<PathBuf>,
}

impl NativeFileSystem {
    /// Create a new native file system over the whole OS tree.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Create a native file system confined to `base`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(normalize_path(&base.into())),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let Some(root) = &self.root else {
            return Ok(path.to_path_buf());
        };
        let joined = normalize_path(&root.join(path));
        if joined.starts_with(root) {
            Ok(joined)
        } else {
            Err(VfsError::InvalidPath {
                path: path.to_string_lossy().into_owned(),
                reason: format!("outside of {}", root.display()),
            })
        }
    }
}

impl VirtualFileSystem for NativeFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let resolved = self.resolve(path)?;
        tracing::trace!(target: "orbit::vfs", path = %resolved.display(), "native read");
        std::fs::read(&resolved)
            .map_err(|e| VfsError::from_io(e, &resolved.to_string_lossy()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_read_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.orb");
        std::fs::write(&file, "var a = 1;").unwrap();

        let fs = NativeFileSystem::new();
        assert!(fs.exists(&file));
        assert!(fs.is_file(&file));
        assert!(!fs.is_file(dir.path()));
        assert_eq!(fs.read_to_string(&file).unwrap(), "var a = 1;");
    }

    #[test]
    fn test_native_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = NativeFileSystem::new();
        let err = fs.read_file(&dir.path().join("missing.orb")).unwrap_err();
        assert!(matches!(err, VfsError::NotFound { .. }));
    }

    #[test]
    fn test_with_base_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.orb"), "x").unwrap();

        let fs = NativeFileSystem::with_base(dir.path());
        assert!(fs.exists(Path::new("lib.orb")));
        assert_eq!(fs.read_file(Path::new("./lib.orb")).unwrap(), b"x");
    }

    #[test]
    fn test_with_base_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let fs = NativeFileSystem::with_base(dir.path());
        let err = fs.read_file(Path::new("../../etc/passwd")).unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath { .. }));
        assert!(!fs.exists(Path::new("../../etc/passwd")));
    }
}
