//! 脚本源码加载
//!
//! 根文件记为文件 0，每个新 include 的文件按首次请求的顺序分配递增的 ID。
//! 同一路径再次请求时复用原来的 ID。所有读取都经过 [`VirtualFileSystem`]。

use crate::error::Error;
use orbit_vfs::{normalize_path, NativeFileSystem, VirtualFileSystem};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// 根源码的文件 ID
pub const ROOT_FILE_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadedEntry {
    /// 脚本中写的名字（根文件为其路径）
    requested: String,
    path: PathBuf,
}

pub struct SourceLoader {
    fs: Box<dyn VirtualFileSystem>,
    base_dir: Option<PathBuf>,
    files: BTreeMap<u32, LoadedEntry>,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(NativeFileSystem::new())
    }
}

impl fmt::Debug for SourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceLoader")
            .field("base_dir", &self.base_dir)
            .field("files", &self.files)
            .finish()
    }
}

impl SourceLoader {
    pub fn new(fs: impl VirtualFileSystem + 'static) -> Self {
        Self {
            fs: Box::new(fs),
            base_dir: None,
            files: BTreeMap::new(),
        }
    }

    /// 读取根文件：记为文件 0，并以其所在目录作为 include 的基准目录
    pub fn open_root(&mut self, path: &Path) -> Result<String, Error> {
        let path = normalize_path(path);
        let source = self.fs.read_to_string(&path).map_err(|e| Error::Load {
            message: e.to_string(),
            file: Some(path.display().to_string()),
            line: None,
        })?;
        self.base_dir = path.parent().map(Path::to_path_buf);
        self.files.insert(
            ROOT_FILE_ID,
            LoadedEntry {
                requested: path.display().to_string(),
                path,
            },
        );
        debug!(target: "orbit::api", base_dir = ?self.base_dir, "Opened root source");
        Ok(source)
    }

    /// 处理一次 include 请求，返回 (源码, 文件 ID)
    pub fn load(&mut self, name: &str) -> Result<(String, u32), Error> {
        let path = match &self.base_dir {
            Some(base) => normalize_path(&base.join(name)),
            None => normalize_path(Path::new(name)),
        };
        let source = self.fs.read_to_string(&path).map_err(|e| Error::Load {
            message: format!("Unable to load file {name}: {e}"),
            file: None,
            line: None,
        })?;

        let known = self
            .files
            .iter()
            .find(|(id, entry)| **id != ROOT_FILE_ID && entry.path == path)
            .map(|(id, _)| *id);
        let file_id = match known {
            Some(id) => id,
            None => {
                let id = self.files.keys().next_back().map_or(1, |last| last + 1);
                self.files.insert(
                    id,
                    LoadedEntry {
                        requested: name.to_string(),
                        path: path.clone(),
                    },
                );
                id
            }
        };
        trace!(target: "orbit::api", file = name, file_id, path = %path.display(), "Loaded include");
        Ok((source, file_id))
    }

    /// 结束一次基于路径的编译
    pub fn clear_base_dir(&mut self) {
        self.base_dir = None;
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// 文件 ID → 名字
    pub fn filename(&self, file_id: u32) -> Option<&str> {
        self.files.get(&file_id).map(|e| e.requested.as_str())
    }

    /// 是否加载过该文件（按 include 名或解析后的路径匹配）
    pub fn contains(&self, name: &str) -> bool {
        self.files
            .values()
            .any(|e| e.requested == name || e.path == Path::new(name))
    }

    /// 已加载的文件，按 ID 排序
    pub fn loaded_files(&self) -> Vec<(u32, String)> {
        self.files
            .iter()
            .map(|(id, e)| (*id, e.requested.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_vfs::MemoryFileSystem;

    fn loader() -> SourceLoader {
        SourceLoader::new(MemoryFileSystem::with_files([
            ("/game/main.orb", "include \"util.orb\""),
            ("/game/util.orb", "var u = 1"),
            ("/game/lib/math.orb", "var m = 2"),
        ]))
    }

    #[test]
    fn test_root_is_file_zero() {
        let mut loader = loader();
        let source = loader.open_root(Path::new("/game/main.orb")).unwrap();
        assert_eq!(source, "include \"util.orb\"");
        assert_eq!(loader.filename(ROOT_FILE_ID), Some("/game/main.orb"));
        assert_eq!(loader.base_dir(), Some(Path::new("/game")));
    }

    #[test]
    fn test_ids_are_sequential_and_reused() {
        let mut loader = loader();
        loader.open_root(Path::new("/game/main.orb")).unwrap();
        assert_eq!(loader.load("util.orb").unwrap().1, 1);
        assert_eq!(loader.load("lib/math.orb").unwrap().1, 2);
        assert_eq!(loader.load("./util.orb").unwrap().1, 1);
        assert_eq!(loader.filename(2), Some("lib/math.orb"));
        assert!(loader.contains("util.orb"));
        assert!(loader.contains("/game/lib/math.orb"));
        assert!(!loader.contains("other.orb"));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let mut loader = loader();
        let err = loader.load("nope.orb").unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
        assert!(err.to_string().contains("Unable to load file nope.orb"));
        assert!(loader.loaded_files().is_empty());
    }

    #[test]
    fn test_clear_base_dir() {
        let mut loader = loader();
        loader.open_root(Path::new("/game/main.orb")).unwrap();
        loader.clear_base_dir();
        assert_eq!(loader.base_dir(), None);
        assert!(loader.load("util.orb").is_err());
        assert!(loader.load("/game/util.orb").is_ok());
    }
}
