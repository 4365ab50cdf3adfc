//! Orbit Virtual File System
//!
//! Script sources (the root file and everything it `include`s) are read
//! through a [`VirtualFileSystem`], so an embedding application can serve
//! scripts from disk or from memory.
//!
//! # Usage
//! ```rust
//! use orbit_vfs::{MemoryFileSystem, VirtualFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::with_files([("/lib/util.orb", "var x = 1;")]);
//! let source = fs.read_to_string(Path::new("/lib/util.orb")).unwrap();
//! assert_eq!(source, "var x = 1;");
//! ```

mod error;
mod memory;
mod native;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
pub use r#trait::{normalize_path, VirtualFileSystem};

/// Create a new memory-based file system.
pub fn memory_fs() -> MemoryFileSystem {
    MemoryFileSystem::new()
}

/// Create a new native file system.
pub fn native_fs() -> NativeFileSystem {
    NativeFileSystem::new()
}
