//! Core VFS types.
//!
//! These mirror the entry shape handed to the transport layer, so they are
//! serde-serializable and carry no backend-specific handles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// `meta.type` value for entries that are symlinks in the overlay.
pub const META_TYPE_SYMLINK: &str = "symlink";

/// `meta.type` value for regular files produced by the bundled backends.
pub const META_TYPE_FILE: &str = "file";

/// `meta.type` value for directories produced by the bundled backends.
pub const META_TYPE_DIRECTORY: &str = "directory";

/// Structured metadata attached to every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    /// Name of the plugin or backend that produced the entry.
    pub name: String,
    /// Type classification (`"file"`, `"directory"`, `"symlink"`, or a
    /// backend-specific value).
    #[serde(rename = "type")]
    pub kind: String,
    /// Extensible per-backend metadata.
    #[serde(default)]
    pub content: HashMap<String, String>,
}

impl MetaData {
    /// Create metadata with the given backend name and type.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            content: HashMap::new(),
        }
    }
}

/// File metadata, as returned by `stat` and `read_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Entry name (not full path).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Unix permission bits (e.g., 0o644).
    pub mode: u32,
    /// Last modification time.
    pub mod_time: SystemTime,
    /// Whether the entry is (or, for links, points at) a directory.
    pub is_dir: bool,
    /// Structured metadata.
    pub meta: MetaData,
}

impl FileInfo {
    /// Create info for a regular file.
    pub fn file(name: impl Into<String>, size: u64, mode: u32) -> Self {
        Self {
            name: name.into(),
            size,
            mode,
            mod_time: SystemTime::now(),
            is_dir: false,
            meta: MetaData::new("", META_TYPE_FILE),
        }
    }

    /// Create info for a directory.
    pub fn directory(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mode,
            mod_time: SystemTime::now(),
            is_dir: true,
            meta: MetaData::new("", META_TYPE_DIRECTORY),
        }
    }

    /// Create info for an overlay symlink whose target could not be inspected.
    pub fn symlink(name: impl Into<String>, target: &str) -> Self {
        Self {
            name: name.into(),
            size: target.len() as u64,
            mode: 0o777,
            mod_time: SystemTime::now(),
            is_dir: false,
            meta: MetaData::new("", META_TYPE_SYMLINK),
        }
    }

    /// Set the backend name recorded in `meta.name`.
    pub fn with_meta_name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = name.into();
        self
    }

    /// Returns true if `meta.type` marks this entry as a symlink.
    pub fn is_symlink(&self) -> bool {
        self.meta.kind == META_TYPE_SYMLINK
    }

    /// Mark this entry as a symlink, leaving every other field untouched.
    pub fn mark_symlink(&mut self) {
        self.meta.kind = META_TYPE_SYMLINK.to_string();
    }
}

/// Flags controlling `write`.
///
/// The default writes into an existing file at the given offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFlags {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Ignore the offset and write at the end of the file.
    pub append: bool,
    /// Truncate the file before writing.
    pub truncate: bool,
    /// Fail if the file already exists (only meaningful with `create`).
    pub exclusive: bool,
}

impl WriteFlags {
    /// Write into an existing file.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create if missing.
    pub fn create() -> Self {
        Self {
            create: true,
            ..Default::default()
        }
    }

    /// Create if missing and truncate.
    pub fn create_truncate() -> Self {
        Self {
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self {
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Append to the end of the file.
    pub fn append() -> Self {
        Self {
            append: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_info_constructors() {
        let file = FileInfo::file("a.txt", 12, 0o644);
        assert!(!file.is_dir);
        assert_eq!(file.meta.kind, META_TYPE_FILE);

        let dir = FileInfo::directory("d", 0o755);
        assert!(dir.is_dir);
        assert!(!dir.is_symlink());
    }

    #[test]
    fn test_mark_symlink_keeps_fields() {
        let mut dir = FileInfo::directory("linkdir", 0o755);
        dir.mark_symlink();
        assert!(dir.is_symlink());
        assert!(dir.is_dir);
        assert_eq!(dir.mode, 0o755);
    }

    #[test]
    fn test_meta_type_serializes_as_type() {
        let info = FileInfo::symlink("link", "/a/b");
        let encoded = to_ron(&info.meta);
        assert!(encoded.contains("\"symlink\""));
        assert!(!encoded.contains("kind"));
        assert_eq!(info.size, 4);
    }

    fn to_ron(meta: &MetaData) -> String {
        ron::to_string(meta).unwrap()
    }

    #[test]
    fn test_write_flags() {
        assert_eq!(WriteFlags::none(), WriteFlags::default());
        let flags = WriteFlags::create_exclusive();
        assert!(flags.create && flags.exclusive);
        assert!(!flags.truncate);
        assert!(WriteFlags::append().append);
    }
}
