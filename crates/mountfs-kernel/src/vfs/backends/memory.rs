//! In-memory filesystem backend.
//!
//! Used for scratch mounts and testing. All data is ephemeral.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{FileReader, FileSystem};
use crate::vfs::path;
use crate::vfs::types::{FileInfo, WriteFlags};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File {
        data: Vec<u8>,
        mode: u32,
        mtime: SystemTime,
    },
    Directory {
        mode: u32,
        mtime: SystemTime,
    },
}

impl Entry {
    fn file(mode: u32) -> Self {
        Entry::File {
            data: Vec::new(),
            mode,
            mtime: SystemTime::now(),
        }
    }

    fn directory(mode: u32) -> Self {
        Entry::Directory {
            mode,
            mtime: SystemTime::now(),
        }
    }

    fn info(&self, name: &str, backend: &str) -> FileInfo {
        let mut info = match self {
            Entry::File { data, mode, .. } => FileInfo::file(name, data.len() as u64, *mode),
            Entry::Directory { mode, .. } => FileInfo::directory(name, *mode),
        };
        info.mod_time = match self {
            Entry::File { mtime, .. } | Entry::Directory { mtime, .. } => *mtime,
        };
        info.with_meta_name(backend)
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via an internal `RwLock`. All data is lost when dropped.
/// Missing parent directories are created implicitly by `create`, `mkdir`
/// and creating writes.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::named("memfs")
    }

    /// Create a new empty in-memory filesystem with a custom backend name.
    pub fn named(name: impl Into<String>) -> Self {
        let mut entries = BTreeMap::new();
        // Root directory always exists
        entries.insert("/".to_string(), Entry::directory(0o755));
        Self {
            name: name.into(),
            entries: RwLock::new(entries),
        }
    }

    /// Ensure all parent directories of `normalized` exist.
    fn ensure_parents(entries: &mut BTreeMap<String, Entry>, normalized: &str) -> VfsResult<()> {
        let parent = path::parent(normalized);
        for dir in path::prefixes(parent) {
            match entries.get(dir) {
                Some(Entry::Directory { .. }) => {}
                Some(Entry::File { .. }) => return Err(VfsError::not_a_directory(dir)),
                None => {
                    entries.insert(dir.to_string(), Entry::directory(0o755));
                }
            }
        }
        Ok(())
    }

    fn has_children(entries: &BTreeMap<String, Entry>, dir: &str) -> bool {
        entries
            .keys()
            .any(|k| k != dir && k != "/" && path::parent(k) == dir)
    }
}

#[async_trait]
impl FileSystem for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, target: &str) -> VfsResult<()> {
        let normalized = path::clean(target);
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(normalized));
        }
        Self::ensure_parents(&mut entries, &normalized)?;
        entries.insert(normalized, Entry::file(0o644));
        Ok(())
    }

    async fn mkdir(&self, target: &str, mode: u32) -> VfsResult<()> {
        let normalized = path::clean(target);
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(normalized));
        }
        Self::ensure_parents(&mut entries, &normalized)?;
        entries.insert(normalized, Entry::directory(mode));
        Ok(())
    }

    async fn remove(&self, target: &str) -> VfsResult<()> {
        let normalized = path::clean(target);
        if normalized == "/" {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.entries.write();
        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) if Self::has_children(&entries, &normalized) => {
                Err(VfsError::directory_not_empty(normalized))
            }
            Some(_) => {
                entries.remove(&normalized);
                Ok(())
            }
            None => Err(VfsError::not_found(normalized)),
        }
    }

    async fn remove_all(&self, target: &str) -> VfsResult<()> {
        let normalized = path::clean(target);
        if normalized == "/" {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.entries.write();
        entries.retain(|k, _| !path::has_prefix(k, &normalized));
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> VfsResult<()> {
        let from = path::clean(old_path);
        let to = path::clean(new_path);
        if from == "/" || to == "/" {
            return Err(VfsError::permission_denied("cannot rename root"));
        }
        if from == to {
            return Ok(());
        }
        if path::has_prefix(&to, &from) {
            return Err(VfsError::invalid_path(format!("cannot move {from} into itself")));
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&from) {
            return Err(VfsError::not_found(from));
        }
        Self::ensure_parents(&mut entries, &to)?;

        // Move the entry and, for directories, everything beneath it.
        let moved: Vec<String> = entries
            .keys()
            .filter(|k| path::has_prefix(k, &from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                entries.insert(new, entry);
            }
        }
        Ok(())
    }

    async fn chmod(&self, target: &str, new_mode: u32) -> VfsResult<()> {
        let normalized = path::clean(target);
        let mut entries = self.entries.write();
        match entries.get_mut(&normalized) {
            Some(Entry::File { mode, .. }) | Some(Entry::Directory { mode, .. }) => {
                *mode = new_mode;
                Ok(())
            }
            None => Err(VfsError::not_found(normalized)),
        }
    }

    async fn read(&self, target: &str, offset: u64, size: Option<u64>) -> VfsResult<Vec<u8>> {
        let normalized = path::clean(target);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
                let end = match size {
                    Some(size) => start
                        .saturating_add(usize::try_from(size).unwrap_or(usize::MAX))
                        .min(data.len()),
                    None => data.len(),
                };
                Ok(data[start..end].to_vec())
            }
            Some(Entry::Directory { .. }) => Err(VfsError::is_a_directory(normalized)),
            None => Err(VfsError::not_found(normalized)),
        }
    }

    async fn write(
        &self,
        target: &str,
        data: &[u8],
        offset: u64,
        flags: WriteFlags,
    ) -> VfsResult<u64> {
        let normalized = path::clean(target);
        let positioned_end = if flags.append {
            None
        } else {
            let end = usize::try_from(offset)
                .ok()
                .and_then(|start| start.checked_add(data.len()))
                .ok_or_else(|| VfsError::other(format!("write offset out of range: {offset}")))?;
            Some(end)
        };
        let mut entries = self.entries.write();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {
                return Err(VfsError::is_a_directory(normalized));
            }
            Some(Entry::File { .. }) if flags.create && flags.exclusive => {
                return Err(VfsError::already_exists(normalized));
            }
            Some(Entry::File { .. }) => {}
            None if flags.create => {
                Self::ensure_parents(&mut entries, &normalized)?;
                entries.insert(normalized.clone(), Entry::file(0o644));
            }
            None => return Err(VfsError::not_found(normalized)),
        }

        let Some(Entry::File {
            data: file_data,
            mtime,
            ..
        }) = entries.get_mut(&normalized)
        else {
            return Err(VfsError::not_found(normalized));
        };

        if flags.truncate {
            file_data.clear();
        }
        let end = positioned_end.unwrap_or(file_data.len() + data.len());
        let start = end - data.len();
        // Extend if necessary
        if end > file_data.len() {
            file_data.resize(end, 0);
        }
        file_data[start..end].copy_from_slice(data);
        *mtime = SystemTime::now();
        Ok(data.len() as u64)
    }

    async fn open(&self, target: &str) -> VfsResult<FileReader> {
        let data = self.read(target, 0, None).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn read_dir(&self, target: &str) -> VfsResult<Vec<FileInfo>> {
        let normalized = path::clean(target);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(normalized)),
            None => return Err(VfsError::not_found(normalized)),
        }

        // BTreeMap iteration keeps the listing sorted by name within a directory.
        let result = entries
            .iter()
            .filter(|(k, _)| k.as_str() != "/" && path::parent(k) == normalized)
            .map(|(k, entry)| entry.info(path::base_name(k), &self.name))
            .collect();
        Ok(result)
    }

    async fn stat(&self, target: &str) -> VfsResult<FileInfo> {
        let normalized = path::clean(target);
        let entries = self.entries.read();
        entries
            .get(&normalized)
            .map(|e| {
                let name = if normalized == "/" { "/" } else { path::base_name(&normalized) };
                e.info(name, &self.name)
            })
            .ok_or_else(|| VfsError::not_found(normalized.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_create_and_read() {
        let fs = MemoryBackend::new();
        fs.create("/test.txt").await.unwrap();
        fs.write("/test.txt", b"hello world", 0, WriteFlags::none())
            .await
            .unwrap();

        let data = fs.read("/test.txt", 0, None).await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_partial_read() {
        let fs = MemoryBackend::new();
        fs.write_all("/test.txt", b"hello world").await.unwrap();

        let data = fs.read("/test.txt", 6, Some(5)).await.unwrap();
        assert_eq!(data, b"world");
        let data = fs.read("/test.txt", 100, Some(5)).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_write_flags() {
        let fs = MemoryBackend::new();
        let err = fs.write("/missing", b"x", 0, WriteFlags::none()).await.unwrap_err();
        assert!(err.is_not_found());

        fs.write("/f", b"abc", 0, WriteFlags::create()).await.unwrap();
        fs.write("/f", b"def", 0, WriteFlags::append()).await.unwrap();
        assert_eq!(fs.read_all("/f").await.unwrap(), b"abcdef");

        fs.write("/f", b"z", 0, WriteFlags::create_truncate()).await.unwrap();
        assert_eq!(fs.read_all("/f").await.unwrap(), b"z");

        let err = fs
            .write("/f", b"q", 0, WriteFlags::create_exclusive())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_mkdir_and_read_dir() {
        let fs = MemoryBackend::new();
        fs.mkdir("/subdir", 0o755).await.unwrap();
        fs.create("/subdir/file.txt").await.unwrap();
        fs.create("/root.txt").await.unwrap();

        let entries = fs.read_dir("/").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["root.txt", "subdir"]);
        assert!(entries[1].is_dir);

        let subentries = fs.read_dir("/subdir").await.unwrap();
        assert_eq!(subentries.len(), 1);
        assert_eq!(subentries[0].name, "file.txt");
        assert_eq!(subentries[0].meta.name, "memfs");
    }

    #[tokio::test]
    async fn test_remove() {
        let fs = MemoryBackend::new();
        fs.create("/dir/file.txt").await.unwrap();

        let err = fs.remove("/dir").await.unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));

        fs.remove("/dir/file.txt").await.unwrap();
        fs.remove("/dir").await.unwrap();
        assert!(!fs.exists("/dir").await);
    }

    #[tokio::test]
    async fn test_remove_all() {
        let fs = MemoryBackend::new();
        fs.create("/a/b/c.txt").await.unwrap();
        fs.create("/ab.txt").await.unwrap();

        fs.remove_all("/a").await.unwrap();
        assert!(!fs.exists("/a/b/c.txt").await);
        assert!(!fs.exists("/a").await);
        assert!(fs.exists("/ab.txt").await);
    }

    #[tokio::test]
    async fn test_rename_directory() {
        let fs = MemoryBackend::new();
        fs.write_all("/old/inner.txt", b"content").await.unwrap();

        fs.rename("/old", "/new").await.unwrap();

        assert!(!fs.exists("/old").await);
        assert_eq!(fs.read_all("/new/inner.txt").await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_chmod() {
        let fs = MemoryBackend::new();
        fs.create("/f").await.unwrap();
        fs.chmod("/f", 0o600).await.unwrap();
        assert_eq!(fs.stat("/f").await.unwrap().mode, 0o600);
        assert!(fs.chmod("/nope", 0o600).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_open_reader() {
        let fs = MemoryBackend::new();
        fs.write_all("/f", b"streamed").await.unwrap();

        let mut reader = fs.open("/f").await.unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "streamed");

        let err = fs.open_write("/f").await.err().unwrap();
        assert!(matches!(err, VfsError::NotSupported { op: "open_write", .. }));
    }

    #[tokio::test]
    async fn test_auto_create_parents() {
        let fs = MemoryBackend::new();
        fs.create("/a/b/c/file.txt").await.unwrap();

        assert!(fs.stat("/a").await.unwrap().is_dir);
        assert!(fs.stat("/a/b").await.unwrap().is_dir);
        assert!(fs.stat("/a/b/c").await.unwrap().is_dir);
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let fs = MemoryBackend::new();
        fs.create("/a/b/c.txt").await.unwrap();

        assert!(fs.stat("a/b/c.txt").await.is_ok());
        assert!(fs.stat("/a//b/c.txt").await.is_ok());
        assert!(fs.stat("a/./b/c.txt").await.is_ok());
        assert!(fs.stat("a/b/../b/c.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_write_offset_out_of_range() {
        let fs = MemoryBackend::new();
        fs.write_all("/f", b"abc").await.unwrap();

        let err = fs.write("/f", b"x", u64::MAX, WriteFlags::none()).await.unwrap_err();
        assert!(matches!(err, VfsError::Other(_)));
        assert_eq!(fs.read("/f", 0, None).await.unwrap(), b"abc");

        // Appends ignore the offset.
        fs.write("/f", b"d", u64::MAX, WriteFlags::append()).await.unwrap();
        assert_eq!(fs.read("/f", 0, None).await.unwrap(), b"abcd");
        assert!(fs.read("/f", u64::MAX, Some(u64::MAX)).await.unwrap().is_empty());
    }
}
