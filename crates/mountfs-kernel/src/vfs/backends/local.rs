//! Local filesystem backend.
//!
//! Provides access to a host directory, with path security to prevent
//! escaping the root directory.

use async_trait::async_trait;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{FileReader, FileSystem, FileWriter};
use crate::vfs::path;
use crate::vfs::types::{FileInfo, WriteFlags};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/share`, then `read("/docs/a.txt")` reads `/srv/share/docs/a.txt`.
///
/// Virtual paths are cleaned lexically before being joined, so `..` can never
/// climb above the root; host symlinks pointing outside the root are
/// rejected after canonicalization.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path to a host path within the root.
    ///
    /// Returns an error if the host path escapes the root through a symlink.
    fn host_path(&self, target: &str) -> VfsResult<PathBuf> {
        let cleaned = path::clean(target);
        let relative = cleaned.trim_start_matches('/');
        if relative.is_empty() {
            return Ok(self.root.clone());
        }

        let full = self.root.join(relative);

        // Canonicalize the deepest existing ancestor; the rest does not exist
        // yet and cannot be a symlink.
        let mut existing = full.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        let canonical = existing.canonicalize().map_err(VfsError::from)?;
        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(full)
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Map a host I/O error onto the VFS taxonomy.
    fn io_error(e: io::Error, target: &str) -> VfsError {
        match e.kind() {
            io::ErrorKind::NotFound => VfsError::not_found(target),
            io::ErrorKind::AlreadyExists => VfsError::already_exists(target),
            io::ErrorKind::PermissionDenied => VfsError::permission_denied(target),
            io::ErrorKind::NotADirectory => VfsError::not_a_directory(target),
            io::ErrorKind::IsADirectory => VfsError::is_a_directory(target),
            io::ErrorKind::DirectoryNotEmpty => VfsError::directory_not_empty(target),
            _ => VfsError::Io(e),
        }
    }

    /// Convert std::fs::Metadata to FileInfo.
    fn metadata_to_info(&self, name: &str, meta: &std::fs::Metadata) -> FileInfo {
        let mode = meta.permissions().mode() & 0o7777;
        let mut info = if meta.is_dir() {
            FileInfo::directory(name, mode)
        } else {
            FileInfo::file(name, meta.len(), mode)
        };
        info.mod_time = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        info.with_meta_name("localfs")
    }
}

#[async_trait]
impl FileSystem for LocalBackend {
    fn name(&self) -> &str {
        "localfs"
    }

    async fn create(&self, target: &str) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(e, target))?;
        }

        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;
        Ok(())
    }

    async fn mkdir(&self, target: &str, mode: u32) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;

        let mut builder = fs::DirBuilder::new();
        builder.mode(mode);
        builder
            .create(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))
    }

    async fn remove(&self, target: &str) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let meta = fs::symlink_metadata(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;
        let result = if meta.is_dir() {
            fs::remove_dir(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        };
        result.map_err(|e| Self::io_error(e, target))
    }

    async fn remove_all(&self, target: &str) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let meta = match fs::symlink_metadata(&full_path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Self::io_error(e, target)),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        };
        result.map_err(|e| Self::io_error(e, target))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> VfsResult<()> {
        self.check_writable()?;
        let from_path = self.host_path(old_path)?;
        let to_path = self.host_path(new_path)?;

        fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| Self::io_error(e, old_path))
    }

    async fn chmod(&self, target: &str, mode: u32) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;
        fs::set_permissions(&full_path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| Self::io_error(e, target))
    }

    async fn read(&self, target: &str, offset: u64, size: Option<u64>) -> VfsResult<Vec<u8>> {
        let full_path = self.host_path(target)?;
        let mut file = fs::File::open(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;
        if file.metadata().await.map_err(VfsError::from)?.is_dir() {
            return Err(VfsError::is_a_directory(target));
        }

        file.seek(io::SeekFrom::Start(offset))
            .await
            .map_err(VfsError::from)?;

        let mut buffer = Vec::new();
        match size {
            Some(size) => {
                file.take(size)
                    .read_to_end(&mut buffer)
                    .await
                    .map_err(VfsError::from)?;
            }
            None => {
                file.read_to_end(&mut buffer).await.map_err(VfsError::from)?;
            }
        }
        Ok(buffer)
    }

    async fn write(
        &self,
        target: &str,
        data: &[u8],
        offset: u64,
        flags: WriteFlags,
    ) -> VfsResult<u64> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;

        if flags.create {
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Self::io_error(e, target))?;
            }
        }

        let mut options = fs::OpenOptions::new();
        options
            .write(true)
            .append(flags.append)
            .truncate(flags.truncate);
        if flags.create && flags.exclusive {
            options.create_new(true);
        } else {
            options.create(flags.create);
        }

        let mut file = options
            .open(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;

        if !flags.append {
            file.seek(io::SeekFrom::Start(offset))
                .await
                .map_err(VfsError::from)?;
        }
        file.write_all(data).await.map_err(VfsError::from)?;
        file.flush().await.map_err(VfsError::from)?;

        Ok(data.len() as u64)
    }

    async fn open(&self, target: &str) -> VfsResult<FileReader> {
        let full_path = self.host_path(target)?;
        let file = fs::File::open(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, target: &str) -> VfsResult<FileWriter> {
        self.check_writable()?;
        let full_path = self.host_path(target)?;
        let file = fs::File::create(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;
        Ok(Box::new(file))
    }

    async fn read_dir(&self, target: &str) -> VfsResult<Vec<FileInfo>> {
        let full_path = self.host_path(target)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;

        while let Some(entry) = dir.next_entry().await.map_err(VfsError::from)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata().await.map_err(VfsError::from)?;
            entries.push(self.metadata_to_info(&name, &meta));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, target: &str) -> VfsResult<FileInfo> {
        let full_path = self.host_path(target)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| Self::io_error(e, target))?;
        let cleaned = path::clean(target);
        let name = if cleaned == "/" { "/" } else { path::base_name(&cleaned) };
        Ok(self.metadata_to_info(name, &meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    async fn setup() -> (TempDir, LocalBackend) {
        let temp = TempDir::new().unwrap();
        let fs = LocalBackend::new(temp.path());
        (temp, fs)
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let (_temp, fs) = setup().await;

        fs.create("/test.txt").await.unwrap();
        fs.write("/test.txt", b"hello world", 0, WriteFlags::none())
            .await
            .unwrap();

        let data = fs.read("/test.txt", 0, None).await.unwrap();
        assert_eq!(data, b"hello world");

        let err = fs.create("/test.txt").await.unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_partial_read() {
        let (_temp, fs) = setup().await;
        fs.write_all("/test.txt", b"hello world").await.unwrap();

        let data = fs.read("/test.txt", 6, Some(5)).await.unwrap();
        assert_eq!(data, b"world");
    }

    #[tokio::test]
    async fn test_mkdir_and_read_dir() {
        let (_temp, fs) = setup().await;

        fs.mkdir("/subdir", 0o755).await.unwrap();
        fs.create("/subdir/file.txt").await.unwrap();
        fs.create("/root.txt").await.unwrap();

        let entries = fs.read_dir("/").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["root.txt", "subdir"]);
        assert!(entries[1].is_dir);
        assert_eq!(entries[1].meta.name, "localfs");

        let err = fs.mkdir("/missing/child", 0o755).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_only() {
        let temp = TempDir::new().unwrap();
        let fs = LocalBackend::read_only(temp.path());

        let result = fs.create("/test.txt").await;
        assert!(matches!(result, Err(VfsError::ReadOnly)));
    }

    #[tokio::test]
    async fn test_dotdot_stays_inside_root() {
        let (temp, fs) = setup().await;
        fs.write_all("/inside.txt", b"x").await.unwrap();

        // `..` is cleaned lexically and cannot climb above the root.
        let data = fs.read("/../../inside.txt", 0, None).await.unwrap();
        assert_eq!(data, b"x");
        assert!(temp.path().join("inside.txt").exists());
    }

    #[tokio::test]
    async fn test_host_symlink_escape_blocked() {
        let (temp, fs) = setup().await;
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();

        let result = fs.read("/escape/secret", 0, None).await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));
    }

    #[tokio::test]
    async fn test_remove_and_remove_all() {
        let (_temp, fs) = setup().await;
        fs.write_all("/dir/a/b.txt", b"x").await.unwrap();

        let err = fs.remove("/dir").await.unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));

        fs.remove_all("/dir").await.unwrap();
        assert!(!fs.exists("/dir").await);
        fs.remove_all("/dir").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename() {
        let (_temp, fs) = setup().await;
        fs.write_all("/old.txt", b"content").await.unwrap();

        fs.rename("/old.txt", "/new.txt").await.unwrap();

        assert!(!fs.exists("/old.txt").await);
        assert_eq!(fs.read_all("/new.txt").await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_chmod() {
        let (_temp, fs) = setup().await;
        fs.create("/f").await.unwrap();
        fs.chmod("/f", 0o600).await.unwrap();
        assert_eq!(fs.stat("/f").await.unwrap().mode, 0o600);
    }

    #[tokio::test]
    async fn test_open_write_then_read() {
        let (_temp, fs) = setup().await;

        let mut writer = fs.open_write("/streamed.txt").await.unwrap();
        writer.write_all(b"via writer").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        let mut reader = fs.open("/streamed.txt").await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"via writer");
    }
}
