//! Backend filesystem contract.
//!
//! Every plugin mounted into the namespace implements [`FileSystem`]. The
//! contract is path-based with explicit offset/size, so it maps directly
//! onto an HTTP or WASM host boundary.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::types::{FileInfo, WriteFlags};
use super::{VfsError, VfsResult};

/// Streaming reader returned by [`FileSystem::open`].
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

/// Streaming writer returned by [`FileSystem::open_write`].
pub type FileWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Capability set a backend exposes to the mountable layer.
///
/// Paths are absolute within the backend (`/` is the backend root). The
/// mount table strips the mount prefix before calling in.
///
/// Optional capabilities default to [`VfsError::NotSupported`]; the
/// mountable layer passes that error through and never emulates a missing
/// capability.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Backend name, reported in mount listings.
    fn name(&self) -> &str;

    // ========================================================================
    // Namespace
    // ========================================================================

    /// Create an empty regular file.
    async fn create(&self, path: &str) -> VfsResult<()>;

    /// Create a directory.
    async fn mkdir(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Remove a file or an empty directory.
    async fn remove(&self, path: &str) -> VfsResult<()>;

    /// Remove a path and everything beneath it.
    async fn remove_all(&self, path: &str) -> VfsResult<()>;

    /// Rename a file or directory within this backend.
    async fn rename(&self, old_path: &str, _new_path: &str) -> VfsResult<()> {
        Err(VfsError::not_supported("rename", old_path))
    }

    /// Change permission bits.
    async fn chmod(&self, path: &str, _mode: u32) -> VfsResult<()> {
        Err(VfsError::not_supported("chmod", path))
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Read up to `size` bytes starting at `offset`; `None` reads to the end.
    ///
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &str, offset: u64, size: Option<u64>) -> VfsResult<Vec<u8>>;

    /// Write `data` at `offset`, honoring `flags`.
    ///
    /// Returns the number of bytes written.
    async fn write(&self, path: &str, data: &[u8], offset: u64, flags: WriteFlags)
        -> VfsResult<u64>;

    /// Open a streaming reader.
    async fn open(&self, path: &str) -> VfsResult<FileReader> {
        Err(VfsError::not_supported("open", path))
    }

    /// Open a streaming writer.
    async fn open_write(&self, path: &str) -> VfsResult<FileWriter> {
        Err(VfsError::not_supported("open_write", path))
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// List directory entries.
    async fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>>;

    /// Get entry metadata.
    async fn stat(&self, path: &str) -> VfsResult<FileInfo>;

    /// Called once the backend has been unmounted.
    async fn shutdown(&self) -> VfsResult<()> {
        Ok(())
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &str) -> VfsResult<Vec<u8>> {
        self.read(path, 0, None).await
    }

    /// Replace entire file contents, creating the file if needed.
    async fn write_all(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        self.write(path, data, 0, WriteFlags::create_truncate())
            .await?;
        Ok(())
    }
}
