//! VFS error types.

use std::io;
use thiserror::Error;

/// VFS error type.
///
/// Errors raised by backends travel through the mountable layer untouched;
/// the variants specific to the layer itself are `AlreadyMounted`,
/// `NotMounted` and `TooManyLinks`.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File, directory, link or mount not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A filesystem is already mounted at this exact path.
    #[error("already mounted: {0}")]
    AlreadyMounted(String),

    /// Nothing is mounted at this exact path.
    #[error("not mounted: {0}")]
    NotMounted(String),

    /// Symlink resolution exceeded the hop bound.
    #[error("too many levels of symbolic links: {0}")]
    TooManyLinks(String),

    /// The backend does not implement this operation.
    #[error("{op} not supported: {path}")]
    NotSupported { op: &'static str, path: String },

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Source and destination live on different mounts.
    #[error("cross-device link")]
    CrossDeviceLink,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create an AlreadyMounted error.
    pub fn already_mounted(path: impl Into<String>) -> Self {
        Self::AlreadyMounted(path.into())
    }

    /// Create a NotMounted error.
    pub fn not_mounted(path: impl Into<String>) -> Self {
        Self::NotMounted(path.into())
    }

    /// Create a TooManyLinks error.
    pub fn too_many_links(path: impl Into<String>) -> Self {
        Self::TooManyLinks(path.into())
    }

    /// Create a NotSupported error for operation `op`.
    pub fn not_supported(op: &'static str, path: impl Into<String>) -> Self {
        Self::NotSupported {
            op,
            path: path.into(),
        }
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for `NotFound` and for I/O errors of kind `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::AlreadyMounted(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NotMounted(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::TooManyLinks(msg) => {
                io::Error::other(format!("too many levels of symbolic links: {msg}"))
            }
            VfsError::NotSupported { op, path } => {
                io::Error::new(io::ErrorKind::Unsupported, format!("{op}: {path}"))
            }
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "filesystem is read-only")
            }
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::CrossDeviceLink => io::Error::other("cross-device link"),
            VfsError::Io(e) => e,
            VfsError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
