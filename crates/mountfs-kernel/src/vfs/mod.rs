//! Mountable virtual filesystem.
//!
//! Key components:
//!
//! - [`FileSystem`] - Contract every mounted backend implements
//! - [`MountTable`] - Routes paths to backends by longest prefix
//! - [`SymlinkStore`] - Overlay symlinks and the path resolver
//! - [`MountableFs`] - Dispatches verbs through the resolver and mount table
//! - [`MemoryBackend`] / [`LocalBackend`] - Reference backends
//!
//! ## Design Decisions
//!
//! - **Path-based**: Every verb takes absolute virtual paths. Backends see
//!   paths relative to their mount point, rooted at `/`.
//! - **Links in the overlay**: Symlinks never reach a backend, so they work
//!   over plugins with no link support of their own.
//! - **Boundary-respecting routing**: `/data` serves `/data/x` but never
//!   `/dataset`.

pub mod backends;
mod error;
mod mount;
mod mountable;
mod ops;
pub mod path;
mod symlink;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use mount::{Mount, MountInfo, MountTable};
pub use mountable::MountableFs;
pub use ops::{FileReader, FileSystem, FileWriter};
pub use symlink::{MAX_SYMLINK_HOPS, SymlinkEntry, SymlinkStore};
pub use types::{
    FileInfo, META_TYPE_DIRECTORY, META_TYPE_FILE, META_TYPE_SYMLINK, MetaData, WriteFlags,
};
