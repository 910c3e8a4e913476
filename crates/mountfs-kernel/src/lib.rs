//! # mountfs-kernel
//!
//! Mountable virtual filesystem layer for mountfs.
//!
//! A [`MountableFs`] stitches many backends into one namespace:
//! - Backends are mounted at absolute paths like `/data` or `/mnt/project`
//! - Paths route to the most specific mount on component boundaries
//! - Symlinks live in an overlay above the backends and are resolved before
//!   routing, so a link may point across mounts
//! - The layer itself implements [`FileSystem`], so it can be mounted inside
//!   another layer

pub mod config;
pub mod vfs;

pub use config::{BackendConfig, ConfigError, MountConfig, MountSpec, SymlinkSpec};
pub use vfs::{
    backends::{LocalBackend, MemoryBackend},
    FileInfo, FileSystem, MountInfo, MountTable, MountableFs, SymlinkEntry, SymlinkStore,
    VfsError, VfsResult, WriteFlags,
};
