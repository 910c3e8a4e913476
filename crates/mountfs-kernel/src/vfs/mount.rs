//! VFS mount table with longest-prefix routing.
//!
//! Routes a virtual path to the backend responsible for it. The table only
//! answers routing questions; it never calls into a backend while its lock
//! is held.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::error::{VfsError, VfsResult};
use super::ops::FileSystem;
use super::path;

/// A mounted backend.
#[derive(Clone)]
pub struct Mount {
    /// Canonical mount path (e.g., "/data/users").
    pub path: String,
    /// The backend serving this subtree.
    pub fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("path", &self.path)
            .field("fs", &self.fs.name())
            .finish()
    }
}

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The mount path (e.g., "/mnt/project").
    pub path: String,
    /// Name of the mounted backend.
    pub backend: String,
}

/// Registry of mount points.
///
/// Mount points are matched by longest prefix on component boundaries. With
/// `/data` and `/data/users` both mounted, `/data/users/alice` routes to
/// `/data/users`, `/data/config` routes to `/data`, and `/dataset` routes to
/// neither.
pub struct MountTable {
    /// Mount points, keyed by canonical path.
    mounts: RwLock<BTreeMap<String, Mount>>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.mounts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTable {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Mount a backend at the given path.
    ///
    /// Fails with `AlreadyMounted` if the exact normalized path is taken.
    pub fn mount(&self, mount_path: &str, fs: Arc<dyn FileSystem>) -> VfsResult<String> {
        let mount_path = path::clean(mount_path);
        let mut mounts = self.mounts.write();
        if mounts.contains_key(&mount_path) {
            return Err(VfsError::already_mounted(mount_path));
        }
        mounts.insert(
            mount_path.clone(),
            Mount {
                path: mount_path.clone(),
                fs,
            },
        );
        Ok(mount_path)
    }

    /// Unmount the backend at exactly `mount_path`.
    ///
    /// Nested mounts are untouched. Returns the removed mount so the caller
    /// can shut the backend down outside the lock.
    pub fn unmount(&self, mount_path: &str) -> VfsResult<Mount> {
        let mount_path = path::clean(mount_path);
        self.mounts
            .write()
            .remove(&mount_path)
            .ok_or_else(|| VfsError::not_mounted(mount_path))
    }

    /// Find the mount serving `target` and the path relative to it.
    ///
    /// The relative path is rooted at `/`. Returns `None` only when no mount,
    /// not even `/`, covers the path.
    pub fn find_mount(&self, target: &str) -> Option<(Mount, String)> {
        let target = path::clean(target);
        let mounts = self.mounts.read();

        let best = mounts
            .values()
            .filter(|m| path::has_prefix(&target, &m.path))
            .max_by_key(|m| m.path.len())?;

        let relative = path::strip_mount_prefix(&target, &best.path)?;
        Some((best.clone(), relative))
    }

    /// Returns true if something is mounted at exactly `mount_path`.
    pub fn is_mount_point(&self, mount_path: &str) -> bool {
        self.mounts.read().contains_key(&path::clean(mount_path))
    }

    /// Names of the next path component of every mount strictly below `dir`.
    ///
    /// Listing `/` with only `/mnt/a` and `/mnt/b` mounted yields `["mnt"]`.
    pub fn child_mount_names(&self, dir: &str) -> Vec<String> {
        let dir = path::clean(dir);
        let mounts = self.mounts.read();
        let mut names = BTreeSet::new();
        for mount_path in mounts.keys() {
            if mount_path == &dir || !path::has_prefix(mount_path, &dir) {
                continue;
            }
            let rest = if dir == "/" {
                &mount_path[1..]
            } else {
                &mount_path[dir.len() + 1..]
            };
            if let Some(first) = rest.split('/').next().filter(|s| !s.is_empty()) {
                names.insert(first.to_string());
            }
        }
        names.into_iter().collect()
    }

    /// List all current mounts, sorted by path.
    pub fn list(&self) -> Vec<MountInfo> {
        self.mounts
            .read()
            .values()
            .map(|m| MountInfo {
                path: m.path.clone(),
                backend: m.fs.name().to_string(),
            })
            .collect()
    }

    /// Number of mounts.
    pub fn len(&self) -> usize {
        self.mounts.read().len()
    }

    /// Returns true if nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.mounts.read().is_empty()
    }
}
