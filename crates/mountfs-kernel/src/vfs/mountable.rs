//! Mountable filesystem: mount table + symlink overlay + verb dispatch.
//!
//! Every verb resolves its path arguments through the symlink overlay, routes
//! the real path through the mount table, and delegates to the matched
//! backend with the mount-relative path. `stat` and `read_dir` overlay link
//! metadata on the way back; everything else passes through unchanged.
//!
//! Registry locks are only held for synchronous lookups and are always
//! released before a backend is awaited.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::{VfsError, VfsResult};
use super::mount::{Mount, MountInfo, MountTable};
use super::ops::{FileReader, FileSystem, FileWriter};
use super::path;
use super::symlink::{SymlinkEntry, SymlinkStore};
use super::types::{FileInfo, WriteFlags};

/// Backend name reported when a `MountableFs` is itself mounted.
const MOUNTABLE_NAME: &str = "mountablefs";

/// The virtual namespace exposed to the transport layer.
///
/// Constructed explicitly and passed by reference (usually as
/// `Arc<MountableFs>`), so independent instances can coexist.
#[derive(Debug, Default)]
pub struct MountableFs {
    mounts: MountTable,
    links: SymlinkStore,
}

impl MountableFs {
    /// Create an empty namespace with no mounts and no links.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying mount table.
    pub fn mount_table(&self) -> &MountTable {
        &self.mounts
    }

    /// The underlying symlink store.
    pub fn symlinks(&self) -> &SymlinkStore {
        &self.links
    }

    // ========================================================================
    // Mount management
    // ========================================================================

    /// Mount a backend at `mount_path`.
    #[tracing::instrument(skip(self, fs), fields(backend = fs.name()))]
    pub fn mount(&self, mount_path: &str, fs: Arc<dyn FileSystem>) -> VfsResult<()> {
        let mount_path = self.mounts.mount(mount_path, fs)?;
        tracing::debug!(path = %mount_path, "mounted");
        Ok(())
    }

    /// Unmount the backend at exactly `mount_path` and shut it down.
    ///
    /// Mounts nested beneath `mount_path` are left in place.
    #[tracing::instrument(skip(self))]
    pub async fn unmount(&self, mount_path: &str) -> VfsResult<()> {
        let removed = self.mounts.unmount(mount_path)?;
        tracing::debug!(path = %removed.path, backend = removed.fs.name(), "unmounted");
        if let Err(e) = removed.fs.shutdown().await {
            tracing::warn!(path = %removed.path, "backend shutdown failed: {e}");
        }
        Ok(())
    }

    /// List all mounts, sorted by path.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.mounts.list()
    }

    // ========================================================================
    // Symlink overlay
    // ========================================================================

    /// Create a symlink at `link_path` pointing at `target`.
    ///
    /// The target is stored verbatim and may be relative. Fails with
    /// `AlreadyExists` when `link_path` already names a file, directory or
    /// link, and `NotFound` when its parent directory does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn symlink(&self, target: &str, link_path: &str) -> VfsResult<()> {
        let key = self.link_key(link_path)?;
        if key == "/" {
            return Err(VfsError::already_exists(key));
        }
        if self.links.contains(&key) {
            return Err(VfsError::already_exists(key));
        }

        self.check_link_parent(&key).await?;

        match self.stat_real(&key).await {
            Ok(_) => return Err(VfsError::already_exists(key)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.links.insert(&key, target)?;
        tracing::debug!(link = %key, target, "symlink created");
        Ok(())
    }

    /// Raw, unresolved target of the link at `link_path`.
    pub fn readlink(&self, link_path: &str) -> VfsResult<String> {
        let key = self.link_key(link_path)?;
        self.links
            .get(&key)
            .ok_or_else(|| VfsError::not_found(key))
    }

    /// Snapshot of every registered link.
    pub fn list_symlinks(&self) -> Vec<SymlinkEntry> {
        self.links.list()
    }

    /// Resolve every link in `target` and return the real path.
    pub fn resolve(&self, target: &str) -> VfsResult<String> {
        self.links.resolve(target)
    }

    /// Canonical overlay key for a path: its parent fully resolved, its final
    /// component left alone.
    fn link_key(&self, target: &str) -> VfsResult<String> {
        let cleaned = path::clean(target);
        if cleaned == "/" {
            return Ok(cleaned);
        }
        let parent = self.links.resolve(path::parent(&cleaned))?;
        Ok(path::join(&parent, path::base_name(&cleaned)))
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Route an already-resolved path to its backend.
    fn route(&self, real_path: &str) -> VfsResult<(Mount, String)> {
        self.mounts
            .find_mount(real_path)
            .ok_or_else(|| VfsError::not_found(format!("no mount point for path: {real_path}")))
    }

    /// Resolve and route in one step.
    fn resolve_route(&self, target: &str) -> VfsResult<(Mount, String)> {
        let real = self.links.resolve(target)?;
        self.route(&real)
    }

    /// Synthesized directory entry for a path that only exists because
    /// mounts live beneath it.
    fn virtual_dir(&self, real_path: &str) -> Option<FileInfo> {
        if real_path == "/" || !self.mounts.child_mount_names(real_path).is_empty() {
            let name = if real_path == "/" { "/" } else { path::base_name(real_path) };
            Some(FileInfo::directory(name, 0o755).with_meta_name(MOUNTABLE_NAME))
        } else {
            None
        }
    }

    /// Stat a fully resolved path without any link overlay.
    async fn stat_real(&self, real_path: &str) -> VfsResult<FileInfo> {
        match self.mounts.find_mount(real_path) {
            Some((mount, relative)) => {
                match mount.fs.stat(&relative).await {
                    // A mount root is named after its mount point, not "/".
                    Ok(mut info) if relative == "/" && real_path != "/" => {
                        info.name = path::base_name(real_path).to_string();
                        Ok(info)
                    }
                    Err(e) if e.is_not_found() => self.virtual_dir(real_path).ok_or(e),
                    other => other,
                }
            }
            None => self
                .virtual_dir(real_path)
                .ok_or_else(|| VfsError::not_found(real_path)),
        }
    }

    /// A link may only live in an existing directory.
    async fn check_link_parent(&self, key: &str) -> VfsResult<()> {
        let parent = path::parent(key);
        let parent_info = self
            .stat_real(parent)
            .await
            .map_err(|e| if e.is_not_found() { VfsError::not_found(parent) } else { e })?;
        if !parent_info.is_dir {
            return Err(VfsError::not_a_directory(parent));
        }
        Ok(())
    }

    /// Stat a link itself: target metadata with `meta.type` forced to
    /// symlink and the link's own name.
    async fn stat_link(&self, key: &str, target: &str) -> VfsResult<FileInfo> {
        let name = path::base_name(key);
        let real = self.links.resolve(key)?;
        match self.stat_real(&real).await {
            Ok(mut info) => {
                info.name = name.to_string();
                info.mark_symlink();
                Ok(info)
            }
            Err(e) if e.is_not_found() => {
                Ok(FileInfo::symlink(name, target).with_meta_name(MOUNTABLE_NAME))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl FileSystem for MountableFs {
    fn name(&self) -> &str {
        MOUNTABLE_NAME
    }

    async fn create(&self, target: &str) -> VfsResult<()> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.create(&relative).await
    }

    async fn mkdir(&self, target: &str, mode: u32) -> VfsResult<()> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.mkdir(&relative, mode).await
    }

    async fn remove(&self, target: &str) -> VfsResult<()> {
        let key = self.link_key(target)?;
        if self.links.remove(&key).is_some() {
            tracing::debug!(link = %key, "symlink removed");
            return Ok(());
        }
        // Links inside a directory count as entries the backend can't see.
        if !self.links.children_of(&key).is_empty() {
            return Err(VfsError::directory_not_empty(key));
        }
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.remove(&relative).await
    }

    async fn remove_all(&self, target: &str) -> VfsResult<()> {
        let key = self.link_key(target)?;
        if self.links.remove(&key).is_some() {
            tracing::debug!(link = %key, "symlink removed");
            return Ok(());
        }
        let real = self.links.resolve(target)?;
        let (mount, relative) = self.route(&real)?;
        mount.fs.remove_all(&relative).await?;

        let dropped = self.links.remove_under(&real);
        if dropped > 0 {
            tracing::debug!(path = %real, dropped, "dropped symlinks under removed tree");
        }
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> VfsResult<()> {
        let from = self.link_key(old_path)?;
        let to = self.link_key(new_path)?;

        // Renaming a link moves the link itself, never its target.
        if self.links.contains(&from) {
            if from == to {
                return Ok(());
            }
            match self.stat_real(&to).await {
                Ok(info) if !self.links.contains(&to) => {
                    return Err(VfsError::already_exists(info.name));
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            self.check_link_parent(&to).await?;
            if self.links.rename(&from, &to)?.is_some() {
                tracing::debug!(link = %to, "replaced existing symlink");
            }
            tracing::debug!(from = %from, to = %to, "symlink renamed");
            return Ok(());
        }

        let (from_mount, from_relative) = self.route(&from)?;
        let (to_mount, to_relative) = self.route(&to)?;
        if from_mount.path != to_mount.path {
            return Err(VfsError::CrossDeviceLink);
        }

        from_mount.fs.rename(&from_relative, &to_relative).await?;
        // The renamed entry takes over the destination path, links included.
        if self.links.remove(&to).is_some() {
            tracing::debug!(link = %to, "symlink replaced by rename");
        }
        self.links.rename_under(&from, &to);
        Ok(())
    }

    async fn chmod(&self, target: &str, mode: u32) -> VfsResult<()> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.chmod(&relative, mode).await
    }

    async fn read(&self, target: &str, offset: u64, size: Option<u64>) -> VfsResult<Vec<u8>> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.read(&relative, offset, size).await
    }

    async fn write(
        &self,
        target: &str,
        data: &[u8],
        offset: u64,
        flags: WriteFlags,
    ) -> VfsResult<u64> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.write(&relative, data, offset, flags).await
    }

    async fn open(&self, target: &str) -> VfsResult<FileReader> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.open(&relative).await
    }

    async fn open_write(&self, target: &str) -> VfsResult<FileWriter> {
        let (mount, relative) = self.resolve_route(target)?;
        mount.fs.open_write(&relative).await
    }

    async fn read_dir(&self, target: &str) -> VfsResult<Vec<FileInfo>> {
        let real = self.links.resolve(target)?;

        let mut entries = match self.mounts.find_mount(&real) {
            Some((mount, relative)) => match mount.fs.read_dir(&relative).await {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() && self.virtual_dir(&real).is_some() => Vec::new(),
                Err(e) => return Err(e),
            },
            None if self.virtual_dir(&real).is_some() => Vec::new(),
            None => return Err(VfsError::not_found(real)),
        };

        let mut seen: BTreeSet<String> = BTreeSet::new();
        for entry in &mut entries {
            if self.links.contains(&path::join(&real, &entry.name)) {
                entry.mark_symlink();
            }
            seen.insert(entry.name.clone());
        }

        // Links the backend cannot know about.
        for (name, link_target) in self.links.children_of(&real) {
            if seen.insert(name.clone()) {
                entries.push(FileInfo::symlink(name, &link_target).with_meta_name(MOUNTABLE_NAME));
            }
        }

        // Mount points nested directly inside this directory.
        for name in self.mounts.child_mount_names(&real) {
            if seen.insert(name.clone()) {
                entries.push(FileInfo::directory(name, 0o755).with_meta_name(MOUNTABLE_NAME));
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, target: &str) -> VfsResult<FileInfo> {
        let key = self.link_key(target)?;
        if let Some(link_target) = self.links.get(&key) {
            return self.stat_link(&key, &link_target).await;
        }
        let real = self.links.resolve(target)?;
        self.stat_real(&real).await
    }

    async fn shutdown(&self) -> VfsResult<()> {
        for info in self.mounts.list() {
            let removed = match self.mounts.unmount(&info.path) {
                Ok(removed) => removed,
                Err(e) => {
                    tracing::debug!(path = %info.path, "skipping shutdown: {e}");
                    continue;
                }
            };
            if let Err(e) = removed.fs.shutdown().await {
                tracing::warn!(path = %removed.path, "backend shutdown failed: {e}");
            }
        }
        Ok(())
    }
}
