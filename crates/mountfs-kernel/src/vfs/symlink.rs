//! Symlink overlay and path resolver.
//!
//! Links live entirely in this layer, so they work on top of backends that
//! have no native symlink support. Targets are stored verbatim and only
//! interpreted at resolution time.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::error::{VfsError, VfsResult};
use super::path;

/// Maximum number of link substitutions during one resolution.
///
/// Exceeding it fails with `TooManyLinks`, which rejects cycles and overlong
/// chains alike.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// A registered link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkEntry {
    /// Canonical absolute link path.
    pub link_path: String,
    /// Raw target, absolute or relative.
    pub target: String,
}

/// Registry of overlay symlinks, keyed by canonical link path.
#[derive(Debug, Default)]
pub struct SymlinkStore {
    links: RwLock<BTreeMap<String, String>>,
}

impl SymlinkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `link_path -> target`.
    ///
    /// Only checks for a duplicate link; the caller is responsible for
    /// rejecting collisions with real files and missing parents.
    pub fn insert(&self, link_path: &str, target: &str) -> VfsResult<()> {
        let link_path = path::clean(link_path);
        let mut links = self.links.write();
        if links.contains_key(&link_path) {
            return Err(VfsError::already_exists(link_path));
        }
        links.insert(link_path, target.to_string());
        Ok(())
    }

    /// Raw target of the link at `link_path`.
    pub fn get(&self, link_path: &str) -> Option<String> {
        self.links.read().get(&path::clean(link_path)).cloned()
    }

    /// Returns true if `link_path` is a registered link.
    pub fn contains(&self, link_path: &str) -> bool {
        self.links.read().contains_key(&path::clean(link_path))
    }

    /// Remove the link at `link_path`, returning its target.
    pub fn remove(&self, link_path: &str) -> Option<String> {
        self.links.write().remove(&path::clean(link_path))
    }

    /// Drop every link strictly beneath `dir`. Returns how many were removed.
    pub fn remove_under(&self, dir: &str) -> usize {
        let dir = path::clean(dir);
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|link, _| link == &dir || !path::has_prefix(link, &dir));
        before - links.len()
    }

    /// Re-key the link at `from` to `to`, replacing any link already at `to`.
    ///
    /// Returns the target of the replaced link, if any. Renaming a link onto
    /// itself is a no-op.
    pub fn rename(&self, from: &str, to: &str) -> VfsResult<Option<String>> {
        let from = path::clean(from);
        let to = path::clean(to);
        let mut links = self.links.write();
        if !links.contains_key(&from) {
            return Err(VfsError::not_found(from));
        }
        if from == to {
            return Ok(None);
        }
        let Some(target) = links.remove(&from) else {
            return Err(VfsError::not_found(from));
        };
        Ok(links.insert(to, target))
    }

    /// Move every link strictly beneath `from` to the same place beneath `to`.
    pub fn rename_under(&self, from: &str, to: &str) -> usize {
        let from = path::clean(from);
        let to = path::clean(to);
        let mut links = self.links.write();

        let moved: Vec<String> = links
            .keys()
            .filter(|link| *link != &from && path::has_prefix(link, &from))
            .cloned()
            .collect();

        for link in &moved {
            if let Some(target) = links.remove(link) {
                let suffix = &link[from.len()..];
                links.insert(path::clean(&format!("{to}{suffix}")), target);
            }
        }
        moved.len()
    }

    /// Links registered directly inside `dir`, as `(name, target)` pairs.
    pub fn children_of(&self, dir: &str) -> Vec<(String, String)> {
        let dir = path::clean(dir);
        self.links
            .read()
            .iter()
            .filter(|(link, _)| *link != "/" && path::parent(link) == dir)
            .map(|(link, target)| (path::base_name(link).to_string(), target.clone()))
            .collect()
    }

    /// Snapshot of every link, sorted by link path.
    pub fn list(&self) -> Vec<SymlinkEntry> {
        self.links
            .read()
            .iter()
            .map(|(link, target)| SymlinkEntry {
                link_path: link.clone(),
                target: target.clone(),
            })
            .collect()
    }

    /// Number of registered links.
    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    /// Returns true if no links are registered.
    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }

    /// Resolve every link in `target` and return the real path.
    ///
    /// Prefixes are checked shortest first; the first one naming a link is
    /// substituted (absolute targets replace it, relative targets are joined
    /// against the link's parent) and the remainder of the path re-appended.
    /// Each substitution is one hop; more than [`MAX_SYMLINK_HOPS`] fails.
    pub fn resolve(&self, target: &str) -> VfsResult<String> {
        let original = path::clean(target);
        let links = self.links.read();
        if links.is_empty() {
            return Ok(original);
        }

        let mut current = original.clone();
        let mut hops = 0;

        loop {
            let hit = path::prefixes(&current)
                .find_map(|prefix| links.get(prefix).map(|t| (prefix.len(), t)));

            let Some((prefix_len, link_target)) = hit else {
                return Ok(current);
            };

            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return Err(VfsError::too_many_links(original));
            }

            let link_path = &current[..prefix_len];
            let base = if link_target.starts_with(path::SEPARATOR) {
                path::clean(link_target)
            } else {
                path::join(path::parent(link_path), link_target)
            };
            let suffix = &current[prefix_len..];
            let next = path::clean(&format!("{base}{suffix}"));

            tracing::trace!(from = %current, to = %next, hops, "symlink hop");
            current = next;
        }
    }
}
