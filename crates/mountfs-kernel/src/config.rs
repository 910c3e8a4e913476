//! RON configuration for rebuilding a namespace at startup.
//!
//! Layer state is not persisted, so a host describes its mounts and links in
//! a config file and replays it on boot:
//!
//! ```ron
//! (
//!     mounts: [
//!         (path: "/scratch", backend: Memory(name: None)),
//!         (path: "/src", backend: Local(root: "~/src", read_only: true)),
//!     ],
//!     symlinks: [
//!         (target: "/src/mountfs", link: "/scratch/project"),
//!     ],
//! )
//! ```
//!
//! Mounts are applied before links, each in document order.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vfs::{FileSystem, LocalBackend, MemoryBackend, MountableFs, VfsError};

/// Errors raised while loading or replaying a config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("replay failed: {0}")]
    Vfs(#[from] VfsError),
}

/// Full namespace description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
    #[serde(default)]
    pub symlinks: Vec<SymlinkSpec>,
}

/// One mount point and the backend to put there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub path: String,
    pub backend: BackendConfig,
}

/// Backends that can be built from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendConfig {
    /// Ephemeral in-memory tree.
    Memory {
        #[serde(default)]
        name: Option<String>,
    },
    /// Host directory. `~` in `root` is expanded.
    Local {
        root: String,
        #[serde(default)]
        read_only: bool,
    },
}

impl BackendConfig {
    /// Instantiate the backend.
    pub fn build(&self) -> Arc<dyn FileSystem> {
        match self {
            BackendConfig::Memory { name: Some(name) } => Arc::new(MemoryBackend::named(name)),
            BackendConfig::Memory { name: None } => Arc::new(MemoryBackend::new()),
            BackendConfig::Local { root, read_only } => {
                let root: PathBuf = shellexpand::tilde(root).as_ref().into();
                if *read_only {
                    Arc::new(LocalBackend::read_only(root))
                } else {
                    Arc::new(LocalBackend::new(root))
                }
            }
        }
    }
}

/// A link to create after all mounts are in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkSpec {
    pub target: String,
    pub link: String,
}

impl MountConfig {
    /// Parse a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_ron_str(&text)
    }
}

impl MountableFs {
    /// Build a namespace by replaying `config`.
    ///
    /// Stops at the first mount or link that fails.
    pub async fn from_config(config: &MountConfig) -> Result<Self, ConfigError> {
        let fs = MountableFs::new();
        for spec in &config.mounts {
            fs.mount(&spec.path, spec.backend.build())?;
        }
        for link in &config.symlinks {
            fs.symlink(&link.target, &link.link).await?;
        }
        tracing::info!(
            mounts = config.mounts.len(),
            symlinks = config.symlinks.len(),
            "namespace rebuilt from config"
        );
        Ok(fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        (
            mounts: [
                (path: "/scratch", backend: Memory(name: Some("scratch"))),
                (path: "/data", backend: Memory(name: None)),
            ],
            symlinks: [
                (target: "/data", link: "/scratch/data"),
            ],
        )
    "#;

    #[test]
    fn test_parse() {
        let config = MountConfig::from_ron_str(SAMPLE).unwrap();
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(
            config.mounts[0].backend,
            BackendConfig::Memory {
                name: Some("scratch".into())
            }
        );
        assert_eq!(
            config.symlinks,
            vec![SymlinkSpec {
                target: "/data".into(),
                link: "/scratch/data".into(),
            }]
        );
    }

    #[test]
    fn test_symlinks_optional() {
        let config = MountConfig::from_ron_str(
            r#"(mounts: [(path: "/src", backend: Local(root: "/tmp"))])"#,
        )
        .unwrap();
        assert!(config.symlinks.is_empty());
        assert_eq!(
            config.mounts[0].backend,
            BackendConfig::Local {
                root: "/tmp".into(),
                read_only: false
            }
        );
    }

    #[test]
    fn test_parse_error() {
        let err = MountConfig::from_ron_str("(mounts: [").unwrap_err();
        assert!(matches!(err, ConfigError::Ron(_)));
    }

    #[tokio::test]
    async fn test_replay() {
        let config = MountConfig::from_ron_str(SAMPLE).unwrap();
        let fs = MountableFs::from_config(&config).await.unwrap();

        let mounts = fs.list_mounts();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[1].backend, "scratch");

        fs.write_all("/data/hello.txt", b"hi").await.unwrap();
        assert_eq!(fs.read_all("/scratch/data/hello.txt").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_replay_stops_on_conflict() {
        let config = MountConfig {
            mounts: vec![
                MountSpec {
                    path: "/a".into(),
                    backend: BackendConfig::Memory { name: None },
                },
                MountSpec {
                    path: "/a/".into(),
                    backend: BackendConfig::Memory { name: None },
                },
            ],
            symlinks: Vec::new(),
        };
        let err = MountableFs::from_config(&config).await.unwrap_err();
        assert!(matches!(err, ConfigError::Vfs(VfsError::AlreadyMounted(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MountConfig::load(dir.path().join("absent.ron")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
