//! Reference backends.
//!
//! Both implement [`FileSystem`](super::FileSystem) and can be mounted
//! anywhere in a [`MountableFs`](super::MountableFs).

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
