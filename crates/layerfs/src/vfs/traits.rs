//! Core layer traits and types.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Metadata for a single path, as reported by a layer's `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Base name of the path (`/` for the root).
    pub name: String,
    /// Kind of entry.
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time, if available.
    pub modified: Option<SystemTime>,
    /// Unix permissions (e.g., 0o644), if available.
    pub permissions: Option<u32>,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// A single entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry (not full path).
    pub name: String,
    /// Kind of entry.
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// For symlinks, the target path.
    pub symlink_target: Option<PathBuf>,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            symlink_target: None,
        }
    }

    /// Create a new file entry.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            symlink_target: None,
        }
    }

    /// Create a new symlink entry.
    pub fn symlink(name: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Symlink,
            size: 0,
            symlink_target: Some(target.into()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// An open handle produced by [`Layer::open`].
///
/// Handles may borrow from the layer that produced them. Dropping a handle
/// releases it; `close` exists for layers that want to report errors on
/// release.
#[async_trait]
pub trait LayerFile: Send + Sync {
    /// Read up to `buf.len()` bytes. Returns 0 at end of file.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Metadata for the opened path.
    async fn stat(&self) -> io::Result<Metadata>;

    /// List the directory this handle refers to.
    async fn read_dir(&mut self) -> io::Result<Vec<DirEntry>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "directory listing not supported by this handle",
        ))
    }

    /// Release the handle.
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Read everything from the current position to end of file.
    async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match self.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(data)
    }
}

/// A read-only filesystem layer.
///
/// Paths are relative to the layer's root; a leading `/` is accepted and
/// means the same thing. Only `open` is required: `read`, `list` and `stat`
/// fall back to opening the path and working through the handle, so a layer
/// overrides them only when it has a cheaper direct route.
#[async_trait]
pub trait Layer: Send + Sync {
    /// Open a file or directory.
    async fn open<'a>(&'a self, path: &Path) -> io::Result<Box<dyn LayerFile + 'a>>;

    /// Read the entire contents of a file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut file = self.open(path).await?;
        let data = file.read_to_end().await?;
        file.close().await?;
        Ok(data)
    }

    /// List entries in a directory, sorted by name.
    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut dir = self.open(path).await?;
        let mut entries = dir.read_dir().await?;
        dir.close().await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Get metadata for a file or directory.
    async fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let mut file = self.open(path).await?;
        let meta = file.stat().await?;
        file.close().await?;
        Ok(meta)
    }
}
