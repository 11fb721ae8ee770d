//! Local filesystem layer.
//!
//! Read-only view of a real directory tree. Every path is confined to the
//! layer's root.

use super::traits::{DirEntry, EntryKind, Layer, LayerFile, Metadata};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Local filesystem layer.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/overlay`, then `read("etc/conf")` reads `/srv/overlay/etc/conf`.
#[derive(Debug, Clone)]
pub struct LocalLayer {
    root: PathBuf,
}

impl LocalLayer {
    /// Create a layer rooted at the given directory.
    ///
    /// The root is not checked here; a missing root simply makes every
    /// lookup fail, which the composed filesystem treats as an absent layer.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..` or a symlink).
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        // Strip leading slash if present
        let path = path.strip_prefix("/").unwrap_or(path);

        // Canonicalize to resolve symlinks and ..; missing paths fail here
        let canonical = self.root.join(path).canonicalize()?;

        // Verify we haven't escaped the root
        let canonical_root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        if !canonical.starts_with(&canonical_root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "path escapes root: {} is not under {}",
                    canonical.display(),
                    canonical_root.display()
                ),
            ));
        }

        Ok(canonical)
    }

    /// Extract permissions from std::fs::Metadata (unix only).
    #[cfg(unix)]
    fn extract_permissions(meta: &std::fs::Metadata) -> Option<u32> {
        use std::os::unix::fs::PermissionsExt;
        Some(meta.permissions().mode())
    }

    #[cfg(not(unix))]
    fn extract_permissions(_meta: &std::fs::Metadata) -> Option<u32> {
        None
    }

    fn metadata_for(path: &Path, meta: &std::fs::Metadata) -> Metadata {
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            // Sockets, pipes and devices are reported as files.
            EntryKind::File
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());

        Metadata {
            name,
            kind,
            size: meta.len(),
            modified: meta.modified().ok(),
            permissions: Self::extract_permissions(meta),
        }
    }

    async fn list_resolved(full_path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(entry) = Self::entry_for(&entry.path(), name).await? {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Describe one listed entry. `None` if it was removed after being listed.
    async fn entry_for(path: &Path, name: String) -> io::Result<Option<DirEntry>> {
        // symlink_metadata so links are reported, not followed
        let metadata = match fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let file_type = metadata.file_type();

        let entry = if file_type.is_symlink() {
            match fs::read_link(path).await {
                Ok(target) => DirEntry::symlink(name, target),
                Err(_) => DirEntry {
                    name,
                    kind: EntryKind::Symlink,
                    size: 0,
                    symlink_target: None,
                },
            }
        } else if file_type.is_dir() {
            DirEntry::directory(name)
        } else {
            DirEntry::file(name, metadata.len())
        };
        Ok(Some(entry))
    }
}

/// Open handle into a [`LocalLayer`].
///
/// Directories are not opened at the OS level (not every platform allows
/// it); their handle only remembers the resolved path.
#[derive(Debug)]
pub struct LocalFile {
    /// Path as requested, for naming and error messages.
    path: PathBuf,
    /// Resolved absolute path.
    full_path: PathBuf,
    file: Option<fs::File>,
    is_dir: bool,
}

#[async_trait]
impl LayerFile for LocalFile {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf).await,
            None if self.is_dir => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", self.path.display()),
            )),
            None => Err(io::Error::other(format!(
                "file already closed: {}",
                self.path.display()
            ))),
        }
    }

    async fn stat(&self) -> io::Result<Metadata> {
        let meta = match &self.file {
            Some(file) => file.metadata().await?,
            None => fs::metadata(&self.full_path).await?,
        };
        Ok(LocalLayer::metadata_for(&self.path, &meta))
    }

    async fn read_dir(&mut self) -> io::Result<Vec<DirEntry>> {
        if !self.is_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", self.path.display()),
            ));
        }
        LocalLayer::list_resolved(&self.full_path).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }
}

#[async_trait]
impl Layer for LocalLayer {
    async fn open<'a>(&'a self, path: &Path) -> io::Result<Box<dyn LayerFile + 'a>> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await?;
        let file = if meta.is_dir() {
            None
        } else {
            Some(fs::File::open(&full_path).await?)
        };
        Ok(Box::new(LocalFile {
            path: path.to_path_buf(),
            full_path,
            file,
            is_dir: meta.is_dir(),
        }))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path).await
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let full_path = self.resolve(path)?;
        Self::list_resolved(&full_path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let full_path = self.resolve(path)?;
        // stat follows symlinks
        let meta = fs::metadata(&full_path).await?;
        Ok(Self::metadata_for(path, &meta))
    }
}
