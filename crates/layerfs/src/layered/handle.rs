//! Open handles returned by [`LayeredFs::open`].

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

use super::error::Result;
use super::info::{FileInfo, LayerDirEntry, Origin};
use super::LayeredFs;
use crate::vfs::{DirEntry, LayerFile, Metadata};

/// A layer's native handle plus the layer that produced it.
pub struct File<'a> {
    inner: Box<dyn LayerFile + 'a>,
    origin: Origin<'a>,
}

impl<'a> File<'a> {
    pub(crate) fn new(inner: Box<dyn LayerFile + 'a>, origin: Origin<'a>) -> Self {
        Self { inner, origin }
    }

    pub fn origin(&self) -> Origin<'a> {
        self.origin
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).await
    }

    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        self.inner.read_to_end().await
    }

    pub async fn stat(&self) -> io::Result<FileInfo<'a>> {
        let info = self.inner.stat().await?;
        Ok(FileInfo::new(info, self.origin))
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.inner.close().await
    }
}

impl std::fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File").field("origin", &self.origin).finish()
    }
}

/// A directory handle.
///
/// Listing goes back through the composed filesystem, so it always returns
/// the merge of every layer rather than just the one that was opened.
#[derive(Debug)]
pub struct DirFile<'a> {
    file: File<'a>,
    fs: &'a LayeredFs,
    path: PathBuf,
}

impl<'a> DirFile<'a> {
    pub(crate) fn new(file: File<'a>, fs: &'a LayeredFs, path: &Path) -> Self {
        Self {
            file,
            fs,
            path: path.to_path_buf(),
        }
    }

    /// The path this directory was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> Origin<'a> {
        self.file.origin()
    }

    /// Merged listing of this directory across every layer.
    pub async fn read_dir(&self) -> Result<Vec<LayerDirEntry<'a>>> {
        self.fs.read_dir(&self.path).await
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf).await
    }

    pub async fn stat(&self) -> io::Result<FileInfo<'a>> {
        self.file.stat().await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.file.close().await
    }
}

/// Result of [`LayeredFs::open`]: a plain file or a directory.
#[derive(Debug)]
pub enum OpenFile<'a> {
    File(File<'a>),
    Dir(DirFile<'a>),
}

impl<'a> OpenFile<'a> {
    pub fn is_dir(&self) -> bool {
        matches!(self, OpenFile::Dir(_))
    }

    pub fn origin(&self) -> Origin<'a> {
        self.file().origin()
    }

    pub fn as_dir(&self) -> Option<&DirFile<'a>> {
        match self {
            OpenFile::Dir(dir) => Some(dir),
            OpenFile::File(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<DirFile<'a>> {
        match self {
            OpenFile::Dir(dir) => Some(dir),
            OpenFile::File(_) => None,
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file_mut().read(buf).await
    }

    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        self.file_mut().read_to_end().await
    }

    pub async fn stat(&self) -> io::Result<FileInfo<'a>> {
        self.file().stat().await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.file_mut().close().await
    }

    fn file(&self) -> &File<'a> {
        match self {
            OpenFile::File(file) => file,
            OpenFile::Dir(dir) => &dir.file,
        }
    }

    fn file_mut(&mut self) -> &mut File<'a> {
        match self {
            OpenFile::File(file) => file,
            OpenFile::Dir(dir) => &mut dir.file,
        }
    }
}

// Lets a LayeredFs serve as a layer of another LayeredFs.
#[async_trait]
impl<'a> LayerFile for OpenFile<'a> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        OpenFile::read(self, buf).await
    }

    async fn stat(&self) -> io::Result<Metadata> {
        Ok(OpenFile::stat(self).await?.into_inner())
    }

    async fn read_dir(&mut self) -> io::Result<Vec<DirEntry>> {
        match self {
            OpenFile::Dir(dir) => Ok(dir
                .read_dir()
                .await?
                .into_iter()
                .map(LayerDirEntry::into_inner)
                .collect()),
            OpenFile::File(_) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                "not a directory",
            )),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        OpenFile::close(self).await
    }
}
