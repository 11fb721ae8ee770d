//! The composed filesystem.
//!
//! `LayeredFs` holds an ordered list of layers, highest priority first:
//!
//! ```text
//! overlay   etc/conf ──────────────┐
//! plugins   etc/plugin.d/x         │  read_file("etc/conf") → overlay
//! base      etc/conf  etc/other    │  read_dir("etc")       → conf (overlay),
//!                                  ┘                          plugin.d (plugins),
//!                                                             other (base)
//! ```
//!
//! `open`, `read_file` and `stat` return the answer from the first layer that
//! has the path. `read_dir` lists every layer and merges the results by name,
//! keeping the entry from the highest-priority layer. A layer failing an
//! operation is never an error by itself; only when every layer fails does
//! the caller see a [`LayeredError`].

mod error;
mod handle;
mod info;

pub use error::{LayeredError, Op, Result};
pub use handle::{DirFile, File, OpenFile};
pub use info::{FileInfo, LayerDirEntry, Origin};

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::vfs::{DirEntry, Layer, LayerFile, Metadata};

/// Read-only union of filesystem layers.
///
/// Immutable once built; every call re-walks the layers, so there is no
/// cached state to go stale when a layer's contents change.
pub struct LayeredFs {
    layers: Vec<Arc<dyn Layer>>,
}

impl LayeredFs {
    /// Compose `layers`, highest priority first.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Layer>>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn builder() -> LayeredFsBuilder {
        LayeredFsBuilder::default()
    }

    /// The layers in priority order.
    pub fn layers(&self) -> &[Arc<dyn Layer>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Open a path in the first layer that has it.
    ///
    /// Directories come back as [`OpenFile::Dir`], whose `read_dir` lists the
    /// merged directory rather than the origin layer's copy.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<OpenFile<'_>> {
        let path = path.as_ref();
        for (index, layer) in self.layers.iter().enumerate() {
            let inner = match layer.open(path).await {
                Ok(inner) => inner,
                Err(e) => {
                    tracing::trace!("layer {} cannot open {}: {}", index, path.display(), e);
                    continue;
                }
            };

            // The layer has the path; a handle it cannot stat is its problem,
            // not a reason to fall through to a lower layer.
            let info = inner.stat().await.map_err(|source| LayeredError::OpenFailed {
                path: path.to_path_buf(),
                source: Some(source),
            })?;

            tracing::debug!("open {} answered by layer {}", path.display(), index);
            let file = File::new(inner, Origin::new(index, layer.as_ref()));
            return Ok(if info.is_dir() {
                OpenFile::Dir(DirFile::new(file, self, path))
            } else {
                OpenFile::File(file)
            });
        }

        tracing::debug!("open {}: not found in any layer", path.display());
        Err(LayeredError::open(path))
    }

    /// Read a whole file from the first layer that has it.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.read(path).await {
                Ok(data) => {
                    tracing::debug!("read {} answered by layer {}", path.display(), index);
                    return Ok(data);
                }
                Err(e) => {
                    tracing::trace!("layer {} cannot read {}: {}", index, path.display(), e);
                }
            }
        }

        tracing::debug!("read {}: not found in any layer", path.display());
        Err(LayeredError::read_file(path))
    }

    /// List a directory across every layer.
    ///
    /// Entries appear in layer priority order, then in each layer's own
    /// listing order. A name already seen in a higher-priority layer is
    /// skipped. Succeeds as long as one layer could list the directory.
    pub async fn read_dir(&self, path: impl AsRef<Path>) -> Result<Vec<LayerDirEntry<'_>>> {
        let path = path.as_ref();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut failed = 0;

        for (index, layer) in self.layers.iter().enumerate() {
            let listing = match layer.list(path).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::trace!("layer {} cannot list {}: {}", index, path.display(), e);
                    failed += 1;
                    continue;
                }
            };

            let origin = Origin::new(index, layer.as_ref());
            for entry in listing {
                if seen.contains(&entry.name) {
                    continue;
                }
                seen.insert(entry.name.clone());
                entries.push(LayerDirEntry::new(entry, origin));
            }
        }

        if failed == self.layers.len() {
            tracing::debug!("read_dir {}: no layer could list it", path.display());
            return Err(LayeredError::read_dir(path));
        }

        Ok(entries)
    }

    /// Stat a path in the first layer that has it.
    pub async fn stat(&self, path: impl AsRef<Path>) -> Result<FileInfo<'_>> {
        let path = path.as_ref();
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.stat(path).await {
                Ok(info) => {
                    tracing::debug!("stat {} answered by layer {}", path.display(), index);
                    return Ok(FileInfo::new(info, Origin::new(index, layer.as_ref())));
                }
                Err(e) => {
                    tracing::trace!("layer {} cannot stat {}: {}", index, path.display(), e);
                }
            }
        }

        tracing::debug!("stat {}: not found in any layer", path.display());
        Err(LayeredError::stat(path))
    }
}

impl fmt::Debug for LayeredFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredFs")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Chained construction for [`LayeredFs`].
#[derive(Default)]
pub struct LayeredFsBuilder {
    layers: Vec<Arc<dyn Layer>>,
}

impl LayeredFsBuilder {
    /// Add a layer below every layer added so far.
    pub fn layer(mut self, layer: impl Layer + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Add an already-shared layer below every layer added so far.
    pub fn shared(mut self, layer: Arc<dyn Layer>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn build(self) -> LayeredFs {
        LayeredFs {
            layers: self.layers,
        }
    }
}

#[async_trait]
impl Layer for LayeredFs {
    async fn open<'a>(&'a self, path: &Path) -> io::Result<Box<dyn LayerFile + 'a>> {
        Ok(Box::new(LayeredFs::open(self, path).await?))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        Ok(self.read_file(path).await?)
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        Ok(self
            .read_dir(path)
            .await?
            .into_iter()
            .map(LayerDirEntry::into_inner)
            .collect())
    }

    async fn stat(&self, path: &Path) -> io::Result<Metadata> {
        Ok(LayeredFs::stat(self, path).await?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryLayer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Layer that fails everything and counts how often it was asked.
    #[derive(Default)]
    struct Refusing {
        calls: AtomicUsize,
    }

    impl Refusing {
        fn refuse(&self) -> io::Error {
            self.calls.fetch_add(1, Ordering::SeqCst);
            io::Error::new(io::ErrorKind::PermissionDenied, "refused")
        }
    }

    #[async_trait]
    impl Layer for Refusing {
        async fn open<'a>(&'a self, _path: &Path) -> io::Result<Box<dyn LayerFile + 'a>> {
            Err(self.refuse())
        }

        async fn list(&self, _path: &Path) -> io::Result<Vec<DirEntry>> {
            Err(self.refuse())
        }
    }

    /// Layer whose handles open fine but cannot be stat'ed.
    struct Unstatable;

    struct UnstatableFile;

    #[async_trait]
    impl LayerFile for UnstatableFile {
        async fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        async fn stat(&self) -> io::Result<Metadata> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "no stat for you"))
        }
    }

    #[async_trait]
    impl Layer for Unstatable {
        async fn open<'a>(&'a self, _path: &Path) -> io::Result<Box<dyn LayerFile + 'a>> {
            Ok(Box::new(UnstatableFile))
        }
    }

    fn overlay_and_base() -> (Arc<dyn Layer>, Arc<dyn Layer>, LayeredFs) {
        let overlay: Arc<dyn Layer> = Arc::new(MemoryLayer::new().with_file("/etc/conf", "A"));
        let base: Arc<dyn Layer> = Arc::new(
            MemoryLayer::new()
                .with_file("/etc/conf", "B")
                .with_file("/etc/other", "C"),
        );
        let fs = LayeredFs::new([overlay.clone(), base.clone()]);
        (overlay, base, fs)
    }

    #[tokio::test]
    async fn test_read_file_first_layer_wins() {
        let (_, _, fs) = overlay_and_base();
        assert_eq!(fs.read_file("/etc/conf").await.unwrap(), b"A");
        assert_eq!(fs.read_file("/etc/other").await.unwrap(), b"C");
    }

    #[tokio::test]
    async fn test_read_dir_merges_with_origin() {
        let (overlay, base, fs) = overlay_and_base();
        let entries = fs.read_dir("/etc").await.unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["conf", "other"]);
        assert!(entries[0].origin().is(&overlay));
        assert!(entries[1].origin().is(&base));
    }

    #[tokio::test]
    async fn test_missing_path_errors() {
        let (_, _, fs) = overlay_and_base();

        let err = fs.read_file("/missing").await.unwrap_err();
        assert!(matches!(&err, LayeredError::ReadFileFailed { path } if path == Path::new("/missing")));

        let err = fs.open("/missing").await.unwrap_err();
        assert_eq!(err.op(), Op::Open);

        let err = fs.stat("/missing").await.unwrap_err();
        assert_eq!(err.op(), Op::Stat);

        let err = fs.read_dir("/missing").await.unwrap_err();
        assert_eq!(err.op(), Op::ReadDir);
        assert_eq!(err.path(), Path::new("/missing"));
    }

    #[tokio::test]
    async fn test_stat_reports_origin() {
        let (_, base, fs) = overlay_and_base();
        let info = fs.stat("/etc/other").await.unwrap();
        assert!(info.is_file());
        assert_eq!(info.size, 1);
        assert_eq!(info.origin().index(), 1);
        assert!(info.origin().is(&base));
    }

    #[tokio::test]
    async fn test_open_file_and_dir() {
        let (overlay, _, fs) = overlay_and_base();

        let mut file = fs.open("/etc/conf").await.unwrap();
        assert!(!file.is_dir());
        assert!(file.origin().is(&overlay));
        assert_eq!(file.read_to_end().await.unwrap(), b"A");
        file.close().await.unwrap();

        let dir = fs.open("/etc").await.unwrap();
        assert!(dir.is_dir());
        // Opened from the overlay, which only has `conf`
        assert!(dir.origin().is(&overlay));
        let dir = dir.into_dir().unwrap();
        assert_eq!(dir.path(), Path::new("/etc"));

        let via_handle = dir.read_dir().await.unwrap();
        let via_path = fs.read_dir("/etc").await.unwrap();
        assert_eq!(via_handle, via_path);
        assert_eq!(via_handle.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_layers_are_skipped() {
        let refusing = Arc::new(Refusing::default());
        let fs = LayeredFs::builder()
            .shared(refusing.clone())
            .layer(MemoryLayer::new().with_file("dir/f", "data"))
            .build();

        assert_eq!(fs.read_file("dir/f").await.unwrap(), b"data");
        assert!(fs.stat("dir/f").await.is_ok());
        assert!(fs.open("dir/f").await.is_ok());
        assert_eq!(fs.read_dir("dir").await.unwrap().len(), 1);

        // read, stat, open and list each went to the refusing layer once
        assert_eq!(refusing.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_later_layers_not_consulted_after_success() {
        let refusing = Arc::new(Refusing::default());
        let fs = LayeredFs::builder()
            .layer(MemoryLayer::new().with_file("f", "top"))
            .shared(refusing.clone())
            .build();

        fs.read_file("f").await.unwrap();
        fs.stat("f").await.unwrap();
        fs.open("f").await.unwrap();
        assert_eq!(refusing.calls.load(Ordering::SeqCst), 0);

        // read_dir always visits every layer
        fs.read_dir("").await.unwrap();
        assert_eq!(refusing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_dir_all_layers_fail() {
        let fs = LayeredFs::builder()
            .layer(Refusing::default())
            .layer(Refusing::default())
            .build();
        let err = fs.read_dir("anything").await.unwrap_err();
        assert_eq!(err.op(), Op::ReadDir);
    }

    #[tokio::test]
    async fn test_read_dir_empty_listing_is_success() {
        let fs = LayeredFs::builder()
            .layer(MemoryLayer::new().with_dir("empty"))
            .layer(Refusing::default())
            .build();
        let entries = fs.read_dir("empty").await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_no_layers() {
        let fs = LayeredFs::new(Vec::new());
        assert!(fs.is_empty());
        assert!(fs.read_file("x").await.is_err());
        assert!(fs.read_dir("").await.is_err());
    }

    #[tokio::test]
    async fn test_unstatable_handle_stops_open() {
        let fs = LayeredFs::builder()
            .layer(Unstatable)
            .layer(MemoryLayer::new().with_file("f", "lower"))
            .build();

        let err = fs.open("f").await.unwrap_err();
        assert_eq!(err.op(), Op::Open);
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_nested_layered_fs() {
        let inner = LayeredFs::builder()
            .layer(MemoryLayer::new().with_file("d/a", "inner-a"))
            .layer(MemoryLayer::new().with_file("d/b", "inner-b"))
            .build();
        let outer = LayeredFs::builder()
            .layer(MemoryLayer::new().with_file("d/c", "outer-c"))
            .layer(inner)
            .build();

        assert_eq!(outer.read_file("d/b").await.unwrap(), b"inner-b");

        let names: Vec<_> = outer
            .read_dir("d")
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name.clone(), e.origin().index()))
            .collect();
        assert_eq!(
            names,
            [
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 1),
            ]
        );

        let missing = outer.stat("d/zz").await.unwrap_err();
        assert_eq!(missing.op(), Op::Stat);
    }

    #[tokio::test]
    async fn test_nested_handle_lists_inner_merge() {
        let inner = LayeredFs::builder()
            .layer(MemoryLayer::new().with_file("d/a", "inner-a"))
            .layer(MemoryLayer::new().with_file("d/b", "inner-b").with_file("d/a", "shadowed"))
            .build();

        let mut dir = Layer::open(&inner, Path::new("d")).await.unwrap();
        assert!(dir.stat().await.unwrap().is_dir());
        let names: Vec<_> = dir.read_dir().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a", "b"]);
        dir.close().await.unwrap();

        let mut file = Layer::open(&inner, Path::new("d/a")).await.unwrap();
        assert_eq!(file.stat().await.unwrap().size, 7);
        assert_eq!(file.read_to_end().await.unwrap(), b"inner-a");
        let err = file.read_dir().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotADirectory);
        file.close().await.unwrap();
    }
}
