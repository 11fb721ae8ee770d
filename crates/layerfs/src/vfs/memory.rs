//! In-memory layer.
//!
//! Used for override layers built at runtime and for testing. The tree is
//! populated through `&mut self` before the layer is shared; once it sits
//! behind an `Arc` it is read-only like every other layer.

use super::traits::{DirEntry, EntryKind, Layer, LayerFile, Metadata};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Node in the memory tree.
#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, modified: SystemTime },
    Directory { modified: SystemTime },
}

impl Node {
    fn directory() -> Self {
        Node::Directory {
            modified: SystemTime::now(),
        }
    }

    fn metadata(&self, name: String) -> Metadata {
        match self {
            Node::File { data, modified } => Metadata {
                name,
                kind: EntryKind::File,
                size: data.len() as u64,
                modified: Some(*modified),
                permissions: None,
            },
            Node::Directory { modified } => Metadata {
                name,
                kind: EntryKind::Directory,
                size: 0,
                modified: Some(*modified),
                permissions: None,
            },
        }
    }
}

/// In-memory layer.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    nodes: BTreeMap<PathBuf, Node>,
}

impl Default for MemoryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLayer {
    /// Create a new layer containing only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::new(), Node::directory());
        Self { nodes }
    }

    /// Builder form of [`MemoryLayer::add_file`].
    ///
    /// On a conflict the existing node is kept and a warning is logged.
    pub fn with_file(mut self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Self {
        let path = path.as_ref();
        if let Err(e) = self.add_file(path, data) {
            tracing::warn!("memory layer: could not add file {}: {}", path.display(), e);
        }
        self
    }

    /// Builder form of [`MemoryLayer::add_dir`].
    ///
    /// On a conflict the existing node is kept and a warning is logged.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Err(e) = self.add_dir(path) {
            tracing::warn!("memory layer: could not add directory {}: {}", path.display(), e);
        }
        self
    }

    /// Add (or replace) a file, creating parent directories as needed.
    pub fn add_file(&mut self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> io::Result<()> {
        let path = path.as_ref();
        let normalized = Self::normalize(path);
        if let Some(Node::Directory { .. }) = self.nodes.get(&normalized) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            ));
        }
        self.ensure_parents(&normalized)?;
        self.nodes.insert(
            normalized,
            Node::File {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    /// Add a directory (and parent directories if needed).
    pub fn add_dir(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let normalized = Self::normalize(path);
        match self.nodes.get(&normalized) {
            Some(Node::Directory { .. }) => return Ok(()),
            Some(Node::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("file exists: {}", path.display()),
                ));
            }
            None => {}
        }
        self.ensure_parents(&normalized)?;
        self.nodes.insert(normalized, Node::directory());
        Ok(())
    }

    /// Normalize a path: remove leading `/`, resolve `.` and `..`.
    fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    result.pop();
                }
                Component::Normal(s) => result.push(s),
            }
        }
        result
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(&mut self, path: &Path) -> io::Result<()> {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let Component::Normal(s) = component {
                current.push(s);
                match self.nodes.get(&current) {
                    Some(Node::Directory { .. }) => {}
                    Some(Node::File { .. }) => {
                        return Err(io::Error::new(
                            io::ErrorKind::NotADirectory,
                            format!("not a directory: {}", current.display()),
                        ));
                    }
                    None => {
                        self.nodes.insert(current.clone(), Node::directory());
                    }
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, path: &Path) -> io::Result<(PathBuf, &Node)> {
        let normalized = Self::normalize(path);
        match self.nodes.get(&normalized) {
            Some(node) => Ok((normalized, node)),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not found: {}", path.display()),
            )),
        }
    }

    fn name_of(normalized: &Path) -> String {
        normalized
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Direct children of an already-normalized directory path.
    fn children(&self, dir: &Path) -> Vec<DirEntry> {
        let mut result: Vec<DirEntry> = self
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(dir))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some(match node {
                    Node::File { data, .. } => DirEntry::file(name, data.len() as u64),
                    Node::Directory { .. } => DirEntry::directory(name),
                })
            })
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }
}

/// Open handle into a [`MemoryLayer`]. Borrows the file contents directly.
#[derive(Debug)]
pub struct MemoryFile<'a> {
    layer: &'a MemoryLayer,
    path: PathBuf,
    node: &'a Node,
    pos: usize,
}

#[async_trait]
impl<'a> LayerFile for MemoryFile<'a> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.node {
            Node::File { data, .. } => {
                let remaining = data.get(self.pos..).unwrap_or_default();
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.pos += n;
                Ok(n)
            }
            Node::Directory { .. } => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", self.path.display()),
            )),
        }
    }

    async fn stat(&self) -> io::Result<Metadata> {
        Ok(self.node.metadata(MemoryLayer::name_of(&self.path)))
    }

    async fn read_dir(&mut self) -> io::Result<Vec<DirEntry>> {
        match self.node {
            Node::Directory { .. } => Ok(self.layer.children(&self.path)),
            Node::File { .. } => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", self.path.display()),
            )),
        }
    }
}

#[async_trait]
impl Layer for MemoryLayer {
    async fn open<'a>(&'a self, path: &Path) -> io::Result<Box<dyn LayerFile + 'a>> {
        let (normalized, node) = self.lookup(path)?;
        Ok(Box::new(MemoryFile {
            layer: self,
            path: normalized,
            node,
            pos: 0,
        }))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lookup(path)? {
            (_, Node::File { data, .. }) => Ok(data.clone()),
            (_, Node::Directory { .. }) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
        }
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        match self.lookup(path)? {
            (normalized, Node::Directory { .. }) => Ok(self.children(&normalized)),
            (_, Node::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", path.display()),
            )),
        }
    }

    async fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let (normalized, node) = self.lookup(path)?;
        Ok(node.metadata(Self::name_of(&normalized)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_read() {
        let layer = MemoryLayer::new().with_file("test.txt", "hello world");
        let data = layer.read(Path::new("test.txt")).await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let layer = MemoryLayer::new();
        let result = layer.read(Path::new("nonexistent.txt")).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_nested_directories() {
        let layer = MemoryLayer::new().with_file("a/b/c/file.txt", "nested");

        for dir in ["a", "a/b", "a/b/c"] {
            let meta = layer.stat(Path::new(dir)).await.unwrap();
            assert!(meta.is_dir(), "{dir} should be a directory");
        }

        let data = layer.read(Path::new("a/b/c/file.txt")).await.unwrap();
        assert_eq!(data, b"nested");
    }

    #[tokio::test]
    async fn test_list_directory_sorted() {
        let layer = MemoryLayer::new()
            .with_file("b.txt", "b")
            .with_dir("subdir")
            .with_file("a.txt", "a")
            .with_file("subdir/deep.txt", "deep");

        let entries = layer.list(Path::new("")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "subdir"]);
        assert!(entries[2].is_dir());
    }

    #[tokio::test]
    async fn test_list_file_fails() {
        let layer = MemoryLayer::new().with_file("file.txt", "data");
        let result = layer.list(Path::new("file.txt")).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotADirectory);
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let layer = MemoryLayer::new().with_file("/a/b/c.txt", "data");

        for path in ["a/b/c.txt", "/a/b/c.txt", "a/./b/c.txt", "a/b/../b/c.txt"] {
            let data = layer.read(Path::new(path)).await.unwrap();
            assert_eq!(data, b"data", "path {path}");
        }
    }

    #[tokio::test]
    async fn test_root_stat() {
        let layer = MemoryLayer::new();
        for path in ["", "/", "."] {
            let meta = layer.stat(Path::new(path)).await.unwrap();
            assert!(meta.is_dir());
            assert_eq!(meta.name, "/");
        }
    }

    #[test]
    fn test_file_over_directory_rejected() {
        let mut layer = MemoryLayer::new().with_dir("dir");
        let err = layer.add_file("dir", "data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }

    #[test]
    fn test_file_as_parent_rejected() {
        let mut layer = MemoryLayer::new().with_file("file", "data");
        let err = layer.add_file("file/child", "data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotADirectory);
    }

    #[tokio::test]
    async fn test_handle_reads_in_chunks() {
        let layer = MemoryLayer::new().with_file("file.txt", "abcdef");
        let mut file = layer.open(Path::new("file.txt")).await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(file.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_directory_handle() {
        let layer = MemoryLayer::new().with_file("dir/x", "1").with_file("dir/y", "2");
        let mut dir = layer.open(Path::new("/dir")).await.unwrap();

        assert!(dir.stat().await.unwrap().is_dir());
        let names: Vec<_> = dir
            .read_dir()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["x", "y"]);

        let mut buf = [0u8; 1];
        let err = dir.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }

    #[tokio::test]
    async fn test_builder_keeps_first_node_on_conflict() {
        let layer = MemoryLayer::new().with_dir("x").with_file("x", "data");
        assert!(layer.stat(Path::new("x")).await.unwrap().is_dir());

        let layer = MemoryLayer::new().with_file("y", "data").with_dir("y");
        assert_eq!(layer.read(Path::new("y")).await.unwrap(), b"data");
    }
}
