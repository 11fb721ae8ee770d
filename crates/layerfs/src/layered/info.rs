//! Provenance wrappers for metadata and directory entries.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::vfs::{DirEntry, Layer, Metadata};

/// The layer that answered a lookup.
///
/// Borrowed from the [`LayeredFs`](super::LayeredFs): it can never outlive
/// the composed filesystem or keep a layer alive.
#[derive(Clone, Copy)]
pub struct Origin<'a> {
    index: usize,
    layer: &'a dyn Layer,
}

impl<'a> Origin<'a> {
    pub(crate) fn new(index: usize, layer: &'a dyn Layer) -> Self {
        Self { index, layer }
    }

    /// Position of the layer in priority order (0 = highest).
    pub fn index(&self) -> usize {
        self.index
    }

    /// The layer itself.
    pub fn layer(&self) -> &'a dyn Layer {
        self.layer
    }

    /// True if this origin is `layer`.
    pub fn is(&self, layer: &Arc<dyn Layer>) -> bool {
        std::ptr::addr_eq(self.layer, Arc::as_ptr(layer))
    }
}

impl fmt::Debug for Origin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin").field("index", &self.index).finish()
    }
}

/// [`Metadata`] tagged with the layer it came from.
#[derive(Debug, Clone)]
pub struct FileInfo<'a> {
    info: Metadata,
    origin: Origin<'a>,
}

impl<'a> FileInfo<'a> {
    pub(crate) fn new(info: Metadata, origin: Origin<'a>) -> Self {
        Self { info, origin }
    }

    pub fn origin(&self) -> Origin<'a> {
        self.origin
    }

    pub fn into_inner(self) -> Metadata {
        self.info
    }
}

impl Deref for FileInfo<'_> {
    type Target = Metadata;

    fn deref(&self) -> &Metadata {
        &self.info
    }
}

impl PartialEq for FileInfo<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}

impl Eq for FileInfo<'_> {}

/// [`DirEntry`] tagged with the layer it came from.
#[derive(Debug, Clone)]
pub struct LayerDirEntry<'a> {
    entry: DirEntry,
    origin: Origin<'a>,
}

impl<'a> LayerDirEntry<'a> {
    pub(crate) fn new(entry: DirEntry, origin: Origin<'a>) -> Self {
        Self { entry, origin }
    }

    pub fn origin(&self) -> Origin<'a> {
        self.origin
    }

    pub fn into_inner(self) -> DirEntry {
        self.entry
    }
}

impl Deref for LayerDirEntry<'_> {
    type Target = DirEntry;

    fn deref(&self) -> &DirEntry {
        &self.entry
    }
}

impl PartialEq for LayerDirEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry
    }
}

impl Eq for LayerDirEntry<'_> {}
