//! layerfs: a read-only union of filesystem layers.
//!
//! This crate provides:
//!
//! - **Layers**: the [`Layer`] capability plus memory and local-directory
//!   implementations
//! - **LayeredFs**: an ordered stack of layers presented as one tree, where
//!   lookups go to the first layer that has a path and directory listings
//!   merge every layer
//!
//! ```no_run
//! # async fn demo() -> layerfs::Result<()> {
//! use layerfs::{LayeredFs, LocalLayer, MemoryLayer};
//!
//! let fs = LayeredFs::builder()
//!     .layer(MemoryLayer::new().with_file("etc/conf", "override"))
//!     .layer(LocalLayer::new("/srv/base"))
//!     .build();
//!
//! let conf = fs.read_file("etc/conf").await?;
//! for entry in fs.read_dir("etc").await? {
//!     println!("{} (layer {})", entry.name, entry.origin().index());
//! }
//! # let _ = conf;
//! # Ok(())
//! # }
//! ```

pub mod layered;
pub mod vfs;

pub use layered::{
    DirFile, File, FileInfo, LayerDirEntry, LayeredError, LayeredFs, LayeredFsBuilder, Op,
    OpenFile, Origin, Result,
};
pub use vfs::{DirEntry, EntryKind, Layer, LayerFile, LocalLayer, MemoryLayer, Metadata};
