//! Filesystem layers.
//!
//! A layer is any read-only filesystem the composed view can consult:
//!
//! - **MemoryLayer**: In-memory tree (overrides built at runtime, tests)
//! - **LocalLayer**: A real directory, confined to its root
//! - **LayeredFs**: Another composed filesystem (layers nest)
//!
//! Layers only need to implement [`Layer::open`]; the other operations have
//! defaults that go through the returned [`LayerFile`] handle.

mod local;
mod memory;
mod traits;

pub use local::{LocalFile, LocalLayer};
pub use memory::{MemoryFile, MemoryLayer};
pub use traits::{DirEntry, EntryKind, Layer, LayerFile, Metadata};
