//! Aggregate errors reported by [`LayeredFs`](super::LayeredFs).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Operation that a [`LayeredError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Open,
    ReadFile,
    ReadDir,
    Stat,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Open => "Open",
            Op::ReadFile => "ReadFile",
            Op::ReadDir => "ReadDir",
            Op::Stat => "Stat",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// No layer could satisfy an operation.
///
/// Individual layer failures are never reported; a missing path and a
/// permission problem in one layer look the same from here.
#[derive(Debug, Error)]
pub enum LayeredError {
    /// No layer could open the path, or the layer that opened it could not
    /// stat the handle (in which case `source` holds that error).
    #[error("could not Open {}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },

    #[error("could not ReadFile {}", .path.display())]
    ReadFileFailed { path: PathBuf },

    #[error("could not ReadDir {}", .path.display())]
    ReadDirFailed { path: PathBuf },

    #[error("could not Stat {}", .path.display())]
    StatFailed { path: PathBuf },
}

impl LayeredError {
    pub(crate) fn open(path: &Path) -> Self {
        LayeredError::OpenFailed {
            path: path.to_path_buf(),
            source: None,
        }
    }

    pub(crate) fn read_file(path: &Path) -> Self {
        LayeredError::ReadFileFailed {
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn read_dir(path: &Path) -> Self {
        LayeredError::ReadDirFailed {
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn stat(path: &Path) -> Self {
        LayeredError::StatFailed {
            path: path.to_path_buf(),
        }
    }

    /// The operation that failed.
    pub fn op(&self) -> Op {
        match self {
            LayeredError::OpenFailed { .. } => Op::Open,
            LayeredError::ReadFileFailed { .. } => Op::ReadFile,
            LayeredError::ReadDirFailed { .. } => Op::ReadDir,
            LayeredError::StatFailed { .. } => Op::Stat,
        }
    }

    /// The path that was requested.
    pub fn path(&self) -> &Path {
        match self {
            LayeredError::OpenFailed { path, .. }
            | LayeredError::ReadFileFailed { path }
            | LayeredError::ReadDirFailed { path }
            | LayeredError::StatFailed { path } => path,
        }
    }

    /// The `io::ErrorKind` this error maps to.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            LayeredError::OpenFailed {
                source: Some(source),
                ..
            } => source.kind(),
            _ => io::ErrorKind::NotFound,
        }
    }
}

impl From<LayeredError> for io::Error {
    fn from(err: LayeredError) -> Self {
        io::Error::new(err.kind(), err)
    }
}

/// Result type for composed filesystem operations.
pub type Result<T> = std::result::Result<T, LayeredError>;
