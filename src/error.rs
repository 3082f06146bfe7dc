use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the tree model, navigation and file operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("depth {depth} out of range (breadcrumb has {len} entries)")]
    OutOfRange { depth: usize, len: usize },

    #[error("clipboard is empty")]
    EmptyClipboard,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("cannot move {} into {}", node.display(), destination.display())]
    CyclicMove { node: PathBuf, destination: PathBuf },

    /// An underlying I/O failure. `partial` is set when a multi-step
    /// operation (recursive copy or delete) stopped midway.
    #[error("{op} failed for {}{}: {source}", path.display(), if *partial { " (partially completed)" } else { "" })]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        partial: bool,
        #[source]
        source: io::Error,
    },

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem {
            op,
            path: path.into(),
            partial: false,
            source,
        }
    }

    /// True for errors that leave the filesystem in a partially modified state.
    pub fn is_partial(&self) -> bool {
        matches!(self, Error::Filesystem { partial: true, .. })
    }
}
