pub mod config;
pub mod crawler;
pub mod error;
pub mod fileops;
pub mod format;
pub mod fs;
pub mod logging;
pub mod navigation;
pub mod session;
pub mod tree;
pub mod treemap;
pub mod watch;

pub use error::{Error, Result};
pub use fileops::FileOpController;
pub use fs::{FileSystem, LocalFs};
pub use navigation::{NavigationState, Selection};
pub use session::{Clipboard, ClipboardEntry, ClipboardMode, Session};
pub use tree::{FileTree, NodeKind, Snapshot};
pub use treemap::{Rect, SquarifiedTreemap};
