use indextree::NodeId;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::navigation::{NavigationState, Selection};
use crate::tree::{FileTree, LayoutEntry, NodeKind, Snapshot};
use crate::treemap::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardMode {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardEntry {
    pub path: PathBuf,
    pub kind: NodeKind,
    pub mode: ClipboardMode,
}

/// Set by copy/cut, replaced by the next copy/cut, cleared by paste.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    entry: Option<ClipboardEntry>,
}

impl Clipboard {
    pub fn set(&mut self, entry: ClipboardEntry) {
        self.entry = Some(entry);
    }

    pub fn peek(&self) -> Option<&ClipboardEntry> {
        self.entry.as_ref()
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

/// Everything one user session mutates: the scanned tree, the breadcrumb,
/// the clipboard and the current selection. Independent sessions share
/// nothing.
pub struct Session {
    tree: FileTree,
    navigation: NavigationState,
    clipboard: Clipboard,
    selection: Option<NodeId>,
}

impl Session {
    pub fn open<F: FileSystem + ?Sized>(fs: &F, root: &Path) -> Result<Self> {
        let snapshot = fs.scan(root).map_err(|e| Error::fs("scan", root, e))?;
        if snapshot.kind != NodeKind::Directory {
            return Err(Error::NotADirectory(root.display().to_string()));
        }
        tracing::info!(root = %root.display(), size = snapshot.size, entries = snapshot.entry_count(), "session opened");
        Ok(Self::from_snapshot(root, snapshot))
    }

    pub fn from_snapshot(root: &Path, snapshot: Snapshot) -> Self {
        let tree = FileTree::from_snapshot(root, snapshot);
        let navigation = NavigationState::new(tree.get_root());
        Self {
            tree,
            navigation,
            clipboard: Clipboard::default(),
            selection: None,
        }
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub(crate) fn clipboard_mut(&mut self) -> &mut Clipboard {
        &mut self.clipboard
    }

    pub fn focused(&self) -> NodeId {
        self.navigation.focused()
    }

    pub fn breadcrumb(&self) -> Vec<String> {
        self.navigation.breadcrumb(&self.tree)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection
    }

    pub fn select(&mut self, node: Option<NodeId>) {
        self.selection = node.filter(|&id| self.tree.get(id).is_some());
    }

    pub fn layout(&mut self, bounds: Rect) -> Vec<LayoutEntry> {
        self.navigation.current_layout(&self.tree, bounds).to_vec()
    }

    pub fn descend_into(&mut self, name: &str) -> Result<NodeId> {
        let id = self.navigation.descend_into(&self.tree, name)?;
        self.selection = None;
        Ok(id)
    }

    pub fn ascend_to(&mut self, depth: usize) -> Result<NodeId> {
        let id = self.navigation.ascend_to(depth)?;
        self.selection = None;
        Ok(id)
    }

    pub fn ascend(&mut self) -> NodeId {
        self.selection = None;
        self.navigation.ascend()
    }

    /// Click on the treemap: directories are entered, files become the
    /// selection for subsequent file operations.
    pub fn click(&mut self, point: (f64, f64), bounds: Rect) -> Result<Option<Selection>> {
        let layout = self.layout(bounds);
        let selection = self.navigation.select_rectangle(&self.tree, point, &layout)?;
        self.selection = match selection {
            Some(Selection::FileSelected(id)) => Some(id),
            _ => None,
        };
        Ok(selection)
    }

    /// Apply a change to the tree. The breadcrumb is captured by name before
    /// and re-resolved afterwards, since patched subtrees get new node ids.
    pub(crate) fn patch<T>(&mut self, change: impl FnOnce(&mut FileTree) -> Result<T>) -> Result<T> {
        let names = self.breadcrumb();
        let selected = self.selection.map(|id| self.tree.names_of(id));

        let result = change(&mut self.tree);

        self.navigation.restore(&self.tree, &names);
        self.selection = selected.and_then(|names| self.tree.node_at(&names).ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::from_snapshot(
            Path::new("/r"),
            Snapshot::dir(
                "r",
                vec![
                    Snapshot::dir("docs", vec![Snapshot::file("a.md", 10)]),
                    Snapshot::file("b.bin", 30),
                ],
            ),
        )
    }

    #[test]
    fn test_clipboard_lifecycle() {
        let mut clipboard = Clipboard::default();
        assert!(clipboard.is_empty());
        clipboard.set(ClipboardEntry {
            path: PathBuf::from("/r/a"),
            kind: NodeKind::File,
            mode: ClipboardMode::Copy,
        });
        clipboard.set(ClipboardEntry {
            path: PathBuf::from("/r/b"),
            kind: NodeKind::File,
            mode: ClipboardMode::Cut,
        });
        assert_eq!(clipboard.peek().unwrap().path, PathBuf::from("/r/b"));
        clipboard.clear();
        assert!(clipboard.is_empty());
    }

    #[test]
    fn test_click_selects_file_then_descends() {
        let mut s = session();
        let bounds = Rect::new(0.0, 0.0, 40.0, 10.0);
        let layout = s.layout(bounds);
        let b = s.tree().node_at(&["b.bin"]).unwrap();
        let r = layout.iter().find(|e| e.node == b).unwrap().rect;

        let hit = s.click((r.x + 1.0, r.y + 1.0), bounds).unwrap();
        assert_eq!(hit, Some(Selection::FileSelected(b)));
        assert_eq!(s.selected(), Some(b));

        let docs = s.tree().node_at(&["docs"]).unwrap();
        let r = layout.iter().find(|e| e.node == docs).unwrap().rect;
        s.click((r.x + 1.0, r.y + 1.0), bounds).unwrap();
        assert_eq!(s.breadcrumb(), vec!["r", "docs"]);
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn test_patch_restores_breadcrumb_and_selection() {
        let mut s = session();
        s.descend_into("docs").unwrap();
        let a = s.tree().node_at(&["docs", "a.md"]).unwrap();
        s.select(Some(a));

        s.patch(|tree| tree.refresh(&["docs"], Snapshot::dir("docs", vec![Snapshot::file("a.md", 99)])))
            .unwrap();

        assert_eq!(s.breadcrumb(), vec!["r", "docs"]);
        let a = s.selected().unwrap();
        assert_eq!(s.tree().get(a).unwrap().size, 99);
        assert_eq!(s.tree().total_size(), 129);
    }
}
