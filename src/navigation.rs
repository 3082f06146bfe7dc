use indextree::NodeId;

use crate::error::{Error, Result};
use crate::tree::{FileTree, LayoutEntry, NodeKind};
use crate::treemap::Rect;

/// Outcome of a click on the treemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A directory was clicked and is now focused.
    Descended(NodeId),
    /// A file was clicked; focus is unchanged.
    FileSelected(NodeId),
}

/// Breadcrumb stack from the root to the focused directory, plus the layout
/// cached for the focused directory.
#[derive(Debug, Clone)]
pub struct NavigationState {
    path: Vec<NodeId>,
    cached_layout: Option<(Rect, Vec<LayoutEntry>)>,
}

impl NavigationState {
    pub fn new(root: NodeId) -> Self {
        Self {
            path: vec![root],
            cached_layout: None,
        }
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn focused(&self) -> NodeId {
        // path is never empty
        self.path[self.path.len() - 1]
    }

    /// Depth of the focused directory (0 = root).
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn breadcrumb(&self, tree: &FileTree) -> Vec<String> {
        self.path
            .iter()
            .map(|&id| tree.get(id).map(|n| n.name.clone()).unwrap_or_default())
            .collect()
    }

    pub fn descend_into(&mut self, tree: &FileTree, child_name: &str) -> Result<NodeId> {
        let child = tree
            .child_named(self.focused(), child_name)
            .ok_or_else(|| Error::NotFound(child_name.to_string()))?;

        match tree.get(child).map(|n| n.kind) {
            Some(NodeKind::Directory) => {
                self.path.push(child);
                self.invalidate();
                tracing::debug!(depth = self.depth(), name = child_name, "descended");
                Ok(child)
            }
            Some(NodeKind::File) => Err(Error::NotADirectory(child_name.to_string())),
            None => Err(Error::NotFound(child_name.to_string())),
        }
    }

    /// Truncate the breadcrumb so that the entry at `depth` is focused.
    pub fn ascend_to(&mut self, depth: usize) -> Result<NodeId> {
        if depth >= self.path.len() {
            return Err(Error::OutOfRange {
                depth,
                len: self.path.len(),
            });
        }
        self.path.truncate(depth + 1);
        self.invalidate();
        tracing::debug!(depth, "ascended");
        Ok(self.focused())
    }

    /// One level up; a no-op at the root.
    pub fn ascend(&mut self) -> NodeId {
        let depth = self.depth().saturating_sub(1);
        self.ascend_to(depth).unwrap_or_else(|_| self.focused())
    }

    /// Map a click inside the current layout to a node. Returns `None` when
    /// the point is outside every rectangle.
    pub fn select_rectangle(
        &mut self,
        tree: &FileTree,
        point: (f64, f64),
        layout: &[LayoutEntry],
    ) -> Result<Option<Selection>> {
        let Some(entry) = layout.iter().find(|e| e.rect.contains(point.0, point.1)) else {
            return Ok(None);
        };

        let node = tree
            .get(entry.node)
            .ok_or_else(|| Error::NotFound(format!("{:?}", entry.node)))?;

        match node.kind {
            NodeKind::Directory => {
                let name = node.name.clone();
                let child = self.descend_into(tree, &name)?;
                Ok(Some(Selection::Descended(child)))
            }
            NodeKind::File => {
                tracing::debug!(name = %node.name, "file selected");
                Ok(Some(Selection::FileSelected(entry.node)))
            }
        }
    }

    /// Layout of the focused directory, recomputed only after a transition
    /// or when `bounds` changes.
    pub fn current_layout(&mut self, tree: &FileTree, bounds: Rect) -> &[LayoutEntry] {
        let stale = match &self.cached_layout {
            Some((cached_bounds, _)) => *cached_bounds != bounds,
            None => true,
        };
        if stale {
            let layout = tree.layout_children(self.focused(), bounds);
            self.cached_layout = Some((bounds, layout));
        }
        match &self.cached_layout {
            Some((_, layout)) => layout,
            None => &[],
        }
    }

    pub fn invalidate(&mut self) {
        self.cached_layout = None;
    }

    /// Rebuild the stack from breadcrumb names after the tree was patched,
    /// keeping the longest prefix that still resolves to directories.
    pub fn restore(&mut self, tree: &FileTree, names: &[String]) {
        let mut path = vec![tree.get_root()];
        for name in names.iter().skip(1) {
            let Some(&current) = path.last() else { break };
            match tree.child_named(current, name) {
                Some(child) if tree.get(child).map(|n| n.is_dir()).unwrap_or(false) => path.push(child),
                _ => break,
            }
        }
        self.path = path;
        self.invalidate();
    }
}
