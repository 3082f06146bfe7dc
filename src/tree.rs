use indextree::{Arena, NodeId};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::treemap::{Rect, SquarifiedTreemap, TreemapItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

/// Represents a node in the directory tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    /// Bytes for a file, sum of all descendants for a directory
    pub size: u64,
}

impl TreeNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// A detached, owned subtree as produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub children: Vec<Snapshot>,
}

impl Snapshot {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            size,
            children: Vec::new(),
        }
    }

    pub fn dir(name: impl Into<String>, children: Vec<Snapshot>) -> Self {
        let size = children.iter().map(|c| c.size).sum();
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            size,
            children,
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of entries in this subtree, itself included.
    pub fn entry_count(&self) -> usize {
        1 + self.children.iter().map(Snapshot::entry_count).sum::<usize>()
    }
}

/// A direct child of a directory paired with its rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEntry {
    pub node: NodeId,
    pub rect: Rect,
}

/// Hierarchical tree structure using an arena allocator. Ownership flows
/// strictly root to children; the arena's parent links are only used for
/// walking up when sizes are propagated.
pub struct FileTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    root_path: PathBuf,
}

impl FileTree {
    /// Build a tree from a scanned snapshot of `root_path`.
    pub fn from_snapshot<P: AsRef<Path>>(root_path: P, snapshot: Snapshot) -> Self {
        let mut arena = Arena::new();
        let root = Self::insert_snapshot(&mut arena, snapshot);
        let mut tree = Self {
            arena,
            root,
            root_path: root_path.as_ref().to_path_buf(),
        };
        tree.calculate_sizes();
        tree
    }

    fn insert_snapshot(arena: &mut Arena<TreeNode>, snapshot: Snapshot) -> NodeId {
        let Snapshot {
            name,
            kind,
            size,
            children,
        } = snapshot;
        let node_id = arena.new_node(TreeNode { name, kind, size });
        for child in children {
            let child_id = Self::insert_snapshot(arena, child);
            node_id.append(child_id, arena);
        }
        node_id
    }

    /// Calculate cumulative sizes for all directories (bottom-up)
    pub fn calculate_sizes(&mut self) {
        self.calculate_sizes_recursive(self.root);
    }

    fn calculate_sizes_recursive(&mut self, node_id: NodeId) -> u64 {
        // Collect children first (to avoid borrow issues)
        let children: Vec<NodeId> = node_id.children(&self.arena).collect();

        let mut total = 0u64;
        for child in children {
            total += self.calculate_sizes_recursive(child);
        }

        match self.arena.get_mut(node_id) {
            Some(node) => {
                let data = node.get_mut();
                if data.is_dir() {
                    data.size = total;
                }
                data.size
            }
            None => 0,
        }
    }

    /// Recompute directory sizes from `node_id` up to the root. Only the
    /// ancestor chain is visited; siblings keep their stored sizes.
    fn propagate_sizes(&mut self, node_id: NodeId) {
        let chain: Vec<NodeId> = node_id.ancestors(&self.arena).collect();
        for id in chain {
            let is_dir = self.get(id).map(TreeNode::is_dir).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let total: u64 = id
                .children(&self.arena)
                .filter_map(|c| self.arena.get(c))
                .map(|n| n.get().size)
                .sum();
            if let Some(node) = self.arena.get_mut(id) {
                node.get_mut().size = total;
            }
        }
    }

    pub fn get_root(&self) -> NodeId {
        self.root
    }

    pub fn get_arena(&self) -> &Arena<TreeNode> {
        &self.arena
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn get(&self, node_id: NodeId) -> Option<&TreeNode> {
        if node_id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get(node_id).map(|n| n.get())
    }

    pub fn children(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node_id.children(&self.arena)
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.arena.get(node_id).and_then(|n| n.parent())
    }

    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        parent
            .children(&self.arena)
            .find(|&c| self.get(c).map(|n| n.name == name).unwrap_or(false))
    }

    /// Resolve a sequence of names below the root. The empty sequence is the root.
    pub fn node_at<S: AsRef<str>>(&self, names: &[S]) -> Result<NodeId> {
        let mut current = self.root;
        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let is_dir = self.get(current).map(TreeNode::is_dir).unwrap_or(false);
            if !is_dir {
                return Err(Error::NotFound(Self::join_names(&names[..=i])));
            }
            current = self
                .child_named(current, name)
                .ok_or_else(|| Error::NotFound(Self::join_names(&names[..=i])))?;
        }
        Ok(current)
    }

    /// Look up an absolute (or root-relative) filesystem path.
    pub fn get_node(&self, path: &Path) -> Option<NodeId> {
        let rel = path.strip_prefix(&self.root_path).unwrap_or(path);
        let names: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        self.node_at(&names).ok()
    }

    /// Names from the root (exclusive) down to `node_id` (inclusive).
    pub fn names_of(&self, node_id: NodeId) -> Vec<String> {
        let mut names: Vec<String> = node_id
            .ancestors(&self.arena)
            .take_while(|&id| id != self.root)
            .filter_map(|id| self.get(id).map(|n| n.name.clone()))
            .collect();
        names.reverse();
        names
    }

    pub fn path_of(&self, node_id: NodeId) -> PathBuf {
        let mut path = self.root_path.clone();
        for name in self.names_of(node_id) {
            path.push(name);
        }
        path
    }

    /// True when `ancestor` is `node_id` itself or lies on its parent chain.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        node_id.ancestors(&self.arena).any(|id| id == ancestor)
    }

    /// Replace the node at `names` with `snapshot`, keeping its position among
    /// its siblings, or append it under the parent when it does not exist
    /// yet. Ancestor sizes are recomputed afterwards.
    pub fn refresh<S: AsRef<str>>(&mut self, names: &[S], snapshot: Snapshot) -> Result<NodeId> {
        let Some((last, parent_names)) = names.split_last() else {
            let new_root = Self::insert_snapshot(&mut self.arena, snapshot);
            self.root.remove_subtree(&mut self.arena);
            self.root = new_root;
            return Ok(new_root);
        };

        let parent = self.node_at(parent_names)?;
        if !self.get(parent).map(TreeNode::is_dir).unwrap_or(false) {
            return Err(Error::NotADirectory(Self::join_names(parent_names)));
        }

        let snapshot = snapshot.renamed(last.as_ref());
        let new_id = Self::insert_snapshot(&mut self.arena, snapshot);
        match self.child_named(parent, last.as_ref()) {
            Some(old) => {
                old.insert_before(new_id, &mut self.arena);
                old.remove_subtree(&mut self.arena);
            }
            None => parent.append(new_id, &mut self.arena),
        }

        self.propagate_sizes(parent);
        Ok(new_id)
    }

    /// Detach the subtree at `names`, returning it as a snapshot.
    pub fn remove<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Snapshot> {
        if names.is_empty() {
            return Err(Error::InvalidTarget("cannot remove the scan root".to_string()));
        }
        let node_id = self.node_at(names)?;
        let snapshot = self.snapshot(node_id);
        let parent = self.parent(node_id);
        node_id.remove_subtree(&mut self.arena);
        if let Some(parent) = parent {
            self.propagate_sizes(parent);
        }
        Ok(snapshot)
    }

    /// Export the subtree at `node_id`.
    pub fn snapshot(&self, node_id: NodeId) -> Snapshot {
        let Some(node) = self.get(node_id) else {
            return Snapshot::dir("", Vec::new());
        };
        Snapshot {
            name: node.name.clone(),
            kind: node.kind,
            size: node.size,
            children: node_id.children(&self.arena).map(|c| self.snapshot(c)).collect(),
        }
    }

    /// Squarified layout of the direct children of `dir` inside `bounds`.
    pub fn layout_children(&self, dir: NodeId, bounds: Rect) -> Vec<LayoutEntry> {
        let children: Vec<NodeId> = dir.children(&self.arena).collect();
        let items: Vec<TreemapItem> = children
            .iter()
            .enumerate()
            .map(|(index, &id)| TreemapItem {
                size: self.get(id).map(|n| n.size).unwrap_or(0),
                index,
            })
            .collect();

        SquarifiedTreemap::layout(&items, bounds)
            .into_iter()
            .map(|lr| LayoutEntry {
                node: children[lr.index],
                rect: lr.rect,
            })
            .collect()
    }

    /// Get total size of the tree
    pub fn total_size(&self) -> u64 {
        self.get(self.root).map(|n| n.size).unwrap_or(0)
    }

    fn join_names<S: AsRef<str>>(names: &[S]) -> String {
        names.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("/")
    }
}
