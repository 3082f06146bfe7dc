use dashmap::DashMap;
use indextree::NodeId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::session::{ClipboardEntry, ClipboardMode, Session};
use crate::tree::{FileTree, NodeKind, Snapshot};

/// Per-subtree mutexes. The key of a path is the top-level entry below the
/// scan root that contains it, so operations inside the same top-level
/// subtree run one at a time while unrelated subtrees do not wait.
#[derive(Default)]
pub struct SubtreeLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl SubtreeLocks {
    fn key(root: &Path, path: &Path) -> PathBuf {
        match path.strip_prefix(root).ok().and_then(|rel| rel.components().next()) {
            Some(first) => root.join(first),
            None => path.to_path_buf(),
        }
    }

    /// Lock handles for `paths`, deduplicated and in key order.
    pub fn handles(&self, root: &Path, paths: &[&Path]) -> Vec<Arc<Mutex<()>>> {
        let mut keys: Vec<PathBuf> = paths.iter().map(|p| Self::key(root, p)).collect();
        keys.sort();
        keys.dedup();
        keys.into_iter()
            .map(|key| self.locks.entry(key).or_default().value().clone())
            .collect()
    }

    pub fn lock_all(handles: &[Arc<Mutex<()>>]) -> Vec<MutexGuard<'_, ()>> {
        handles
            .iter()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

/// Pick a free name for a copy of `name`: `report.txt` becomes
/// `report (copy).txt`, then `report (copy 2).txt`, and so on. Directories and
/// dotfiles are never split at a dot.
pub fn unique_name(name: &str, kind: NodeKind, taken: impl Fn(&str) -> bool) -> String {
    let (stem, ext) = match (kind, name.rfind('.')) {
        (NodeKind::File, Some(idx)) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    };

    let mut n = 1u32;
    loop {
        let label = if n == 1 { "copy".to_string() } else { format!("copy {}", n) };
        let candidate = match ext {
            Some(ext) => format!("{} ({}).{}", stem, label, ext),
            None => format!("{} ({})", stem, label),
        };
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn child_names(parent: &[String], name: &str) -> Vec<String> {
    let mut names = parent.to_vec();
    names.push(name.to_string());
    names
}

/// Translates user actions into filesystem mutations and patches the
/// session's tree afterwards.
pub struct FileOpController<F: FileSystem> {
    fs: F,
    locks: SubtreeLocks,
}

impl<F: FileSystem> FileOpController<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            locks: SubtreeLocks::default(),
        }
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    fn node_info(tree: &FileTree, node: NodeId) -> Result<(String, NodeKind)> {
        tree.get(node)
            .map(|n| (n.name.clone(), n.kind))
            .ok_or_else(|| Error::NotFound(format!("{:?}", node)))
    }

    fn parent_of_non_root(tree: &FileTree, node: NodeId, what: &str) -> Result<NodeId> {
        tree.parent(node)
            .ok_or_else(|| Error::InvalidTarget(format!("cannot {} the scan root", what)))
    }

    fn free_name(&self, tree: &FileTree, dir: NodeId, name: &str, kind: NodeKind, always: bool) -> String {
        let dir_path = tree.path_of(dir);
        let taken = |candidate: &str| {
            tree.child_named(dir, candidate).is_some() || self.fs.exists(&dir_path.join(candidate))
        };
        if !always && !taken(name) {
            return name.to_string();
        }
        unique_name(name, kind, taken)
    }

    /// Byte-copy a scanned subtree from `from` to `to`. `done` counts the
    /// entries created so far and decides whether a failure is partial.
    fn copy_tree(&self, snapshot: &Snapshot, from: &Path, to: &Path, done: &mut usize) -> Result<()> {
        let step_error = |path: &Path, done: usize, source| Error::Filesystem {
            op: "copy",
            path: path.to_path_buf(),
            partial: done > 0,
            source,
        };

        match snapshot.kind {
            NodeKind::File => {
                let bytes = self.fs.read_bytes(from).map_err(|e| step_error(from, *done, e))?;
                self.fs.write_bytes(to, &bytes).map_err(|e| step_error(to, *done, e))?;
                *done += 1;
            }
            NodeKind::Directory => {
                self.fs.mkdir(to).map_err(|e| step_error(to, *done, e))?;
                *done += 1;
                for child in &snapshot.children {
                    self.copy_tree(child, &from.join(&child.name), &to.join(&child.name), done)?;
                }
            }
        }
        Ok(())
    }

    /// Bring the model entry at `names` in line with what is on disk at `path`.
    fn sync_entry(&self, session: &mut Session, names: &[String], path: &Path) -> Result<()> {
        if self.fs.exists(path) {
            let snapshot = self.fs.scan(path).map_err(|e| Error::fs("scan", path, e))?;
            session.patch(|tree| tree.refresh(names, snapshot)).map(|_| ())
        } else {
            session.patch(|tree| match tree.remove(names) {
                Ok(_) | Err(Error::NotFound(_)) => Ok(()),
                Err(e) => Err(e),
            })
        }
    }

    /// `sync_entry` after a failed operation. The operation's error is what
    /// the caller reports, so a failing re-sync is only logged.
    fn resync_after_failure(&self, session: &mut Session, names: &[String], path: &Path) {
        if let Err(err) = self.sync_entry(session, names, path) {
            tracing::warn!(path = %path.display(), error = %err, "re-sync after failed operation failed");
        }
    }

    /// Copy whatever is at `source` into the directory `destination`, renaming
    /// on collision (or always, for duplicates).
    fn copy_into(&self, session: &mut Session, source: &Path, destination: NodeId, always_rename: bool) -> Result<NodeId> {
        let dest_dir = session.tree().path_of(destination);
        let root = session.tree().root_path().to_path_buf();

        // The free name is only free while these are held
        let handles = self.locks.handles(&root, &[source, &dest_dir]);
        let _guards = SubtreeLocks::lock_all(&handles);

        let snapshot = self.fs.scan(source).map_err(|e| Error::fs("scan", source, e))?;
        let tree = session.tree();
        let new_name = self.free_name(tree, destination, &snapshot.name, snapshot.kind, always_rename);
        let dest_names = child_names(&tree.names_of(destination), &new_name);
        let dest_path = dest_dir.join(&new_name);

        let mut done = 0;
        if let Err(err) = self.copy_tree(&snapshot, source, &dest_path, &mut done) {
            tracing::warn!(source = %source.display(), dest = %dest_path.display(), error = %err, "copy failed");
            self.resync_after_failure(session, &dest_names, &dest_path);
            return Err(err);
        }

        let id = session.patch(|tree| tree.refresh(&dest_names, snapshot))?;
        tracing::info!(source = %source.display(), dest = %dest_path.display(), "copied");
        Ok(id)
    }

    /// Create a sibling copy of `node` under a disambiguated name.
    pub fn duplicate(&self, session: &mut Session, node: NodeId) -> Result<NodeId> {
        let tree = session.tree();
        Self::node_info(tree, node)?;
        let parent = Self::parent_of_non_root(tree, node, "duplicate")?;
        let source = tree.path_of(node);
        self.copy_into(session, &source, parent, true)
    }

    /// Remove `node` (recursively for directories). There is no undo.
    pub fn delete(&self, session: &mut Session, node: NodeId) -> Result<()> {
        let tree = session.tree();
        let (_, kind) = Self::node_info(tree, node)?;
        Self::parent_of_non_root(tree, node, "delete")?;
        let names = tree.names_of(node);
        let path = tree.path_of(node);
        let entries_before = tree.snapshot(node).entry_count();
        let root = tree.root_path().to_path_buf();

        let handles = self.locks.handles(&root, &[&path]);
        let _guards = SubtreeLocks::lock_all(&handles);

        match self.fs.remove(&path) {
            Ok(()) => {
                let removed = session.patch(|tree| tree.remove(&names))?;
                tracing::info!(path = %path.display(), bytes = removed.size, "deleted");
                Ok(())
            }
            Err(source) => {
                let remaining = if self.fs.exists(&path) {
                    self.fs.scan(&path).map(|s| s.entry_count()).unwrap_or(entries_before)
                } else {
                    0
                };
                let partial = kind == NodeKind::Directory && remaining < entries_before;
                tracing::warn!(path = %path.display(), partial, error = %source, "delete failed");
                self.resync_after_failure(session, &names, &path);
                Err(Error::Filesystem {
                    op: "delete",
                    path,
                    partial,
                    source,
                })
            }
        }
    }

    fn clip(&self, session: &mut Session, node: NodeId, mode: ClipboardMode) -> Result<ClipboardEntry> {
        let tree = session.tree();
        let (_, kind) = Self::node_info(tree, node)?;
        if mode == ClipboardMode::Cut {
            Self::parent_of_non_root(tree, node, "cut")?;
        }
        let entry = ClipboardEntry {
            path: tree.path_of(node),
            kind,
            mode,
        };
        session.clipboard_mut().set(entry.clone());
        tracing::debug!(path = %entry.path.display(), ?mode, "clipboard set");
        Ok(entry)
    }

    /// Remember `node` for a later paste. Does not touch the filesystem.
    pub fn copy(&self, session: &mut Session, node: NodeId) -> Result<ClipboardEntry> {
        self.clip(session, node, ClipboardMode::Copy)
    }

    /// Remember `node` so that the next paste moves it.
    pub fn cut(&self, session: &mut Session, node: NodeId) -> Result<ClipboardEntry> {
        self.clip(session, node, ClipboardMode::Cut)
    }

    /// Copy (or move, for a cut) the clipboard entry into `destination`.
    pub fn paste(&self, session: &mut Session, destination: NodeId) -> Result<NodeId> {
        let entry = session.clipboard().peek().cloned().ok_or(Error::EmptyClipboard)?;

        let (dest_name, dest_kind) = Self::node_info(session.tree(), destination)?;
        if dest_kind != NodeKind::Directory {
            return Err(Error::InvalidTarget(format!("{} is not a directory", dest_name)));
        }

        let id = match entry.mode {
            ClipboardMode::Copy => self.copy_into(session, &entry.path, destination, false)?,
            ClipboardMode::Cut => {
                let source = session
                    .tree()
                    .get_node(&entry.path)
                    .ok_or_else(|| Error::NotFound(entry.path.display().to_string()))?;
                self.move_node(session, source, destination)?
            }
        };

        session.clipboard_mut().clear();
        Ok(id)
    }

    /// Relocate `node` under `destination`, renaming on collision. Moving into
    /// the current parent changes nothing.
    pub fn move_node(&self, session: &mut Session, node: NodeId, destination: NodeId) -> Result<NodeId> {
        let tree = session.tree();
        let (name, kind) = Self::node_info(tree, node)?;
        let (dest_name, dest_kind) = Self::node_info(tree, destination)?;
        let parent = Self::parent_of_non_root(tree, node, "move")?;

        if tree.is_ancestor_of(node, destination) {
            return Err(Error::CyclicMove {
                node: tree.path_of(node),
                destination: tree.path_of(destination),
            });
        }
        if dest_kind != NodeKind::Directory {
            return Err(Error::InvalidTarget(format!("{} is not a directory", dest_name)));
        }
        if parent == destination {
            return Ok(node);
        }

        let src_names = tree.names_of(node);
        let src_path = tree.path_of(node);
        let dest_dir = tree.path_of(destination);
        let root = tree.root_path().to_path_buf();

        let handles = self.locks.handles(&root, &[&src_path, &dest_dir]);
        let _guards = SubtreeLocks::lock_all(&handles);

        let tree = session.tree();
        let new_name = self.free_name(tree, destination, &name, kind, false);
        let dest_names = child_names(&tree.names_of(destination), &new_name);
        let dest_path = dest_dir.join(&new_name);

        if let Err(source) = self.fs.rename(&src_path, &dest_path) {
            // `dest_path` was free under the guards, so anything there now
            // is a copy whose source could not be removed
            let partial = self.fs.exists(&dest_path);
            tracing::warn!(from = %src_path.display(), to = %dest_path.display(), partial, error = %source, "move failed");
            self.resync_after_failure(session, &src_names, &src_path);
            self.resync_after_failure(session, &dest_names, &dest_path);
            return Err(Error::Filesystem {
                op: "move",
                path: src_path,
                partial,
                source,
            });
        }

        let id = session.patch(|tree| {
            let moved = tree.remove(&src_names)?;
            tree.refresh(&dest_names, moved)
        })?;
        tracing::info!(from = %src_path.display(), to = %dest_path.display(), "moved");
        Ok(id)
    }

    /// Re-scan the whole root, keeping the breadcrumb where possible.
    pub fn rescan(&self, session: &mut Session) -> Result<()> {
        let root = session.tree().root_path().to_path_buf();
        let snapshot = self.fs.scan(&root).map_err(|e| Error::fs("scan", &root, e))?;
        session.patch(|tree| tree.refresh::<String>(&[], snapshot)).map(|_| ())
    }

    /// Re-scan the directories containing externally changed `paths`.
    pub fn sync_paths(&self, session: &mut Session, paths: &[PathBuf]) -> Result<()> {
        let root = session.tree().root_path().to_path_buf();

        let mut dirs: Vec<PathBuf> = paths
            .iter()
            .filter(|p| p.starts_with(&root))
            .filter_map(|p| {
                let tree = session.tree();
                p.parent()
                    .into_iter()
                    .flat_map(Path::ancestors)
                    .take_while(|a| a.starts_with(&root))
                    .find(|a| tree.get_node(a).and_then(|id| tree.get(id)).map(|n| n.is_dir()).unwrap_or(false))
                    .map(Path::to_path_buf)
            })
            .collect();
        dirs.sort();
        dirs.dedup();

        let outermost: Vec<PathBuf> = dirs
            .iter()
            .filter(|d| !dirs.iter().any(|other| other != *d && d.starts_with(other)))
            .cloned()
            .collect();

        for dir in outermost {
            if dir == root {
                return self.rescan(session);
            }
            let names: Vec<String> = dir
                .strip_prefix(&root)
                .map(|rel| rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect())
                .unwrap_or_default();
            tracing::debug!(dir = %dir.display(), "re-syncing after external change");
            self.sync_entry(session, &names, &dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use std::fs;

    fn setup() -> (tempfile::TempDir, FileOpController<LocalFs>, Session) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.md"), vec![b'a'; 10]).unwrap();
        fs::write(dir.path().join("b.bin"), vec![b'b'; 30]).unwrap();
        let controller = FileOpController::new(LocalFs::default());
        let session = Session::open(controller.filesystem(), dir.path()).unwrap();
        (dir, controller, session)
    }

    #[test]
    fn test_unique_name_scheme() {
        let none = |_: &str| false;
        assert_eq!(unique_name("report.txt", NodeKind::File, none), "report (copy).txt");
        assert_eq!(unique_name("photos", NodeKind::Directory, none), "photos (copy)");
        assert_eq!(unique_name(".bashrc", NodeKind::File, none), ".bashrc (copy)");
        assert_eq!(unique_name("v1.2", NodeKind::Directory, none), "v1.2 (copy)");

        let taken = |c: &str| c == "report (copy).txt" || c == "report (copy 2).txt";
        assert_eq!(unique_name("report.txt", NodeKind::File, taken), "report (copy 3).txt");
    }

    #[test]
    fn test_lock_keys_group_by_top_level_entry() {
        let locks = SubtreeLocks::default();
        let root = Path::new("/r");
        let same = locks.handles(root, &[Path::new("/r/a/x"), Path::new("/r/a/y/z")]);
        assert_eq!(same.len(), 1);
        let split = locks.handles(root, &[Path::new("/r/a/x"), Path::new("/r/b")]);
        assert_eq!(split.len(), 2);
        assert!(Arc::ptr_eq(&same[0], &split[0]));
        let guards = SubtreeLocks::lock_all(&split);
        assert_eq!(guards.len(), 2);
    }

    #[test]
    fn test_duplicate_file_and_directory() {
        let (dir, ops, mut session) = setup();
        let b = session.tree().node_at(&["b.bin"]).unwrap();
        let copy = ops.duplicate(&mut session, b).unwrap();
        assert_eq!(session.tree().get(copy).unwrap().name, "b (copy).bin");
        assert_eq!(fs::read(dir.path().join("b (copy).bin")).unwrap(), vec![b'b'; 30]);

        let docs = session.tree().node_at(&["docs"]).unwrap();
        ops.duplicate(&mut session, docs).unwrap();
        assert!(dir.path().join("docs (copy)/a.md").exists());
        assert_eq!(session.tree().total_size(), 10 + 30 + 30 + 10);
    }

    #[test]
    fn test_root_is_protected() {
        let (_dir, ops, mut session) = setup();
        let root = session.tree().get_root();
        assert!(matches!(ops.delete(&mut session, root), Err(Error::InvalidTarget(_))));
        assert!(matches!(ops.duplicate(&mut session, root), Err(Error::InvalidTarget(_))));
        assert!(matches!(ops.cut(&mut session, root), Err(Error::InvalidTarget(_))));
    }

    #[test]
    fn test_copy_paste_renames_on_collision_and_clears_clipboard() {
        let (dir, ops, mut session) = setup();
        let a = session.tree().node_at(&["docs", "a.md"]).unwrap();
        let docs = session.tree().node_at(&["docs"]).unwrap();

        ops.copy(&mut session, a).unwrap();
        assert!(!session.clipboard().is_empty());
        let pasted = ops.paste(&mut session, docs).unwrap();

        assert_eq!(session.tree().get(pasted).unwrap().name, "a (copy).md");
        assert!(dir.path().join("docs/a (copy).md").exists());
        assert!(session.clipboard().is_empty());
        assert!(matches!(ops.paste(&mut session, docs), Err(Error::EmptyClipboard)));
    }

    #[test]
    fn test_paste_into_file_is_invalid() {
        let (_dir, ops, mut session) = setup();
        let a = session.tree().node_at(&["docs", "a.md"]).unwrap();
        let b = session.tree().node_at(&["b.bin"]).unwrap();
        ops.copy(&mut session, a).unwrap();
        assert!(matches!(ops.paste(&mut session, b), Err(Error::InvalidTarget(_))));
        assert!(!session.clipboard().is_empty());
    }

    #[test]
    fn test_cut_paste_moves() {
        let (dir, ops, mut session) = setup();
        let b = session.tree().node_at(&["b.bin"]).unwrap();
        let docs = session.tree().node_at(&["docs"]).unwrap();
        ops.cut(&mut session, b).unwrap();
        ops.paste(&mut session, docs).unwrap();

        assert!(!dir.path().join("b.bin").exists());
        assert!(dir.path().join("docs/b.bin").exists());
        let docs = session.tree().node_at(&["docs"]).unwrap();
        assert_eq!(session.tree().get(docs).unwrap().size, 40);
        assert_eq!(session.tree().total_size(), 40);
    }

    #[test]
    fn test_move_into_parent_is_noop() {
        let (dir, ops, mut session) = setup();
        let b = session.tree().node_at(&["b.bin"]).unwrap();
        let root = session.tree().get_root();
        assert_eq!(ops.move_node(&mut session, b, root).unwrap(), b);
        assert!(dir.path().join("b.bin").exists());
    }

    #[test]
    fn test_sync_paths_picks_up_external_changes() {
        let (dir, ops, mut session) = setup();
        fs::write(dir.path().join("docs/new.txt"), vec![0u8; 5]).unwrap();
        fs::remove_file(dir.path().join("b.bin")).unwrap();

        ops.sync_paths(&mut session, &[dir.path().join("docs/new.txt")]).unwrap();
        assert!(session.tree().node_at(&["docs", "new.txt"]).is_ok());

        ops.rescan(&mut session).unwrap();
        assert!(session.tree().node_at(&["b.bin"]).is_err());
        assert_eq!(session.tree().total_size(), 15);
    }
}
