use jwalk::WalkDir;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::tree::{NodeKind, Snapshot};

const PROGRESS_EMIT_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct FileNode {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub total_files: u64,
    pub total_dirs: u64,
    pub total_size: u64,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Discovering,
    Processing,
}

#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    pub discovered_entries: u64,
    pub processed_entries: u64,
    pub total_entries: Option<u64>,
    pub total_files: u64,
    pub total_dirs: u64,
    pub total_size: u64,
}

impl ScanProgress {
    pub fn starting() -> Self {
        Self {
            phase: ScanPhase::Discovering,
            discovered_entries: 0,
            processed_entries: 0,
            total_entries: None,
            total_files: 0,
            total_dirs: 0,
            total_size: 0,
        }
    }

    pub fn fraction(&self) -> Option<f32> {
        match self.phase {
            ScanPhase::Discovering => None,
            ScanPhase::Processing => {
                let total = self.total_entries?;
                if total == 0 {
                    Some(1.0)
                } else {
                    Some((self.processed_entries as f32 / total as f32).clamp(0.0, 1.0))
                }
            }
        }
    }
}

pub type ProgressReporter = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// Parallel file system crawler: jwalk discovers entries, rayon stats them.
pub struct FileCrawler {
    excluded: Arc<Vec<String>>,
    threads: usize,
    file_count: Arc<AtomicU64>,
    dir_count: Arc<AtomicU64>,
    total_size: Arc<AtomicU64>,
}

impl FileCrawler {
    pub fn new() -> Self {
        Self {
            excluded: Arc::new(Vec::new()),
            threads: Self::processing_parallelism(),
            file_count: Arc::new(AtomicU64::new(0)),
            dir_count: Arc::new(AtomicU64::new(0)),
            total_size: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Entry names that are skipped (together with their subtrees).
    pub fn with_excluded(mut self, names: Vec<String>) -> Self {
        self.excluded = Arc::new(names);
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        if let Some(n) = threads {
            self.threads = n.max(1);
        }
        self
    }

    fn emit_progress(reporter: &Option<ProgressReporter>, progress: ScanProgress) {
        if let Some(cb) = reporter {
            cb(progress);
        }
    }

    fn should_emit_progress(last_emit_ms: &AtomicU64, elapsed_ms: u64) -> bool {
        let previous = last_emit_ms.load(Ordering::Relaxed);
        if elapsed_ms.saturating_sub(previous) < PROGRESS_EMIT_INTERVAL_MS {
            return false;
        }

        last_emit_ms
            .compare_exchange(previous, elapsed_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    fn processing_parallelism() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores * 2).clamp(4, 64)
    }

    fn snapshot_progress(&self, phase: ScanPhase, discovered: u64, processed: u64, total: Option<u64>) -> ScanProgress {
        ScanProgress {
            phase,
            discovered_entries: discovered,
            processed_entries: processed,
            total_entries: total,
            total_files: self.file_count.load(Ordering::Relaxed),
            total_dirs: self.dir_count.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
        }
    }

    /// Scan a directory and build a flat list of all files/directories below
    /// it, in walk order (parents before children, siblings by name).
    pub fn scan_with_progress<P: AsRef<Path>>(
        &mut self,
        root: P,
        reporter: Option<ProgressReporter>,
    ) -> (Vec<FileNode>, ScanStats) {
        let root_path = root.as_ref().to_path_buf();
        let reporting_enabled = reporter.is_some();
        let start = Instant::now();

        // Reset counters
        self.file_count.store(0, Ordering::Relaxed);
        self.dir_count.store(0, Ordering::Relaxed);
        self.total_size.store(0, Ordering::Relaxed);

        let excluded = self.excluded.clone();
        let walker = WalkDir::new(&root_path)
            .skip_hidden(false)
            .sort(true)
            .parallelism(jwalk::Parallelism::RayonNewPool(self.threads))
            .process_read_dir(move |_, _, _, children| {
                children.retain(|entry| {
                    entry
                        .as_ref()
                        .map(|dir_entry| !Self::is_excluded(&excluded, &dir_entry.file_name.to_string_lossy()))
                        .unwrap_or(true)
                });
            })
            .into_iter();

        let mut entries = Vec::new();
        let mut discovered_entries = 0u64;
        let mut discovery_last_emit = Instant::now();

        for entry in walker.flatten() {
            if entry.depth == 0 {
                continue;
            }
            discovered_entries = discovered_entries.saturating_add(1);

            if reporting_enabled && discovery_last_emit.elapsed().as_millis() as u64 >= PROGRESS_EMIT_INTERVAL_MS {
                discovery_last_emit = Instant::now();
                Self::emit_progress(
                    &reporter,
                    self.snapshot_progress(ScanPhase::Discovering, discovered_entries, 0, None),
                );
            }
            entries.push(entry);
        }

        let total_entries = entries.len() as u64;
        Self::emit_progress(
            &reporter,
            self.snapshot_progress(ScanPhase::Processing, discovered_entries, 0, Some(total_entries)),
        );

        let processed_entries = AtomicU64::new(0);
        let processing_last_emit_ms = AtomicU64::new(0);
        let processing_started = Instant::now();

        let process_entries = || {
            entries
                .par_iter()
                .filter_map(|entry| {
                    let processed_now = processed_entries.fetch_add(1, Ordering::Relaxed) + 1;

                    let metadata = entry.metadata().ok()?;
                    let is_dir = metadata.is_dir();
                    let size = if is_dir { 0 } else { metadata.len() };

                    if is_dir {
                        self.dir_count.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.file_count.fetch_add(1, Ordering::Relaxed);
                        self.total_size.fetch_add(size, Ordering::Relaxed);
                    }

                    if let Some(cb) = reporter.as_ref() {
                        let elapsed_ms = processing_started.elapsed().as_millis() as u64;
                        if processed_now == total_entries
                            || Self::should_emit_progress(&processing_last_emit_ms, elapsed_ms)
                        {
                            cb(self.snapshot_progress(
                                ScanPhase::Processing,
                                discovered_entries,
                                processed_now,
                                Some(total_entries),
                            ));
                        }
                    }

                    Some(FileNode {
                        path: entry.path(),
                        size,
                        is_dir,
                    })
                })
                .collect::<Vec<_>>()
        };

        let nodes = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map(|pool| pool.install(process_entries))
            .unwrap_or_else(|_| process_entries());

        let stats = ScanStats {
            total_files: self.file_count.load(Ordering::Relaxed),
            total_dirs: self.dir_count.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
            duration_ms: start.elapsed().as_millis(),
        };

        tracing::debug!(
            root = %root_path.display(),
            files = stats.total_files,
            dirs = stats.total_dirs,
            ms = stats.duration_ms,
            "crawl finished"
        );

        (nodes, stats)
    }

    fn is_excluded(excluded: &[String], name: &str) -> bool {
        excluded.iter().any(|e| e == name)
    }
}

impl Default for FileCrawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the flat crawl output into a nested snapshot rooted at `root`.
/// Sibling order follows the order of `nodes`.
pub fn build_snapshot(root: &Path, nodes: Vec<FileNode>) -> Snapshot {
    let mut by_parent: HashMap<PathBuf, Vec<FileNode>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.path.parent() {
            by_parent.entry(parent.to_path_buf()).or_default().push(node);
        }
    }

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());

    assemble(root_name, NodeKind::Directory, 0, root, &mut by_parent)
}

fn assemble(
    name: String,
    kind: NodeKind,
    size: u64,
    path: &Path,
    by_parent: &mut HashMap<PathBuf, Vec<FileNode>>,
) -> Snapshot {
    match kind {
        NodeKind::File => Snapshot::file(name, size),
        NodeKind::Directory => {
            let entries = by_parent.remove(path).unwrap_or_default();
            let children = entries
                .into_iter()
                .map(|entry| {
                    let child_name = entry
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    let child_kind = if entry.is_dir { NodeKind::Directory } else { NodeKind::File };
                    assemble(child_name, child_kind, entry.size, &entry.path, by_parent)
                })
                .collect();
            Snapshot::dir(name, children)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_crawler_basic() {
        let mut crawler = FileCrawler::new();
        let (nodes, stats) = crawler.scan_with_progress(".", None);

        assert!(stats.total_files > 0 || stats.total_dirs > 0);
        assert!(!nodes.is_empty());
    }

    #[test]
    fn test_snapshot_sizes_and_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("a.txt"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("sub/b.bin"), vec![0u8; 32]).unwrap();
        fs::write(dir.path().join(".git/HEAD"), vec![0u8; 1000]).unwrap();

        let mut crawler = FileCrawler::new().with_excluded(vec![".git".to_string()]);
        let (nodes, stats) = crawler.scan_with_progress(dir.path(), None);
        assert_eq!(stats.total_files, 2);

        let snapshot = build_snapshot(dir.path(), nodes);
        assert_eq!(snapshot.kind, NodeKind::Directory);
        assert_eq!(snapshot.size, 42);
        let names: Vec<&str> = snapshot.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
        assert_eq!(snapshot.children[1].size, 32);
    }

    #[test]
    fn test_progress_reports_processing_phase() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one"), b"1").unwrap();

        let phases = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = phases.clone();
        let reporter: ProgressReporter = Arc::new(move |p: ScanProgress| {
            sink.lock().unwrap().push(p.phase);
        });

        let mut crawler = FileCrawler::new();
        crawler.scan_with_progress(dir.path(), Some(reporter));

        assert!(phases.lock().unwrap().contains(&ScanPhase::Processing));
    }
}
