//! Recursive filesystem watcher feeding external changes back into a session.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::error::Result;

pub struct FsWatcher {
    // Dropping the watcher stops event delivery
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
}

impl FsWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching for changes");
        Ok(Self { _watcher: watcher, rx })
    }

    /// Paths touched since the last call, sorted and deduplicated. Access
    /// events are ignored.
    pub fn drain(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    paths.extend(event.paths);
                }
                Ok(Err(err)) => tracing::warn!(error = %err, "watch error"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        paths.sort();
        paths.dedup();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_drain_reports_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let watcher = FsWatcher::new(&root).unwrap();
        std::fs::write(root.join("fresh.txt"), b"hello").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline && seen.is_empty() {
            std::thread::sleep(Duration::from_millis(50));
            seen = watcher.drain();
        }
        assert!(seen.iter().any(|p| p.ends_with("fresh.txt")), "{:?}", seen);
    }
}
