//! Filesystem collaborator used by the scanner and the file operations.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::crawler::{build_snapshot, FileCrawler, ProgressReporter, ScanStats};
use crate::tree::Snapshot;

/// The primitive operations the core relies on. Only their success or
/// failure is observed; implementations are free to do anything else.
pub trait FileSystem: Send + Sync {
    fn scan(&self, path: &Path) -> io::Result<Snapshot>;
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Creates a new file. Fails if `path` already exists.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn mkdir(&self, path: &Path) -> io::Result<()>;
    /// Removes a file, or a directory with everything below it.
    fn remove(&self, path: &Path) -> io::Result<()>;
    /// Never replaces an existing `to`. On failure nothing has changed,
    /// unless `to` now exists next to `from`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows.
fn crosses_devices(err: &io::Error) -> bool {
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17;
    #[cfg(not(windows))]
    const CROSS_DEVICE: i32 = 18;
    err.raw_os_error() == Some(CROSS_DEVICE)
}

/// The local disk.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    excluded: Vec<String>,
    threads: Option<usize>,
}

impl LocalFs {
    pub fn new(excluded: Vec<String>, threads: Option<usize>) -> Self {
        Self { excluded, threads }
    }

    fn crawler(&self) -> FileCrawler {
        FileCrawler::new()
            .with_excluded(self.excluded.clone())
            .with_threads(self.threads)
    }

    /// Scan with progress callbacks; used for the initial scan in the UIs.
    pub fn scan_with_progress(&self, path: &Path, reporter: Option<ProgressReporter>) -> io::Result<(Snapshot, ScanStats)> {
        let metadata = fs::symlink_metadata(path)?;
        if !metadata.is_dir() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            let stats = ScanStats {
                total_files: 1,
                total_size: metadata.len(),
                ..ScanStats::default()
            };
            return Ok((Snapshot::file(name, metadata.len()), stats));
        }

        let (nodes, stats) = self.crawler().scan_with_progress(path, reporter);
        Ok((build_snapshot(path, nodes), stats))
    }

    fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
        if fs::symlink_metadata(from)?.is_dir() {
            fs::create_dir(to)?;
            for entry in fs::read_dir(from)? {
                let entry = entry?;
                Self::copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
            }
            Ok(())
        } else {
            fs::copy(from, to).map(|_| ())
        }
    }
}

impl FileSystem for LocalFs {
    fn scan(&self, path: &Path) -> io::Result<Snapshot> {
        self.scan_with_progress(path, None).map(|(snapshot, _)| snapshot)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(bytes)
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.exists(to) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err) if crosses_devices(&err) => {
                tracing::debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying instead");
                if let Err(copy_err) = Self::copy_recursive(from, to) {
                    // Drop the half-made copy so `from` stays the only one
                    if self.exists(to) {
                        if let Err(cleanup) = self.remove(to) {
                            tracing::warn!(path = %to.display(), error = %cleanup, "could not remove partial copy");
                        }
                    }
                    return Err(copy_err);
                }
                self.remove(from)
            }
            Err(err) => Err(err),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;

    #[test]
    fn test_scan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("draft.pptx");
        fs::write(&file, vec![1u8; 58]).unwrap();

        let snapshot = LocalFs::default().scan(&file).unwrap();
        assert_eq!(snapshot.name, "draft.pptx");
        assert_eq!(snapshot.kind, NodeKind::File);
        assert_eq!(snapshot.size, 58);
        assert!(snapshot.children.is_empty());
    }

    #[test]
    fn test_scan_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFs::default().scan(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let fs_ = LocalFs::default();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/f"), b"x").unwrap();

        fs_.rename(&dir.path().join("a"), &dir.path().join("c")).unwrap();
        assert!(fs_.exists(&dir.path().join("c/b/f")));
        fs_.remove(&dir.path().join("c")).unwrap();
        assert!(!fs_.exists(&dir.path().join("c")));
    }

    #[test]
    fn test_failed_rename_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fs_ = LocalFs::default();
        let a = dir.path().join("a");
        fs::create_dir_all(a.join("b")).unwrap();
        fs::write(a.join("f"), b"x").unwrap();

        // Same device, refused by the OS: no copy must be attempted
        let err = fs_.rename(&a, &a.join("b/a")).unwrap_err();
        assert!(!crosses_devices(&err));
        assert!(!fs_.exists(&a.join("b/a")));
        assert_eq!(fs::read(a.join("f")).unwrap(), b"x");
    }

    #[test]
    fn test_existing_targets_are_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let fs_ = LocalFs::default();
        let (one, two) = (dir.path().join("one"), dir.path().join("two"));
        fs_.write_bytes(&one, b"1111").unwrap();
        fs_.write_bytes(&two, b"22").unwrap();

        let err = fs_.write_bytes(&one, b"overwritten").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        let err = fs_.rename(&two, &one).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        assert_eq!(fs::read(&one).unwrap(), b"1111");
        assert_eq!(fs::read(&two).unwrap(), b"22");
    }
}
