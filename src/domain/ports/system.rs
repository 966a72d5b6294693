//! System port - abstraction over file I/O and file watching
//!
//! The compiler never touches the real file system directly. Everything goes
//! through this trait so an in-memory implementation can stand in for tests.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Result type for file system operations
pub type FsResult<T> = Result<T, FsError>;

/// File system operation errors
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// File not found
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Permission denied
    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(std::io::Error),
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl FsError {
    /// Convert an I/O error, attaching the path it happened on.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_path_buf()),
            _ => FsError::Io(err),
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(PathBuf::new()),
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(PathBuf::new()),
            _ => FsError::Io(err),
        }
    }
}

/// Callback invoked with the watched path whenever it changes.
///
/// Implementations may call it from a background thread.
pub type WatchCallback = Box<dyn Fn(&Path) + Send + 'static>;

/// Handle to a registered file watch
pub trait FileWatcher {
    /// The path being watched
    fn path(&self) -> &Path;

    /// Stop watching. Calling this twice is a no-op.
    fn close(&mut self);
}

/// Abstract host system interface
///
/// Implementations:
/// - `LocalSystem` - standard file I/O, polling watcher
/// - `MemorySystem` - in-memory for testing, watch events fired manually
pub trait System {
    /// Read file content as string
    fn read_file(&self, path: &Path) -> FsResult<String>;

    /// Write content to a file, creating parent directories
    fn write_file(&self, path: &Path, content: &str) -> FsResult<()>;

    /// Check if a regular file exists
    fn file_exists(&self, path: &Path) -> bool;

    /// Check if a directory exists
    fn directory_exists(&self, path: &Path) -> bool;

    /// List files under `path` recursively, sorted.
    ///
    /// When `extensions` is non-empty only files with one of those extensions
    /// (without the dot) are returned.
    fn read_directory(&self, path: &Path, extensions: &[&str]) -> FsResult<Vec<PathBuf>>;

    /// Last modification time reported by the host, if known
    fn modified_time(&self, path: &Path) -> Option<DateTime<Utc>>;

    /// Current working directory
    fn current_directory(&self) -> PathBuf;

    /// Resolve `path` against the current directory and normalize it
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.current_directory().join(path))
        }
    }

    /// Line terminator used when writing text
    fn new_line(&self) -> &'static str {
        "\n"
    }

    /// Whether `watch_file` is available on this host
    fn supports_watch(&self) -> bool {
        false
    }

    /// Watch a single file, polling every `interval`.
    fn watch_file(
        &self,
        path: &Path,
        _callback: WatchCallback,
        _interval: Duration,
    ) -> FsResult<Box<dyn FileWatcher>> {
        Err(FsError::Other(format!(
            "file watching is not supported on this system ({})",
            path.display()
        )))
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Does not touch the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Returns true when `path` has one of `extensions` (compared case-insensitively).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_error_display() {
        let err = FsError::NotFound(PathBuf::from("test.txt"));
        assert!(err.to_string().contains("test.txt"));
    }

    #[test]
    fn fs_error_from_io_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let fs_err = FsError::from_io(io_err, Path::new("/p/a.ts"));
        assert!(matches!(fs_err, FsError::NotFound(p) if p == Path::new("/p/a.ts")));
    }

    #[test]
    fn normalize_path_folds_parent_and_current() {
        assert_eq!(
            normalize_path(Path::new("/p/src/./lib/../a.ts")),
            PathBuf::from("/p/src/a.ts")
        );
    }

    #[test]
    fn has_extension_is_case_insensitive() {
        assert!(has_extension(Path::new("A.TS"), &["ts"]));
        assert!(!has_extension(Path::new("a.scss"), &["ts", "tsx"]));
        assert!(has_extension(Path::new("anything"), &[]));
    }
}
