//! Local file system implementation of the `System` port
//!
//! Writes are atomic (temp file + rename). Directory listings go through
//! `ignore`, so `.gitignore`, `.ignore` and `.tspipeignore` files are
//! honored. Watching uses notify's `PollWatcher` with content comparison.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::domain::output_file::UTF8_BOM;
use crate::domain::ports::{
    has_extension, normalize_path, FileWatcher, FsError, FsResult, System, WatchCallback,
};

/// Per-directory ignore file read when listing directories
pub const IGNORE_FILE_NAME: &str = ".tspipeignore";

/// Local file system
#[derive(Debug, Clone)]
pub struct LocalSystem {
    cwd: PathBuf,
}

impl Default for LocalSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSystem {
    /// Use the process working directory
    pub fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { cwd }
    }

    /// Use `cwd` as the working directory for relative paths
    pub fn with_current_directory(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: normalize_path(&cwd.into()),
        }
    }

    fn atomic_write(&self, path: &Path, content: &str) -> FsResult<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => self.cwd.clone(),
        };
        std::fs::create_dir_all(&parent).map_err(|e| FsError::from_io(e, &parent))?;

        let mut temp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| FsError::from_io(e, &parent))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| FsError::from_io(e, path))?;
        temp.flush().map_err(|e| FsError::from_io(e, path))?;
        temp.persist(path)
            .map_err(|e| FsError::from_io(e.error, path))?;
        Ok(())
    }
}

impl System for LocalSystem {
    fn read_file(&self, path: &Path) -> FsResult<String> {
        let path = self.resolve_path(path);
        let content = std::fs::read_to_string(&path).map_err(|e| FsError::from_io(e, &path))?;
        Ok(match content.strip_prefix(UTF8_BOM) {
            Some(stripped) => stripped.to_string(),
            None => content,
        })
    }

    fn write_file(&self, path: &Path, content: &str) -> FsResult<()> {
        let path = self.resolve_path(path);
        self.atomic_write(&path, content)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.resolve_path(path).is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.resolve_path(path).is_dir()
    }

    fn read_directory(&self, path: &Path, extensions: &[&str]) -> FsResult<Vec<PathBuf>> {
        let dir = self.resolve_path(path);
        if !dir.is_dir() {
            return Err(FsError::NotFound(dir));
        }
        let walker = ignore::WalkBuilder::new(&dir)
            .require_git(false)
            .add_custom_ignore_filename(IGNORE_FILE_NAME)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && has_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn modified_time(&self, path: &Path) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(self.resolve_path(path))
            .and_then(|m| m.modified())
            .ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    fn current_directory(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn supports_watch(&self) -> bool {
        true
    }

    fn watch_file(
        &self,
        path: &Path,
        callback: WatchCallback,
        interval: Duration,
    ) -> FsResult<Box<dyn FileWatcher>> {
        let path = self.resolve_path(path);
        let config = Config::default()
            .with_poll_interval(interval)
            .with_compare_contents(true);

        let mut watcher = PollWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                    for changed in &event.paths {
                        callback(changed);
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "poll watcher error"),
            },
            config,
        )
        .map_err(|e| FsError::Other(e.to_string()))?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| FsError::Other(e.to_string()))?;

        Ok(Box::new(LocalWatcher {
            path,
            watcher: Some(watcher),
        }))
    }
}

/// Handle to one polling watch
pub struct LocalWatcher {
    path: PathBuf,
    watcher: Option<PollWatcher>,
}

impl FileWatcher for LocalWatcher {
    fn path(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.path);
        }
    }
}

impl Drop for LocalWatcher {
    fn drop(&mut self) {
        self.close();
    }
}
