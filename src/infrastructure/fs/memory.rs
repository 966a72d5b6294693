//! In-memory `System` for tests and embedding
//!
//! Files live in a sorted map keyed by absolute path. Watch callbacks are
//! only invoked when `notify` is called, which lets tests simulate change
//! events deterministically.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ports::{
    has_extension, normalize_path, FileWatcher, FsError, FsResult, System, WatchCallback,
};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: String,
    modified: DateTime<Utc>,
}

struct MemoryWatch {
    path: PathBuf,
    callback: WatchCallback,
    active: Rc<Cell<bool>>,
}

/// In-memory file system
pub struct MemorySystem {
    cwd: PathBuf,
    files: RefCell<BTreeMap<PathBuf, MemoryFile>>,
    watches: RefCell<Vec<MemoryWatch>>,
    watch_supported: bool,
}

impl MemorySystem {
    /// Create an empty file system with `cwd` as current directory
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: normalize_path(&cwd.into()),
            files: RefCell::new(BTreeMap::new()),
            watches: RefCell::new(Vec::new()),
            watch_supported: true,
        }
    }

    /// Disable the watch primitive
    pub fn without_watch(mut self) -> Self {
        self.watch_supported = false;
        self
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        self.resolve_path(path)
    }

    /// Create or overwrite a file
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = self.absolute(path.as_ref());
        self.files.borrow_mut().insert(
            path,
            MemoryFile {
                content: content.into(),
                modified: Utc::now(),
            },
        );
    }

    /// Delete a file. Returns whether it existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute(path.as_ref());
        self.files.borrow_mut().remove(&path).is_some()
    }

    /// Content of a file, if present
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = self.absolute(path.as_ref());
        self.files.borrow().get(&path).map(|f| f.content.clone())
    }

    /// Every file path, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }

    /// Fire change callbacks for `path`. Returns how many watchers ran.
    pub fn notify(&self, path: impl AsRef<Path>) -> usize {
        let path = self.absolute(path.as_ref());
        let watches = self.watches.borrow();
        let mut fired = 0;
        for watch in watches.iter() {
            if watch.active.get() && watch.path == path {
                (watch.callback)(&path);
                fired += 1;
            }
        }
        fired
    }

    /// Number of watchers not yet closed
    pub fn active_watch_count(&self) -> usize {
        self.watches
            .borrow()
            .iter()
            .filter(|w| w.active.get())
            .count()
    }
}

impl System for MemorySystem {
    fn read_file(&self, path: &Path) -> FsResult<String> {
        let path = self.absolute(path);
        self.files
            .borrow()
            .get(&path)
            .map(|f| f.content.clone())
            .ok_or(FsError::NotFound(path))
    }

    fn write_file(&self, path: &Path, content: &str) -> FsResult<()> {
        self.add_file(path, content);
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        let path = self.absolute(path);
        self.files.borrow().contains_key(&path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        let dir = self.absolute(path);
        self.files
            .borrow()
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }

    fn read_directory(&self, path: &Path, extensions: &[&str]) -> FsResult<Vec<PathBuf>> {
        let dir = self.absolute(path);
        if !self.directory_exists(&dir) {
            return Err(FsError::NotFound(dir));
        }
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|file| file.starts_with(&dir) && has_extension(file, extensions))
            .cloned()
            .collect())
    }

    fn modified_time(&self, path: &Path) -> Option<DateTime<Utc>> {
        let path = self.absolute(path);
        self.files.borrow().get(&path).map(|f| f.modified)
    }

    fn current_directory(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn supports_watch(&self) -> bool {
        self.watch_supported
    }

    fn watch_file(
        &self,
        path: &Path,
        callback: WatchCallback,
        _interval: Duration,
    ) -> FsResult<Box<dyn FileWatcher>> {
        if !self.watch_supported {
            return Err(FsError::Other(
                "file watching is not supported on this system".to_string(),
            ));
        }
        let path = self.absolute(path);
        let active = Rc::new(Cell::new(true));
        self.watches.borrow_mut().push(MemoryWatch {
            path: path.clone(),
            callback,
            active: Rc::clone(&active),
        });
        Ok(Box::new(MemoryWatcher { path, active }))
    }
}

/// Handle returned by `MemorySystem::watch_file`
pub struct MemoryWatcher {
    path: PathBuf,
    active: Rc<Cell<bool>>,
}

impl FileWatcher for MemoryWatcher {
    fn path(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) {
        self.active.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let system = MemorySystem::new("/p");
        system.add_file("src/a.ts", "x");
        assert!(system.file_exists(Path::new("/p/src/a.ts")));
        assert_eq!(system.read_file(Path::new("./src/a.ts")).unwrap(), "x");
    }

    #[test]
    fn read_directory_filters_and_sorts() {
        let system = MemorySystem::new("/p");
        system.add_file("/p/src/b.ts", "");
        system.add_file("/p/src/nested/a.tsx", "");
        system.add_file("/p/src/style.css", "");
        system.add_file("/p/srcx/c.ts", "");

        let files = system
            .read_directory(Path::new("/p/src"), &["ts", "tsx"])
            .unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/p/src/b.ts"),
                PathBuf::from("/p/src/nested/a.tsx")
            ]
        );
        assert!(system.read_directory(Path::new("/p/none"), &[]).is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let system = MemorySystem::new("/p");
        assert!(matches!(
            system.read_file(Path::new("/p/a.ts")),
            Err(FsError::NotFound(_))
        ));
        assert!(system.modified_time(Path::new("/p/a.ts")).is_none());
    }

    #[test]
    fn notify_runs_active_watchers_only() {
        let system = MemorySystem::new("/p");
        let (tx, rx) = channel();
        let mut watcher = system
            .watch_file(
                Path::new("/p/a.ts"),
                Box::new(move |p: &Path| {
                    let _ = tx.send(p.to_path_buf());
                }),
                Duration::from_millis(50),
            )
            .unwrap();

        assert_eq!(system.notify("/p/a.ts"), 1);
        assert_eq!(rx.try_recv().unwrap(), PathBuf::from("/p/a.ts"));
        assert_eq!(system.notify("/p/b.ts"), 0);

        watcher.close();
        assert_eq!(system.notify("/p/a.ts"), 0);
        assert_eq!(system.active_watch_count(), 0);
    }

    #[test]
    fn watch_can_be_disabled() {
        let system = MemorySystem::new("/p").without_watch();
        assert!(!system.supports_watch());
        let result = system.watch_file(
            Path::new("/p/a.ts"),
            Box::new(|_: &Path| {}),
            Duration::from_millis(50),
        );
        assert!(result.is_err());
    }
}
