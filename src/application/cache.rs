//! Per-file, per-target compile cache
//!
//! Answers "has this file changed since it was last compiled for this
//! target, and what did that compile produce". Change detection compares
//! content, not modification times.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::domain::ports::System;
use crate::domain::OutputFile;
use crate::engine::ScriptSnapshot;

/// Cache record for one (file, target) pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// Bumped every time the source or its processed text changes
    pub version: u64,
    /// Raw text last read from the file system
    pub source_content: String,
    /// Text handed to the engine (source after processors)
    pub snapshot: Option<Rc<ScriptSnapshot>>,
    /// Wall-clock time of the last source update
    pub modified_time: Option<DateTime<Utc>>,
    /// Output of the most recent non-skipped emit
    pub output_files: Vec<OutputFile>,
    /// The last compile produced no output
    pub emit_failed: bool,
}

type CacheKey = (PathBuf, String);

/// Shared compile cache. One instance serves every target of a compiler;
/// entries are keyed by path and target so targets never collide.
pub struct FileCache {
    system: Rc<dyn System>,
    entries: RefCell<HashMap<CacheKey, CacheEntry>>,
}

impl FileCache {
    pub fn new(system: Rc<dyn System>) -> Self {
        Self {
            system,
            entries: RefCell::new(HashMap::new()),
        }
    }

    fn key(path: &Path, target: &str) -> CacheKey {
        (path.to_path_buf(), target.to_string())
    }

    /// The entry for `path` under `target`, or an empty one (version 0).
    pub fn get_cached_file(&self, path: &Path, target: &str) -> CacheEntry {
        self.entries
            .borrow()
            .get(&Self::key(path, target))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, path: &Path, target: &str) -> bool {
        self.entries.borrow().contains_key(&Self::key(path, target))
    }

    /// True when there is no entry, no snapshot, the last compile failed,
    /// or the file's current content differs from the cached source.
    /// Unreadable files count as changed.
    pub fn has_changed(&self, path: &Path, target: &str) -> bool {
        let entries = self.entries.borrow();
        let Some(entry) = entries.get(&Self::key(path, target)) else {
            return true;
        };
        if entry.snapshot.is_none() || entry.emit_failed {
            return true;
        }
        match self.system.read_file(path) {
            Ok(current) => current != entry.source_content,
            Err(_) => true,
        }
    }

    /// Record new source text. Returns whether anything changed.
    pub fn update_source(&self, path: &Path, content: &str, target: &str) -> bool {
        self.update_source_processed(path, content, content, target)
    }

    /// Record the raw source together with the processed text the engine
    /// compiles. The version is bumped when either differs from the cached
    /// values or no snapshot exists yet.
    pub fn update_source_processed(
        &self,
        path: &Path,
        source: &str,
        processed: &str,
        target: &str,
    ) -> bool {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(Self::key(path, target)).or_default();
        let unchanged = entry.source_content == source
            && entry
                .snapshot
                .as_ref()
                .is_some_and(|snapshot| snapshot.text() == processed);
        if unchanged {
            return false;
        }
        entry.version += 1;
        entry.source_content = source.to_string();
        entry.snapshot = Some(Rc::new(ScriptSnapshot::from_text(processed)));
        entry.modified_time = Some(Utc::now());
        trace!(path = %path.display(), target_name = target, version = entry.version, "source updated");
        true
    }

    /// Create an empty entry if none exists
    pub fn ensure_entry(&self, path: &Path, target: &str) {
        self.entries
            .borrow_mut()
            .entry(Self::key(path, target))
            .or_default();
    }

    /// Drop the snapshot so the next `update_source` bumps the version.
    /// Cached output is kept.
    pub fn mark_stale(&self, path: &Path, target: &str) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(&Self::key(path, target)) {
            entry.snapshot = None;
        }
    }

    /// Replace cached output and clear a previous failure. No-op when the
    /// file has no entry.
    pub fn update_output(&self, path: &Path, output_files: Vec<OutputFile>, target: &str) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(&Self::key(path, target)) {
            entry.output_files = output_files;
            entry.emit_failed = false;
        }
    }

    /// Remember that the last compile of `path` produced no output, so the
    /// next pass compiles it again even if its content is unchanged.
    pub fn mark_emit_failed(&self, path: &Path, target: &str) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(&Self::key(path, target)) {
            entry.emit_failed = true;
        }
    }

    pub fn get_version(&self, path: &Path, target: &str) -> u64 {
        self.entries
            .borrow()
            .get(&Self::key(path, target))
            .map(|e| e.version)
            .unwrap_or(0)
    }

    pub fn get_snapshot(&self, path: &Path, target: &str) -> Option<Rc<ScriptSnapshot>> {
        self.entries
            .borrow()
            .get(&Self::key(path, target))
            .and_then(|e| e.snapshot.clone())
    }

    /// Output files cached for `path`, empty when unknown
    pub fn get_output(&self, path: &Path, target: &str) -> Vec<OutputFile> {
        self.entries
            .borrow()
            .get(&Self::key(path, target))
            .map(|e| e.output_files.clone())
            .unwrap_or_default()
    }

    /// Evict an entry, e.g. after the file was deleted
    pub fn remove_cached_file(&self, path: &Path, target: &str) -> Option<CacheEntry> {
        self.entries.borrow_mut().remove(&Self::key(path, target))
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}
