//! Watch mode
//!
//! Watches are registered through the `System` port with a fixed polling
//! interval. Change notifications arrive on a channel (callbacks may fire on
//! a background thread) and are processed on the compiler's thread, either
//! one at a time through `on_file_changed` or debounced by `run_watch`.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::application::context::WatchRegistrar;
use crate::domain::ports::{FileWatcher, System};
use crate::domain::Diagnostic;
use crate::engine::is_source_file;
use crate::error::{TspipeError, TspipeResult};

use super::{Compiler, EmitResult};

/// Polling interval handed to `System::watch_file`
pub const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Debounce duration in milliseconds
pub const DEBOUNCE_MS: u64 = 100;

/// Every watcher registered by one compiler
pub(super) struct WatchSet {
    system: Rc<dyn System>,
    sender: Sender<PathBuf>,
    watchers: RefCell<Vec<Box<dyn FileWatcher>>>,
}

impl WatchSet {
    pub(super) fn new(system: Rc<dyn System>, sender: Sender<PathBuf>) -> Self {
        Self {
            system,
            sender,
            watchers: RefCell::new(Vec::new()),
        }
    }

    /// Watch `path` unless it is already watched. Returns whether a new
    /// watcher was registered.
    pub(super) fn watch(&self, path: &Path) -> TspipeResult<bool> {
        if self.watchers.borrow().iter().any(|w| w.path() == path) {
            return Ok(false);
        }
        let sender = self.sender.clone();
        let watcher = self
            .system
            .watch_file(
                path,
                Box::new(move |changed: &Path| {
                    let _ = sender.send(changed.to_path_buf());
                }),
                WATCH_INTERVAL,
            )
            .map_err(|e| TspipeError::Watch {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(path = %path.display(), "watching");
        self.watchers.borrow_mut().push(watcher);
        Ok(true)
    }

    /// Registration callback handed to compilation contexts
    pub(super) fn registrar(set: &Rc<Self>) -> WatchRegistrar {
        let set = Rc::clone(set);
        Rc::new(move |path: &Path| set.watch(path).map(|_| ()))
    }

    pub(super) fn close_all(&self) -> usize {
        let mut watchers = self.watchers.borrow_mut();
        for watcher in watchers.iter_mut() {
            watcher.close();
        }
        let count = watchers.len();
        watchers.clear();
        count
    }

    pub(super) fn len(&self) -> usize {
        self.watchers.borrow().len()
    }
}

/// Collects change notifications until they settle
#[derive(Debug, Default)]
pub struct WatcherState {
    pending_changes: BTreeSet<PathBuf>,
    last_change: Option<Instant>,
}

impl WatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file change to pending changes
    pub fn add_change(&mut self, path: PathBuf) {
        self.pending_changes.insert(path);
        self.last_change = Some(Instant::now());
    }

    /// Check if debounce period has passed and we have pending changes
    pub fn should_sync(&self) -> bool {
        match self.last_change {
            Some(last) => {
                !self.pending_changes.is_empty()
                    && last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
            }
            None => false,
        }
    }

    /// Take all pending changes in path order, resetting state
    pub fn take_changes(&mut self) -> Vec<PathBuf> {
        self.last_change = None;
        std::mem::take(&mut self.pending_changes)
            .into_iter()
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_changes.is_empty()
    }
}

fn status(compiler: &Compiler, message: String) {
    if let Some(options) = compiler.options.as_ref() {
        options
            .reporter
            .report_watch_status(&Diagnostic::message(message), compiler.system.new_line());
    }
}

impl Compiler {
    /// Seed output for every writing target, then watch every root file.
    ///
    /// When the host system has no watch primitive an error diagnostic is
    /// reported and the seeding result is returned without watchers.
    pub fn watch(&mut self) -> TspipeResult<EmitResult> {
        self.ensure_contexts()?;
        let reporter = Rc::clone(&self.require_options()?.reporter);

        let mut result = EmitResult::default();
        for target in self.emit_targets()? {
            let context = self.context_for(&target)?;
            result.merge(self.compile_target(&context, true)?);
        }

        if !self.system.supports_watch() {
            let diagnostic =
                Diagnostic::error("File watching is not supported by the current system.");
            reporter.report_diagnostic(&diagnostic);
            result.diagnostics.push(diagnostic);
            return Ok(result);
        }

        for target in self.active_targets()? {
            let context = self.context_for(&target)?;
            for path in context.root_files() {
                if let Err(e) = self.watches.watch(&path) {
                    warn!(error = %e, "watch registration failed");
                    reporter.report_diagnostic(&Diagnostic::error(e.to_string()).with_file(path));
                }
            }
        }

        info!(watchers = self.watches.len(), "watching for changes");
        status(
            self,
            format!(
                "Found {} error(s). Watching for file changes.",
                result.error_count()
            ),
        );
        Ok(result)
    }

    /// Process one change notification.
    ///
    /// A source file is force-recompiled for every writing target that has
    /// it as a root. Any other file is mapped to its dependents through each
    /// context's `resolve_dependency`, which are force-recompiled instead.
    /// Deleted files are evicted from the cache. Roots that generators add
    /// during the pass are compiled and watched too.
    pub fn on_file_changed(&self, path: &Path) -> TspipeResult<EmitResult> {
        let path = self.system.resolve_path(path);
        status(
            self,
            format!(
                "File change detected: {}. Starting incremental compilation...",
                path.display()
            ),
        );

        let is_source = is_source_file(&path);
        let mut result = EmitResult::default();
        for target in self.emit_targets()? {
            let context = self.context_for(&target)?;
            let files: Vec<PathBuf> = if is_source {
                if context.is_root_file(&path) {
                    vec![path.clone()]
                } else {
                    Vec::new()
                }
            } else {
                context
                    .resolve_dependency(&path)
                    .iter()
                    .map(|dep| self.system.resolve_path(&context.project_root().join(dep)))
                    .collect()
            };
            if files.is_empty() {
                continue;
            }

            let known_roots = context.root_file_count();
            let mut target_result = EmitResult::default();
            let mut compiled = Vec::new();
            for file in files {
                if !self.system.file_exists(&file) {
                    self.cache.remove_cached_file(&file, &target);
                    debug!(path = %file.display(), target_name = %target, "evicted deleted file");
                    continue;
                }
                let output = self.compile_in_context(&context, &file, true)?;
                target_result.emit_skipped |= output.emit_skipped;
                target_result.emitted_files.extend(output.output_files);
                target_result.diagnostics.extend(output.diagnostics);
                compiled.push(file);
            }

            // Roots added by generators during this pass
            let mut index = known_roots;
            while let Some(added) = context.root_file(index) {
                index += 1;
                let output = self.compile_in_context(&context, &added, true)?;
                target_result.emit_skipped |= output.emit_skipped;
                target_result.emitted_files.extend(output.output_files);
                target_result.diagnostics.extend(output.diagnostics);
                if self.system.supports_watch() {
                    if let Err(e) = self.watches.watch(&added) {
                        warn!(error = %e, "watch registration failed");
                        let diagnostic = Diagnostic::error(e.to_string()).with_file(added.clone());
                        context.reporter().report_diagnostic(&diagnostic);
                    }
                }
                compiled.push(added);
            }
            self.finish_target(&context, &compiled, &mut target_result)?;
            result.merge(target_result);
        }

        status(
            self,
            format!(
                "Found {} error(s). Watching for file changes.",
                result.error_count()
            ),
        );
        Ok(result)
    }

    /// Process every notification already queued, without debouncing.
    /// Duplicate paths are coalesced.
    pub fn drain_changes(&self) -> TspipeResult<EmitResult> {
        let mut state = WatcherState::new();
        while let Ok(path) = self.changes.try_recv() {
            state.add_change(path);
        }
        let mut result = EmitResult::default();
        for path in state.take_changes() {
            result.merge(self.on_file_changed(&path)?);
        }
        Ok(result)
    }

    /// Block processing debounced notifications until `running` is cleared,
    /// then close every watcher. Failures of a single pass are reported and
    /// watching continues.
    pub fn run_watch(&mut self, running: Arc<AtomicBool>) -> TspipeResult<()> {
        let reporter = Rc::clone(&self.require_options()?.reporter);
        let mut state = WatcherState::new();

        while running.load(Ordering::SeqCst) {
            match self.changes.recv_timeout(WATCH_INTERVAL) {
                Ok(path) => state.add_change(path),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !state.should_sync() {
                continue;
            }
            for path in state.take_changes() {
                if let Err(e) = self.on_file_changed(&path) {
                    warn!(path = %path.display(), error = %e, "incremental compile failed");
                    reporter.report_diagnostic(&Diagnostic::error(e.to_string()));
                }
            }
        }

        let closed = self.close_watchers();
        info!(closed, "watch stopped");
        Ok(())
    }

    /// Close every registered watcher. Returns how many were closed.
    pub fn close_watchers(&mut self) -> usize {
        self.watches.close_all()
    }

    pub fn watcher_count(&self) -> usize {
        self.watches.len()
    }
}
