//! Compiler orchestrator
//!
//! Owns one `CompilationContext` per active target and drives the
//! generate -> process -> compile -> write -> post-process pipeline.
//!
//! ## States
//!
//! - `Uninitialized`: no options yet
//! - `OptionsSet`: options known, no contexts
//! - `ContextsCreated`: one context per active target, addons activated
//!
//! `compile()` and `watch()` create contexts lazily. `set_options()` closes
//! every watcher and drops contexts and cache, returning to `OptionsSet`.
//!
//! Files whose content has not changed since the last pass are served from
//! the cache: generators and processors do not run for them again. Addons
//! with side effects are therefore not guaranteed to re-run on unchanged
//! input. Result processors still run once per target per pass. Files whose
//! last compile failed are always compiled again.
//!
//! Roots that generators add during a watch recompile are compiled in the
//! same pass and watched from then on.

mod options;
mod watch;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver};

use tracing::{debug, info};

use crate::application::cache::FileCache;
use crate::application::context::{CompilationContext, ContextSetup};
use crate::domain::ports::System;
use crate::domain::{is_wildcard, Diagnostic, OutputFile};
use crate::engine::lexical::json_output;
use crate::engine::{
    is_json_file, output_path_for, EmitOutput, LanguageService, LexicalService,
    LexicalTranspiler, TranspileOptions, Transpiler,
};
use crate::error::{TspipeError, TspipeResult};

pub use options::{CompilerOptions, EmitResult};
pub use watch::{WatcherState, DEBOUNCE_MS, WATCH_INTERVAL};

use watch::WatchSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerState {
    Uninitialized,
    OptionsSet,
    ContextsCreated,
}

pub struct Compiler {
    system: Rc<dyn System>,
    service: Rc<dyn LanguageService>,
    transpiler: Rc<dyn Transpiler>,
    options: Option<CompilerOptions>,
    state: CompilerState,
    cache: Rc<FileCache>,
    contexts: HashMap<String, Rc<CompilationContext>>,
    watches: Rc<WatchSet>,
    changes: Receiver<PathBuf>,
}

impl Compiler {
    pub fn new(
        system: Rc<dyn System>,
        service: Rc<dyn LanguageService>,
        transpiler: Rc<dyn Transpiler>,
    ) -> Self {
        let (sender, changes) = channel();
        Self {
            cache: Rc::new(FileCache::new(Rc::clone(&system))),
            watches: Rc::new(WatchSet::new(Rc::clone(&system), sender)),
            system,
            service,
            transpiler,
            options: None,
            state: CompilerState::Uninitialized,
            contexts: HashMap::new(),
            changes,
        }
    }

    /// A compiler backed by the built-in lexical engine
    pub fn with_lexical_engine(system: Rc<dyn System>) -> Self {
        Self::new(
            system,
            Rc::new(LexicalService::new()),
            Rc::new(LexicalTranspiler::new()),
        )
    }

    /// Install new options. Watchers registered under the previous options
    /// are closed, contexts and cache are dropped.
    pub fn set_options(&mut self, options: CompilerOptions) {
        let closed = self.close_watchers();
        if closed > 0 {
            debug!(closed, "closed watchers of previous options");
        }
        self.contexts.clear();
        self.cache = Rc::new(FileCache::new(Rc::clone(&self.system)));
        self.options = Some(options);
        self.state = CompilerState::OptionsSet;
    }

    pub fn state(&self) -> CompilerState {
        self.state
    }

    pub fn options(&self) -> Option<&CompilerOptions> {
        self.options.as_ref()
    }

    pub fn cache(&self) -> &Rc<FileCache> {
        &self.cache
    }

    pub fn context(&self, target: &str) -> Option<Rc<CompilationContext>> {
        self.contexts.get(target).cloned()
    }

    fn require_options(&self) -> TspipeResult<&CompilerOptions> {
        self.options.as_ref().ok_or(TspipeError::NotConfigured)
    }

    fn context_for(&self, target: &str) -> TspipeResult<Rc<CompilationContext>> {
        self.context(target).ok_or_else(|| TspipeError::MissingContext {
            target: target.to_string(),
        })
    }

    fn active_targets(&self) -> TspipeResult<Vec<String>> {
        Ok(self.require_options()?.active_targets())
    }

    /// Active targets that write their output
    fn emit_targets(&self) -> TspipeResult<Vec<String>> {
        let mut targets = Vec::new();
        for target in self.active_targets()? {
            if self.context_for(&target)?.writes_files() {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    /// Create a context for every active target that lacks one
    pub fn ensure_contexts(&mut self) -> TspipeResult<()> {
        for target in self.active_targets()? {
            if self.contexts.contains_key(&target) {
                continue;
            }
            let context = self.create_context(&target)?;
            self.contexts.insert(target, Rc::new(context));
        }
        self.state = CompilerState::ContextsCreated;
        Ok(())
    }

    fn create_context(&self, target: &str) -> TspipeResult<CompilationContext> {
        let options = self.require_options()?;
        let target_config = options.config.target(target).cloned().unwrap_or_default();

        let mut project_options = options
            .project_options()
            .merged_with(&target_config.compiler_options);
        project_options.resolve_paths(self.system.as_ref(), &options.project_root);

        let root_files = options
            .config
            .root_files(self.system.as_ref(), &options.project_root)?;
        let transpile_only = options.transpile_only
            || target_config.transpile_only.unwrap_or(false)
            || project_options.transpile_only_enabled();

        let mut context = CompilationContext::new(ContextSetup {
            target: target.to_string(),
            options: project_options,
            project_root: options.project_root.clone(),
            root_files,
            config: target_config,
            transpile_only,
            debug: options.debug,
            cache: Rc::clone(&self.cache),
            system: Rc::clone(&self.system),
            reporter: Rc::clone(&options.reporter),
            service: Rc::clone(&self.service),
            watch: (options.watch && self.system.supports_watch())
                .then(|| WatchSet::registrar(&self.watches)),
            dependency_resolver: options.dependency_resolver.clone(),
        });

        let lookup = (!is_wildcard(target)).then_some(target);
        for addon in options.addons.get_addons(lookup) {
            debug!(addon = addon.name(), target_name = target, "activating addon");
            addon.activate(&mut context)?;
        }
        debug!(?context, "compilation context created");
        Ok(context)
    }

    /// Compile every root file of every active target.
    ///
    /// Unchanged files are served from the cache. The result is skipped when
    /// any target was skipped or no target ran at all.
    pub fn compile(&mut self) -> TspipeResult<EmitResult> {
        self.ensure_contexts()?;
        let mut result = EmitResult::default();
        let mut ran = 0usize;
        for target in self.active_targets()? {
            let context = self.context_for(&target)?;
            result.merge(self.compile_target(&context, false)?);
            ran += 1;
        }
        if ran == 0 {
            result.emit_skipped = true;
        }
        info!(
            targets = ran,
            emitted = result.emitted_files.len(),
            errors = result.error_count(),
            skipped = result.emit_skipped,
            "compile finished"
        );
        Ok(result)
    }

    /// Compile one file for `target`. The target must already have a context.
    pub fn compile_file(
        &self,
        target: &str,
        path: &Path,
        skip_cache: bool,
    ) -> TspipeResult<EmitOutput> {
        let context = self.context_for(target)?;
        self.compile_in_context(&context, path, skip_cache)
    }

    fn compile_target(
        &self,
        context: &CompilationContext,
        skip_cache: bool,
    ) -> TspipeResult<EmitResult> {
        let mut result = EmitResult::default();
        let mut compiled = Vec::new();
        // Generators may append root files while the pass runs
        let mut index = 0;
        while let Some(path) = context.root_file(index) {
            index += 1;
            let output = self.compile_in_context(context, &path, skip_cache)?;
            result.emit_skipped |= output.emit_skipped;
            result.emitted_files.extend(output.output_files);
            result.diagnostics.extend(output.diagnostics);
            compiled.push(path);
        }
        self.finish_target(context, &compiled, &mut result)?;
        Ok(result)
    }

    /// Run result processors, then target post transformers, then report.
    fn finish_target(
        &self,
        context: &CompilationContext,
        compiled: &[PathBuf],
        result: &mut EmitResult,
    ) -> TspipeResult<()> {
        let root_files = context.root_files();
        for processor in context.result_processors() {
            processor(context, &root_files)?;
        }
        for processor in context.target_post_transformers() {
            processor(context, &root_files)?;
        }

        if !context.is_transpile_only() {
            let emit_diagnostics = std::mem::take(&mut result.diagnostics);
            result.diagnostics = self.collect_diagnostics(context, compiled, emit_diagnostics);
            for diagnostic in &result.diagnostics {
                context.reporter().report_diagnostic(diagnostic);
            }
        }
        if result.diagnostics.iter().any(Diagnostic::is_error) {
            result.emit_skipped = true;
        }
        Ok(())
    }

    /// Options, syntactic and semantic diagnostics of `files` followed by
    /// emit diagnostics, without duplicates.
    fn collect_diagnostics(
        &self,
        context: &CompilationContext,
        files: &[PathBuf],
        emit_diagnostics: Vec<Diagnostic>,
    ) -> Vec<Diagnostic> {
        let service = context.language_service();
        service.set_host(context.host());

        let mut all = service.get_options_diagnostics();
        for path in files {
            all.extend(service.get_syntactic_diagnostics(path));
            all.extend(service.get_semantic_diagnostics(path));
        }
        all.extend(emit_diagnostics);

        let mut unique: Vec<Diagnostic> = Vec::with_capacity(all.len());
        for diagnostic in all {
            if !unique.contains(&diagnostic) {
                unique.push(diagnostic);
            }
        }
        unique
    }

    fn compile_in_context(
        &self,
        context: &CompilationContext,
        path: &Path,
        skip_cache: bool,
    ) -> TspipeResult<EmitOutput> {
        let target = context.target();
        if !skip_cache && !self.cache.has_changed(path, target) {
            debug!(path = %path.display(), target_name = target, "cache hit");
            return Ok(EmitOutput {
                output_files: self.cache.get_output(path, target),
                ..Default::default()
            });
        }
        debug!(path = %path.display(), target_name = target, skip_cache, "compiling");
        if skip_cache {
            self.cache.mark_stale(path, target);
        }

        let source = match self.system.read_file(path) {
            Ok(source) => source,
            Err(e) => {
                return Ok(EmitOutput {
                    diagnostics: vec![Diagnostic::error(format!(
                        "Cannot read file '{}': {e}",
                        path.display()
                    ))
                    .with_code(6053)
                    .with_file(path)],
                    emit_skipped: true,
                    ..Default::default()
                });
            }
        };

        for generator in context.generators() {
            generator(context, path, &source)?;
        }
        let mut processed = source.clone();
        for processor in context.processors() {
            processed = processor(context, path, processed)?;
        }
        self.cache
            .update_source_processed(path, &source, &processed, target);

        let output = if context.is_transpile_only() {
            self.transpile(context, path, &processed)?
        } else {
            let service = context.language_service();
            service.set_host(context.host());
            service.get_emit_output(path)?
        };

        let emit_skipped =
            output.emit_skipped || output.diagnostics.iter().any(Diagnostic::is_error);
        if emit_skipped {
            self.cache.mark_emit_failed(path, target);
        } else {
            self.cache
                .update_output(path, output.output_files.clone(), target);
            if context.writes_files() {
                self.write_outputs(&output.output_files)?;
            }
        }
        Ok(EmitOutput {
            emit_skipped,
            ..output
        })
    }

    /// Single-file transpilation without checking
    fn transpile(
        &self,
        context: &CompilationContext,
        path: &Path,
        text: &str,
    ) -> TspipeResult<EmitOutput> {
        let options = context.options();
        if options.no_emit_enabled() {
            return Ok(EmitOutput {
                emit_skipped: true,
                ..Default::default()
            });
        }
        if is_json_file(path) {
            return Ok(EmitOutput {
                output_files: json_output(path, text, options, context.project_root())
                    .into_iter()
                    .collect(),
                ..Default::default()
            });
        }

        let output = self.transpiler.transpile_module(
            text,
            &TranspileOptions {
                file_name: path,
                compiler_options: options,
                project_root: context.project_root(),
                transformers: context.transformers(),
            },
        )?;
        if output.diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(EmitOutput {
                diagnostics: output.diagnostics,
                emit_skipped: true,
                ..Default::default()
            });
        }

        let js_path = output_path_for(path, options, context.project_root());
        let mut output_files =
            vec![OutputFile::new(&js_path, output.output_text).with_bom(options.emit_bom_enabled())];
        if let Some(map) = output.source_map_text {
            output_files.push(OutputFile::new(
                format!("{}.map", js_path.display()),
                map,
            ));
        }
        Ok(EmitOutput {
            output_files,
            diagnostics: output.diagnostics,
            emit_skipped: false,
        })
    }

    fn write_outputs(&self, files: &[OutputFile]) -> TspipeResult<()> {
        for file in files {
            self.system.write_file(file.name(), &file.disk_text())?;
            debug!(path = %file.name().display(), "wrote output");
        }
        Ok(())
    }
}
