//! Per-target compilation context
//!
//! A `CompilationContext` is the seam between the compiler and addon code.
//! Addons register their callbacks here during activation; the compiler
//! reads the lists back while it compiles the target.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::application::cache::FileCache;
use crate::config::{ProjectOptions, TargetConfig};
use crate::domain::ports::{Reporter, System};
use crate::engine::{
    CustomTransformers, LanguageService, LanguageServiceHost, ScriptSnapshot, TransformerSet,
};
use crate::error::TspipeResult;

/// Runs before a file is processed. May write files or call `add_input_file`.
pub type Generator = Rc<dyn Fn(&CompilationContext, &Path, &str) -> TspipeResult<()>>;

/// Rewrites source text. Processors form a chain in registration order.
pub type Processor = Rc<dyn Fn(&CompilationContext, &Path, String) -> TspipeResult<String>>;

/// Runs once per target pass over every root file of the target
pub type ResultProcessor = Rc<dyn Fn(&CompilationContext, &[PathBuf]) -> TspipeResult<()>>;

/// Maps a non-source file to the source files that depend on it
pub type DependencyResolver = Rc<dyn Fn(&Path) -> Vec<PathBuf>>;

/// Registers a file watch on behalf of an addon
pub type WatchRegistrar = Rc<dyn Fn(&Path) -> TspipeResult<()>>;

/// Everything a context is built from
pub struct ContextSetup {
    pub target: String,
    pub options: ProjectOptions,
    pub project_root: PathBuf,
    pub root_files: Vec<PathBuf>,
    pub config: TargetConfig,
    pub transpile_only: bool,
    pub debug: bool,
    pub cache: Rc<FileCache>,
    pub system: Rc<dyn System>,
    pub reporter: Rc<dyn Reporter>,
    pub service: Rc<dyn LanguageService>,
    pub watch: Option<WatchRegistrar>,
    pub dependency_resolver: Option<DependencyResolver>,
}

pub struct CompilationContext {
    target: String,
    options: ProjectOptions,
    project_root: PathBuf,
    root_files: RefCell<Vec<PathBuf>>,
    config: TargetConfig,
    transpile_only: bool,
    debug: bool,
    cache: Rc<FileCache>,
    system: Rc<dyn System>,
    reporter: Rc<dyn Reporter>,
    service: Rc<dyn LanguageService>,
    watch: Option<WatchRegistrar>,
    dependency_resolver: Option<DependencyResolver>,

    generators: Vec<Generator>,
    processors: Vec<Processor>,
    transformers: TransformerSet,
    result_processors: Vec<ResultProcessor>,
    target_post_transformers: Vec<ResultProcessor>,
    dependency_resolvers: Vec<DependencyResolver>,
}

impl CompilationContext {
    pub fn new(setup: ContextSetup) -> Self {
        Self {
            target: setup.target,
            options: setup.options,
            project_root: setup.project_root,
            root_files: RefCell::new(setup.root_files),
            config: setup.config,
            transpile_only: setup.transpile_only,
            debug: setup.debug,
            cache: setup.cache,
            system: setup.system,
            reporter: setup.reporter,
            service: setup.service,
            watch: setup.watch,
            dependency_resolver: setup.dependency_resolver,
            generators: Vec::new(),
            processors: Vec::new(),
            transformers: TransformerSet::default(),
            result_processors: Vec::new(),
            target_post_transformers: Vec::new(),
            dependency_resolvers: Vec::new(),
        }
    }

    // Registration. Each call appends; nothing is de-duplicated.

    pub fn register_generator(&mut self, generator: Generator) {
        self.generators.push(generator);
    }

    pub fn register_processor(&mut self, processor: Processor) {
        self.processors.push(processor);
    }

    pub fn register_pre_emit_transformer(&mut self, transformers: CustomTransformers) {
        self.transformers.pre_emit.extend(transformers);
    }

    /// Register transformers for the emit stage
    pub fn register_transformer(&mut self, transformers: CustomTransformers) {
        self.transformers.emit.extend(transformers);
    }

    pub fn register_post_emit_transformer(&mut self, transformers: CustomTransformers) {
        self.transformers.post_emit.extend(transformers);
    }

    pub fn register_result_processor(&mut self, processor: ResultProcessor) {
        self.result_processors.push(processor);
    }

    /// Like a result processor, but runs after every result processor of the target
    pub fn register_target_post_transformer(&mut self, processor: ResultProcessor) {
        self.target_post_transformers.push(processor);
    }

    pub fn register_dependency_resolver(&mut self, resolver: DependencyResolver) {
        self.dependency_resolvers.push(resolver);
    }

    // Accessors

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn cache(&self) -> &Rc<FileCache> {
        &self.cache
    }

    pub fn system(&self) -> &Rc<dyn System> {
        &self.system
    }

    pub fn reporter(&self) -> &Rc<dyn Reporter> {
        &self.reporter
    }

    pub fn language_service(&self) -> &Rc<dyn LanguageService> {
        &self.service
    }

    pub fn is_transpile_only(&self) -> bool {
        self.transpile_only
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Whether compiled output is written to disk for this target
    pub fn writes_files(&self) -> bool {
        self.config.writes_files()
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    pub fn transformers(&self) -> &TransformerSet {
        &self.transformers
    }

    pub fn result_processors(&self) -> &[ResultProcessor] {
        &self.result_processors
    }

    pub fn target_post_transformers(&self) -> &[ResultProcessor] {
        &self.target_post_transformers
    }

    /// Free-form `[targets.<name>.settings.<addon>]` table
    pub fn addon_settings(&self, addon: &str) -> Option<&toml::Table> {
        self.config.settings_for(addon)
    }

    /// Current root files, including ones added by generators
    pub fn root_files(&self) -> Vec<PathBuf> {
        self.root_files.borrow().clone()
    }

    pub fn root_file_count(&self) -> usize {
        self.root_files.borrow().len()
    }

    pub fn root_file(&self, index: usize) -> Option<PathBuf> {
        self.root_files.borrow().get(index).cloned()
    }

    pub fn is_root_file(&self, path: &Path) -> bool {
        self.root_files.borrow().iter().any(|p| p == path)
    }

    /// Add a compilation unit at runtime. Returns false if already present.
    pub fn add_input_file(&self, path: impl AsRef<Path>) -> bool {
        let path = self.system.resolve_path(&self.project_root.join(path.as_ref()));
        let mut roots = self.root_files.borrow_mut();
        if roots.contains(&path) {
            return false;
        }
        tracing::debug!(target_name = %self.target, path = %path.display(), "input file added");
        roots.push(path);
        true
    }

    /// Source files depending on `path`, from the compiler-supplied resolver
    /// followed by addon-registered ones. Duplicates are dropped.
    pub fn resolve_dependency(&self, path: &Path) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::new();
        let resolvers = self
            .dependency_resolver
            .iter()
            .chain(self.dependency_resolvers.iter());
        for resolver in resolvers {
            for dep in resolver(path) {
                if !out.contains(&dep) {
                    out.push(dep);
                }
            }
        }
        out
    }

    /// Ask the compiler to watch `path`. A no-op outside watch mode.
    pub fn watch_file(&self, path: &Path) -> TspipeResult<()> {
        match &self.watch {
            Some(register) => register(path),
            None => Ok(()),
        }
    }

    /// Host adapter describing this target to the shared language service
    pub fn host(&self) -> Rc<dyn LanguageServiceHost> {
        Rc::new(TargetHost {
            target: self.target.clone(),
            root_files: self.root_files(),
            options: self.options.clone(),
            project_root: self.project_root.clone(),
            transformers: self.transformers.clone(),
            cache: Rc::clone(&self.cache),
        })
    }
}

impl std::fmt::Debug for CompilationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationContext")
            .field("target", &self.target)
            .field("root_files", &self.root_files.borrow().len())
            .field("generators", &self.generators.len())
            .field("processors", &self.processors.len())
            .field("transformers", &self.transformers)
            .field("result_processors", &self.result_processors.len())
            .finish()
    }
}

/// Snapshot of one context handed to the language service
struct TargetHost {
    target: String,
    root_files: Vec<PathBuf>,
    options: ProjectOptions,
    project_root: PathBuf,
    transformers: TransformerSet,
    cache: Rc<FileCache>,
}

impl LanguageServiceHost for TargetHost {
    fn script_file_names(&self) -> Vec<PathBuf> {
        self.root_files.clone()
    }

    fn script_version(&self, path: &Path) -> u64 {
        self.cache.get_version(path, &self.target)
    }

    fn script_snapshot(&self, path: &Path) -> Option<Rc<ScriptSnapshot>> {
        self.cache.get_snapshot(path, &self.target)
    }

    fn compilation_settings(&self) -> ProjectOptions {
        self.options.clone()
    }

    fn current_directory(&self) -> PathBuf {
        self.project_root.clone()
    }

    fn custom_transformers(&self) -> TransformerSet {
        self.transformers.clone()
    }

    fn project_name(&self) -> String {
        format!("{} [{}]", self.project_root.display(), self.target)
    }
}
