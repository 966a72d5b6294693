//! Analysis engine ports
//!
//! The compiler consumes the engine through two narrow interfaces:
//! - `LanguageService`: type-checked emit driven by a swappable host
//! - `Transpiler`: single-file transpilation with no checking
//!
//! One `LanguageService` instance serves every target. Before each emit the
//! compiler installs the target's host adapter with `set_host`; the service
//! object itself never changes identity.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::ProjectOptions;
use crate::domain::{Diagnostic, OutputFile, TextDigest};
use crate::engine::transform::TransformerSet;
use crate::error::TspipeResult;

/// Immutable view of a file's text at one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSnapshot {
    text: String,
    hash: TextDigest,
}

impl ScriptSnapshot {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = TextDigest::of(&text);
        Self { text, hash }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> &TextDigest {
        &self.hash
    }
}

/// What the language service needs to know about one target's project
pub trait LanguageServiceHost {
    /// Root files of the project, in compile order
    fn script_file_names(&self) -> Vec<PathBuf>;

    /// Version of the cached snapshot; 0 when unknown
    fn script_version(&self, path: &Path) -> u64;

    /// Current snapshot of a file, if it has been loaded
    fn script_snapshot(&self, path: &Path) -> Option<Rc<ScriptSnapshot>>;

    /// Merged compiler options for the target
    fn compilation_settings(&self) -> ProjectOptions;

    /// Project root; output paths are computed relative to it
    fn current_directory(&self) -> PathBuf;

    /// Transformers registered for the target
    fn custom_transformers(&self) -> TransformerSet;

    /// Human readable name used in diagnostics and logs
    fn project_name(&self) -> String {
        self.current_directory().display().to_string()
    }
}

/// Result of emitting one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOutput {
    pub output_files: Vec<OutputFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub emit_skipped: bool,
}

/// Snapshot of the program the service currently sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub root_names: Vec<PathBuf>,
    pub options: ProjectOptions,
}

/// Type-checked compilation service
pub trait LanguageService {
    /// Swap the backing host. Subsequent calls observe the new project.
    fn set_host(&self, host: Rc<dyn LanguageServiceHost>);

    /// Program for the current host, or `None` before any host is set
    fn get_program(&self) -> Option<Program>;

    /// Emit one file through the host's transformers.
    ///
    /// `Err` is reserved for transformer failures; compile problems are
    /// returned as diagnostics with `emit_skipped` set.
    fn get_emit_output(&self, path: &Path) -> TspipeResult<EmitOutput>;

    /// Syntax errors of one file
    fn get_syntactic_diagnostics(&self, path: &Path) -> Vec<Diagnostic>;

    /// Checker errors of one file
    fn get_semantic_diagnostics(&self, path: &Path) -> Vec<Diagnostic>;

    /// Problems with the compiler options themselves
    fn get_options_diagnostics(&self) -> Vec<Diagnostic>;
}

/// Inputs of a single-file transpilation
pub struct TranspileOptions<'a> {
    pub file_name: &'a Path,
    pub compiler_options: &'a ProjectOptions,
    pub project_root: &'a Path,
    pub transformers: &'a TransformerSet,
}

/// Result of a single-file transpilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOutput {
    pub output_text: String,
    pub source_map_text: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Checker-free transpilation routine
pub trait Transpiler {
    fn transpile_module(&self, input: &str, options: &TranspileOptions<'_>)
        -> TspipeResult<TranspileOutput>;
}
