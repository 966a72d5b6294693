//! Compiler options and pass results

use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;

use crate::application::addons::AddonRegistry;
use crate::application::context::DependencyResolver;
use crate::config::{ProjectConfig, ProjectOptions};
use crate::domain::ports::Reporter;
use crate::domain::{normalize_targets, Diagnostic, OutputFile};

/// Configuration of one compiler epoch. Replaced wholesale by `set_options`.
pub struct CompilerOptions {
    pub project_root: PathBuf,
    pub config: ProjectConfig,
    /// Targets to activate; empty means `["*"]`
    pub targets: Vec<String>,
    pub addons: Rc<AddonRegistry>,
    pub out_dir: Option<PathBuf>,
    pub source_map: bool,
    pub debug: bool,
    pub watch: bool,
    pub transpile_only: bool,
    pub reporter: Rc<dyn Reporter>,
    pub dependency_resolver: Option<DependencyResolver>,
}

impl CompilerOptions {
    pub fn new(
        project_root: impl Into<PathBuf>,
        config: ProjectConfig,
        addons: Rc<AddonRegistry>,
        reporter: Rc<dyn Reporter>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            config,
            targets: Vec::new(),
            addons,
            out_dir: None,
            source_map: false,
            debug: false,
            watch: false,
            transpile_only: false,
            reporter,
            dependency_resolver: None,
        }
    }

    /// Active targets, deduplicated, in the given order
    pub fn active_targets(&self) -> Vec<String> {
        normalize_targets(self.targets.iter().map(String::as_str))
    }

    /// Project-level options with command line overrides applied
    pub fn project_options(&self) -> ProjectOptions {
        let overrides = ProjectOptions {
            out_dir: self.out_dir.clone(),
            source_map: self.source_map.then_some(true),
            transpile_only: self.transpile_only.then_some(true),
            ..Default::default()
        };
        self.config.compiler_options.merged_with(&overrides)
    }
}

/// Aggregated result of a compile or watch pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmitResult {
    pub emitted_files: Vec<OutputFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub emit_skipped: bool,
}

impl EmitResult {
    pub fn merge(&mut self, other: EmitResult) {
        self.emitted_files.extend(other.emitted_files);
        self.diagnostics.extend(other.diagnostics);
        self.emit_skipped |= other.emit_skipped;
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn emitted_paths(&self) -> Vec<PathBuf> {
        self.emitted_files
            .iter()
            .map(|f| f.name().to_path_buf())
            .collect()
    }
}
