//! Configuration type definitions

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ports::System;
use crate::domain::target::is_wildcard;
use crate::engine::SOURCE_EXTENSIONS;
use crate::error::TspipeResult;

/// Line terminator for emitted files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NewLineKind {
    #[default]
    Lf,
    Crlf,
}

impl NewLineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewLineKind::Lf => "\n",
            NewLineKind::Crlf => "\r\n",
        }
    }
}

/// Options handed to the analysis engine.
///
/// Every field is optional so a target override can leave a setting to the
/// base project options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectOptions {
    pub out_dir: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub source_map: Option<bool>,
    pub no_emit: Option<bool>,
    pub emit_bom: Option<bool>,
    pub new_line: Option<NewLineKind>,
    pub transpile_only: Option<bool>,
    pub strict: Option<bool>,
}

impl ProjectOptions {
    /// Merge `overrides` on top of `self`. Set fields in `overrides` win.
    pub fn merged_with(&self, overrides: &ProjectOptions) -> ProjectOptions {
        ProjectOptions {
            out_dir: overrides.out_dir.clone().or_else(|| self.out_dir.clone()),
            root_dir: overrides.root_dir.clone().or_else(|| self.root_dir.clone()),
            source_map: overrides.source_map.or(self.source_map),
            no_emit: overrides.no_emit.or(self.no_emit),
            emit_bom: overrides.emit_bom.or(self.emit_bom),
            new_line: overrides.new_line.or(self.new_line),
            transpile_only: overrides.transpile_only.or(self.transpile_only),
            strict: overrides.strict.or(self.strict),
        }
    }

    /// Make `out_dir` and `root_dir` absolute against `base`
    pub fn resolve_paths(&mut self, system: &dyn System, base: &Path) {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                system.resolve_path(p)
            } else {
                system.resolve_path(&base.join(p))
            }
        };
        self.out_dir = self.out_dir.as_deref().map(resolve);
        self.root_dir = self.root_dir.as_deref().map(resolve);
    }

    pub fn source_map_enabled(&self) -> bool {
        self.source_map.unwrap_or(false)
    }

    pub fn no_emit_enabled(&self) -> bool {
        self.no_emit.unwrap_or(false)
    }

    pub fn emit_bom_enabled(&self) -> bool {
        self.emit_bom.unwrap_or(false)
    }

    pub fn transpile_only_enabled(&self) -> bool {
        self.transpile_only.unwrap_or(false)
    }

    pub fn new_line_str(&self) -> &'static str {
        self.new_line.unwrap_or_default().as_str()
    }
}

/// Per-target configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Addons to activate for this target; absent means "fall back"
    #[serde(default)]
    pub addons: Option<Vec<String>>,

    /// `false` disables writing output files for this target
    #[serde(default)]
    pub write: Option<bool>,

    #[serde(default)]
    pub transpile_only: Option<bool>,

    /// Overrides merged over the project's `[compiler_options]`
    #[serde(default)]
    pub compiler_options: ProjectOptions,

    /// Free-form settings read by addons, keyed by addon name
    #[serde(default)]
    pub settings: toml::Table,
}

impl TargetConfig {
    /// A target writes files unless its config says `write = false`
    pub fn writes_files(&self) -> bool {
        self.write != Some(false)
    }

    /// Settings table for one addon, if the target provides one
    pub fn settings_for(&self, addon: &str) -> Option<&toml::Table> {
        self.settings.get(addon).and_then(|v| v.as_table())
    }
}

/// Main project configuration (`tspipe.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Explicit root files, compiled in this order
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Directories scanned for further root files (sorted, appended)
    #[serde(default)]
    pub include: Vec<PathBuf>,

    /// Global addon list
    #[serde(default)]
    pub addons: Option<Vec<String>>,

    /// Directory scanned for addon modules
    #[serde(default)]
    pub addon_dir: Option<PathBuf>,

    #[serde(default)]
    pub compiler_options: ProjectOptions,

    #[serde(default)]
    pub targets: Option<BTreeMap<String, TargetConfig>>,
}

impl ProjectConfig {
    /// Configuration for a named target, if present
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.as_ref().and_then(|t| t.get(name))
    }

    /// Names of every configured target, sorted
    pub fn target_names(&self) -> Vec<String> {
        self.targets
            .as_ref()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve the ordered root file list.
    ///
    /// `files` come first in the given order, then every source file found
    /// under each `include` directory in sorted order. Duplicates keep their
    /// first position.
    pub fn root_files(&self, system: &dyn System, project_root: &Path) -> TspipeResult<Vec<PathBuf>> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for file in &self.files {
            let path = system.resolve_path(&project_root.join(file));
            if !roots.contains(&path) {
                roots.push(path);
            }
        }
        for dir in &self.include {
            let dir = system.resolve_path(&project_root.join(dir));
            for path in system.read_directory(&dir, SOURCE_EXTENSIONS)? {
                let path = system.resolve_path(&path);
                if !roots.contains(&path) {
                    roots.push(path);
                }
            }
        }
        Ok(roots)
    }
}

/// Returns true when any requested target other than `*` has no entry in
/// the configuration.
pub fn has_invalid_targets(targets: &[String], config: Option<&ProjectConfig>) -> bool {
    targets
        .iter()
        .filter(|t| !is_wildcard(t))
        .any(|t| config.and_then(|c| c.target(t)).is_none())
}
