//! Configuration loading

use std::path::{Path, PathBuf};

use crate::domain::ports::System;
use crate::domain::{split_name_list, Diagnostic, Position};
use crate::error::{TspipeError, TspipeResult};

use super::types::ProjectConfig;

/// File name looked up at the project root
pub const CONFIG_FILE_NAME: &str = "tspipe.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

impl ConfigWarning {
    /// Render as a warning diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut message = format!("Unknown configuration key '{}'.", self.key);
        if let Some(suggestion) = &self.suggestion {
            message.push_str(&format!(" Did you mean '{suggestion}'?"));
        }
        let mut diag = Diagnostic::warning(message).with_file(&self.file);
        if let Some(line) = self.line {
            diag = diag.with_position(Position { line, column: 1 });
        }
        diag
    }
}

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(
    system: &dyn System,
    path: &Path,
) -> TspipeResult<(ProjectConfig, Vec<ConfigWarning>)> {
    let content = system.read_file(path)?;
    parse_with_warnings(&content, path)
}

/// Parse TOML text, collecting unknown keys instead of failing on them.
pub fn parse_with_warnings(
    content: &str,
    path: &Path,
) -> TspipeResult<(ProjectConfig, Vec<ConfigWarning>)> {
    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(content);

    let config: ProjectConfig = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| TspipeError::Config {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                key: key.clone(),
                file: path.to_path_buf(),
                line: find_line_number(content, &key),
                suggestion: suggest_key(&key),
            }
        })
        .collect();

    Ok((config, warnings))
}

/// Load `tspipe.toml` from the project root, or defaults when absent.
pub fn load_or_default(
    system: &dyn System,
    project_root: &Path,
) -> TspipeResult<(ProjectConfig, Vec<ConfigWarning>)> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if system.file_exists(&path) {
        load_with_warnings(system, &path)
    } else {
        Ok((ProjectConfig::default(), Vec::new()))
    }
}

/// Overrides read from `TSPIPE_*` environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `TSPIPE_TARGETS` (comma-separated)
    pub targets: Option<Vec<String>>,
    /// `TSPIPE_ADDONS` (comma-separated, kept raw)
    pub addons: Option<String>,
    /// `TSPIPE_OUT_DIR`
    pub out_dir: Option<PathBuf>,
}

impl EnvOverrides {
    /// Read overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let targets = lookup("TSPIPE_TARGETS")
            .map(|v| split_name_list(&v))
            .filter(|v| !v.is_empty());
        let addons = lookup("TSPIPE_ADDONS").filter(|v| !v.trim().is_empty());
        let out_dir = lookup("TSPIPE_OUT_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            targets,
            addons,
            out_dir,
        }
    }
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    for (i, line) in content.lines().enumerate() {
        if line.contains(needle) {
            return Some(i + 1);
        }
    }
    None
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "files",
        "include",
        "addons",
        "addon_dir",
        "compiler_options",
        "targets",
        "out_dir",
        "root_dir",
        "source_map",
        "no_emit",
        "emit_bom",
        "new_line",
        "transpile_only",
        "strict",
        "write",
        "settings",
    ];

    let mut best: Option<(&str, usize)> = None;
    for candidate in CANDIDATES {
        let dist = levenshtein(unknown, candidate);
        best = match best {
            None => Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => Some((candidate, dist)),
            Some(current) => Some(current),
        };
    }

    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate.to_string()),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = if ac == bc { 0 } else { 1 };
            curr[j + 1] =
                std::cmp::min(std::cmp::min(prev[j + 1] + 1, curr[j] + 1), prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
