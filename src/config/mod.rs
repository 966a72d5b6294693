//! Configuration module for tspipe
//!
//! Configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (TSPIPE_*)
//! 3. Project config (`tspipe.toml` at the project root)
//! 4. Built-in defaults (lowest priority)

mod loader;
mod types;

pub use loader::{
    load_or_default, load_with_warnings, parse_with_warnings, ConfigWarning, EnvOverrides,
    CONFIG_FILE_NAME,
};
pub use types::{
    has_invalid_targets, NewLineKind, ProjectConfig, ProjectOptions, TargetConfig,
};
