//! Built-in addons and the manifest based resolver
//!
//! An addon directory holds an `addon.toml` manifest naming the built-in
//! behavior it uses plus its options:
//!
//! ```toml
//! uses = "rename"
//!
//! [options.identifiers]
//! foobar = "barfoo"
//! ```
//!
//! `uses` defaults to the directory name. Per-target
//! `[targets.<name>.settings.<addon>]` tables are merged over `[options]`
//! at activation time.

mod asset_imports;
mod banner;
mod manifest;
mod rename;

use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;
use tracing::debug;

use crate::application::addons::{AddonResolver, CompilerAddon};
use crate::domain::ports::System;
use crate::error::{TspipeError, TspipeResult};

pub use asset_imports::AssetImportsAddon;
pub use banner::BannerAddon;
pub use manifest::ManifestAddon;
pub use rename::RenameAddon;

/// Names accepted by `uses`
pub const BUILTIN_ADDONS: &[&str] = &["rename", "banner", "manifest", "asset-imports"];

/// Instantiate the built-in `uses` under the registry name `name`.
pub fn builtin_addon(
    name: &str,
    uses: &str,
    options: &toml::Table,
) -> TspipeResult<Rc<dyn CompilerAddon>> {
    let addon: Rc<dyn CompilerAddon> = match uses {
        "rename" => Rc::new(RenameAddon::from_options(name, options)?),
        "banner" => Rc::new(BannerAddon::from_options(name, options)?),
        "manifest" => Rc::new(ManifestAddon::from_options(name, options)?),
        "asset-imports" => Rc::new(AssetImportsAddon::new(name)),
        other => {
            return Err(TspipeError::addon(
                name,
                format!(
                    "unknown builtin '{other}' (expected one of: {})",
                    BUILTIN_ADDONS.join(", ")
                ),
            ))
        }
    };
    Ok(addon)
}

/// Merge target settings over manifest options, one level deep
pub(crate) fn merged_options(base: &toml::Table, overrides: Option<&toml::Table>) -> toml::Table {
    let mut merged = base.clone();
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

pub(crate) fn string_option(
    addon: &str,
    options: &toml::Table,
    key: &str,
) -> TspipeResult<Option<String>> {
    match options.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(TspipeError::addon(
            addon,
            format!("option '{key}' must be a string, found {}", other.type_str()),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddonManifest {
    #[serde(default)]
    uses: Option<String>,
    #[serde(default)]
    options: toml::Table,
}

/// Loads discovered `addon.toml` manifests
pub struct ManifestResolver {
    system: Rc<dyn System>,
}

impl ManifestResolver {
    pub fn new(system: Rc<dyn System>) -> Self {
        Self { system }
    }
}

impl AddonResolver for ManifestResolver {
    fn resolve(&self, name: &str, path: &Path) -> TspipeResult<Rc<dyn CompilerAddon>> {
        let load_error = |message: String| TspipeError::AddonLoad {
            name: name.to_string(),
            path: path.to_path_buf(),
            message,
        };

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if !is_toml {
            return Err(load_error(
                "unsupported addon module, expected an addon.toml manifest".to_string(),
            ));
        }

        let content = self
            .system
            .read_file(path)
            .map_err(|e| load_error(e.to_string()))?;
        let manifest: AddonManifest =
            toml::from_str(&content).map_err(|e| load_error(e.message().to_string()))?;
        let uses = manifest.uses.as_deref().unwrap_or(name);
        debug!(addon = name, uses, "resolved addon manifest");

        builtin_addon(name, uses, &manifest.options).map_err(|e| match e {
            TspipeError::Addon { message, .. } => load_error(message),
            other => other,
        })
    }
}
