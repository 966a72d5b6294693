//! `manifest` addon: writes a JSON index of every root file and its outputs
//!
//! Runs as a result processor, so it sees the whole target after each pass.
//! Targets with `write = false` produce no manifest.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use crate::application::addons::CompilerAddon;
use crate::application::context::CompilationContext;
use crate::error::TspipeResult;

use super::{merged_options, string_option};

const DEFAULT_FILE: &str = "manifest.json";

pub struct ManifestAddon {
    name: String,
    options: toml::Table,
}

impl ManifestAddon {
    pub fn from_options(name: &str, options: &toml::Table) -> TspipeResult<Self> {
        string_option(name, options, "file")?;
        Ok(Self {
            name: name.to_string(),
            options: options.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct Manifest {
    target: String,
    files: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry {
    source: String,
    version: u64,
    outputs: Vec<String>,
}

fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn build_manifest(context: &CompilationContext, files: &[PathBuf]) -> Manifest {
    let root = context.project_root();
    let target = context.target();
    let files = files
        .iter()
        .map(|file| ManifestEntry {
            source: display_relative(file, root),
            version: context.cache().get_version(file, target),
            outputs: context
                .cache()
                .get_output(file, target)
                .iter()
                .map(|out| display_relative(out.name(), root))
                .collect(),
        })
        .collect();
    Manifest {
        target: target.to_string(),
        files,
    }
}

/// Location of the manifest: relative names land under `out_dir`, or the
/// project root when there is none.
fn manifest_path(context: &CompilationContext, file: &str) -> PathBuf {
    let base = context
        .options()
        .out_dir
        .clone()
        .unwrap_or_else(|| context.project_root().to_path_buf());
    base.join(file)
}

impl CompilerAddon for ManifestAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self, context: &mut CompilationContext) -> TspipeResult<()> {
        let options = merged_options(&self.options, context.addon_settings(&self.name));
        let file =
            string_option(&self.name, &options, "file")?.unwrap_or_else(|| DEFAULT_FILE.to_string());

        context.register_result_processor(Rc::new(
            move |context: &CompilationContext, files: &[PathBuf]| -> TspipeResult<()> {
                if !context.writes_files() {
                    return Ok(());
                }
                let manifest = build_manifest(context, files);
                let path = manifest_path(context, &file);
                let json = serde_json::to_string_pretty(&manifest)?;
                context.system().write_file(&path, &json)?;
                debug!(path = %path.display(), files = manifest.files.len(), "manifest written");
                Ok(())
            },
        ));
        Ok(())
    }
}
