//! Analysis engine
//!
//! Ports through which the compiler drives parsing, checking and emit, plus a
//! built-in lexical engine that implements them.
//!
//! The lexical engine does not type-check. It tokenizes, runs transformers,
//! strips declaration-level type syntax and prints. A full language engine
//! can be plugged in through `LanguageService` and `Transpiler`.

pub mod lexical;
pub mod service;
mod sourcemap;
pub mod syntax;
pub mod transform;

use std::path::{Path, PathBuf};

use crate::config::ProjectOptions;

pub use lexical::{LexicalService, LexicalTranspiler};
pub use service::{
    EmitOutput, LanguageService, LanguageServiceHost, Program, ScriptSnapshot, TranspileOptions,
    TranspileOutput, Transpiler,
};
pub use syntax::{SyntaxTree, Token, TokenKind};
pub use transform::{apply_transformers, CustomTransformers, Transformer, TransformerSet};

/// Extensions of files the engine compiles
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Returns true when the path looks like source code the engine compiles
pub fn is_source_file(path: &Path) -> bool {
    crate::domain::ports::has_extension(path, SOURCE_EXTENSIONS)
}

/// Returns true for JSON inputs, which are copied rather than compiled
pub fn is_json_file(path: &Path) -> bool {
    crate::domain::ports::has_extension(path, &["json"])
}

fn emitted_extension(source: &Path) -> &'static str {
    match source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mts") | Some("mjs") => "mjs",
        Some("cts") | Some("cjs") => "cjs",
        Some("json") => "json",
        _ => "js",
    }
}

/// Where the emitted file for `source` goes.
///
/// With an `out_dir` the source's path relative to `root_dir` (or the
/// project root) is mirrored under it; sources outside that root keep only
/// their file name. Without an `out_dir` the output lands beside the source.
pub fn output_path_for(source: &Path, options: &ProjectOptions, project_root: &Path) -> PathBuf {
    let ext = emitted_extension(source);
    match &options.out_dir {
        Some(out_dir) => {
            let root = options.root_dir.as_deref().unwrap_or(project_root);
            let relative = source
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| source.file_name().map(PathBuf::from).unwrap_or_default());
            out_dir.join(relative).with_extension(ext)
        }
        None => source.with_extension(ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_beside_source() {
        let out = output_path_for(
            Path::new("/p/src/a.ts"),
            &ProjectOptions::default(),
            Path::new("/p"),
        );
        assert_eq!(out, PathBuf::from("/p/src/a.js"));
    }

    #[test]
    fn output_path_under_out_dir() {
        let options = ProjectOptions {
            out_dir: Some(PathBuf::from("/p/dist")),
            ..Default::default()
        };
        let out = output_path_for(Path::new("/p/src/a.mts"), &options, Path::new("/p"));
        assert_eq!(out, PathBuf::from("/p/dist/src/a.mjs"));
    }

    #[test]
    fn output_path_respects_root_dir() {
        let options = ProjectOptions {
            out_dir: Some(PathBuf::from("/p/dist")),
            root_dir: Some(PathBuf::from("/p/src")),
            ..Default::default()
        };
        let out = output_path_for(Path::new("/p/src/lib/a.tsx"), &options, Path::new("/p"));
        assert_eq!(out, PathBuf::from("/p/dist/lib/a.js"));
    }

    #[test]
    fn source_file_detection() {
        assert!(is_source_file(Path::new("a.ts")));
        assert!(is_source_file(Path::new("a.jsx")));
        assert!(!is_source_file(Path::new("style.scss")));
        assert!(is_json_file(Path::new("data.JSON")));
    }
}
