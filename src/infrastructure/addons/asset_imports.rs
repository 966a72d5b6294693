//! `asset-imports` addon: tracks non-source files imported by string
//!
//! For every generated file, relative `import`, `from` and `require()`
//! specifiers pointing at non-source files (stylesheets, templates, data)
//! are recorded. In watch mode each asset is watched, and a dependency
//! resolver maps an asset change back to the files importing it.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::application::addons::CompilerAddon;
use crate::application::context::CompilationContext;
use crate::engine::{is_source_file, SyntaxTree, TokenKind};
use crate::error::TspipeResult;

type ImportGraph = Rc<RefCell<BTreeMap<PathBuf, BTreeSet<PathBuf>>>>;

pub struct AssetImportsAddon {
    name: String,
}

impl AssetImportsAddon {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

fn unquote(text: &str) -> Option<&str> {
    let first = text.chars().next()?;
    if !matches!(first, '"' | '\'') || text.len() < 2 || !text.ends_with(first) {
        return None;
    }
    Some(&text[1..text.len() - 1])
}

/// Relative string specifiers of `import`, `from` and `require(...)`
pub(crate) fn import_specifiers(tree: &SyntaxTree) -> Vec<String> {
    let tokens = tree.tokens();
    let significant = tree.significant();
    let mut out = Vec::new();
    for (pos, &index) in significant.iter().enumerate() {
        let token = &tokens[index];
        let literal = if token.is_identifier("import") || token.is_identifier("from") {
            significant.get(pos + 1)
        } else if token.is_identifier("require")
            && significant
                .get(pos + 1)
                .is_some_and(|&i| tokens[i].is_punct("("))
        {
            significant.get(pos + 2)
        } else {
            None
        };
        let Some(&literal) = literal else { continue };
        if tokens[literal].kind != TokenKind::String {
            continue;
        }
        if let Some(spec) = unquote(&tokens[literal].text) {
            if spec.starts_with('.') && !out.iter().any(|s| s == spec) {
                out.push(spec.to_string());
            }
        }
    }
    out
}

fn is_asset(path: &Path) -> bool {
    path.extension().is_some() && !is_source_file(path)
}

impl CompilerAddon for AssetImportsAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self, context: &mut CompilationContext) -> TspipeResult<()> {
        let graph: ImportGraph = Rc::default();

        let recorded = Rc::clone(&graph);
        context.register_generator(Rc::new(
            move |context: &CompilationContext, path: &Path, source: &str| -> TspipeResult<()> {
                let tree = SyntaxTree::parse(path, source);
                let dir = path.parent().unwrap_or(context.project_root());
                let assets: Vec<PathBuf> = import_specifiers(&tree)
                    .iter()
                    .map(|spec| context.system().resolve_path(&dir.join(spec)))
                    .filter(|asset| is_asset(asset))
                    .collect();

                {
                    let mut graph = recorded.borrow_mut();
                    for importers in graph.values_mut() {
                        importers.remove(path);
                    }
                    graph.retain(|_, importers| !importers.is_empty());
                    for asset in &assets {
                        graph
                            .entry(asset.clone())
                            .or_default()
                            .insert(path.to_path_buf());
                    }
                }

                for asset in &assets {
                    debug!(asset = %asset.display(), importer = %path.display(), "asset import");
                    context.watch_file(asset)?;
                }
                Ok(())
            },
        ));

        context.register_dependency_resolver(Rc::new(move |path: &Path| {
            graph
                .borrow()
                .get(path)
                .map(|importers| importers.iter().cloned().collect())
                .unwrap_or_default()
        }));
        Ok(())
    }
}
