//! Built-in lexical engine
//!
//! Implements `LanguageService` and `Transpiler` on top of the token-level
//! `SyntaxTree`. "Checking" is limited to syntax errors and top-level
//! redeclarations; lowering removes declaration-level type syntax
//! (`type` aliases, `interface` blocks, `import type` / `export type {..}`).
//! Inline annotations are left untouched.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::config::ProjectOptions;
use crate::domain::{Diagnostic, OutputFile, Position, TextDigest};
use crate::engine::service::{
    EmitOutput, LanguageService, LanguageServiceHost, Program, ScriptSnapshot, TranspileOptions,
    TranspileOutput, Transpiler,
};
use crate::engine::sourcemap::{print_with_mappings, source_map_json};
use crate::engine::syntax::{SyntaxTree, Token, TokenKind};
use crate::engine::transform::{apply_transformers, TransformerSet};
use crate::engine::{is_json_file, output_path_for};
use crate::error::TspipeResult;

/// Printed output of one file, before it is wrapped into `OutputFile`s
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rendered {
    pub js_path: PathBuf,
    pub text: String,
    pub map: Option<(PathBuf, String)>,
}

impl Rendered {
    pub(crate) fn into_output_files(self, write_bom: bool) -> Vec<OutputFile> {
        let mut files = vec![OutputFile::new(self.js_path, self.text).with_bom(write_bom)];
        if let Some((map_path, map_text)) = self.map {
            files.push(OutputFile::new(map_path, map_text));
        }
        files
    }
}

/// Run every transformer stage and the lowering step over `tree`.
pub(crate) fn emit_tree(tree: &mut SyntaxTree, transformers: &TransformerSet) -> TspipeResult<()> {
    apply_transformers(&transformers.pre_emit.before, tree)?;
    apply_transformers(&transformers.pre_emit.after, tree)?;
    apply_transformers(&transformers.emit.before, tree)?;
    let removed = lower_type_declarations(tree);
    if removed > 0 {
        debug!(file = %tree.file_name().display(), removed, "lowered type-only declarations");
    }
    apply_transformers(&transformers.emit.after, tree)?;
    apply_transformers(&transformers.post_emit.before, tree)?;
    apply_transformers(&transformers.post_emit.after, tree)?;
    Ok(())
}

/// Print a transformed tree, attaching a source map when enabled.
pub(crate) fn render(tree: &SyntaxTree, options: &ProjectOptions, project_root: &Path) -> Rendered {
    let source = tree.file_name();
    let js_path = output_path_for(source, options, project_root);

    let (mut text, map) = if options.source_map_enabled() {
        let (text, mappings) = print_with_mappings(tree);
        let map_path = PathBuf::from(format!("{}.map", js_path.display()));
        let map_text = source_map_json(&js_path, source, &mappings);
        (text, Some((map_path, map_text)))
    } else {
        (tree.print(), None)
    };

    if let Some(new_line) = options.new_line {
        text = text.replace("\r\n", "\n");
        if new_line.as_str() != "\n" {
            text = text.replace('\n', new_line.as_str());
        }
    }

    if let Some((map_path, _)) = &map {
        let map_name = map_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push_str(options.new_line_str());
        }
        text.push_str(&format!("//# sourceMappingURL={map_name}"));
    }

    Rendered { js_path, text, map }
}

/// JSON inputs are copied verbatim under `out_dir`; without one they
/// produce no output at all.
pub(crate) fn json_output(
    source: &Path,
    text: &str,
    options: &ProjectOptions,
    project_root: &Path,
) -> Option<OutputFile> {
    options.out_dir.as_ref()?;
    Some(OutputFile::new(
        output_path_for(source, options, project_root),
        text,
    ))
}

fn is_open(token: &Token) -> bool {
    token.is_punct("(") || token.is_punct("[") || token.is_punct("{")
}

fn is_close(token: &Token) -> bool {
    token.is_punct(")") || token.is_punct("]") || token.is_punct("}")
}

fn newline_between(tokens: &[Token], from: usize, to: usize) -> bool {
    tokens[from + 1..to]
        .iter()
        .any(|t| t.kind == TokenKind::Whitespace && t.text.contains('\n'))
}

fn ends_expression(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Identifier | TokenKind::Number | TokenKind::String | TokenKind::Template
    ) || token.is_punct(")")
        || token.is_punct("]")
}

fn continues_line(token: &Token) -> bool {
    ["=", "|", "&", ",", ":", "?", "<", "."]
        .iter()
        .any(|p| token.is_punct(p))
        || token.is_identifier("extends")
        || token.is_identifier("keyof")
        || token.is_identifier("typeof")
}

/// Last significant index (into `sig`) of the statement starting at `from`.
///
/// A statement ends at a depth-0 `;`, or at a depth-0 line break that is not
/// followed or preceded by a continuation token.
fn statement_end(tokens: &[Token], sig: &[usize], from: usize) -> usize {
    let mut depth = 0i32;
    let mut m = from;
    loop {
        let token = &tokens[sig[m]];
        if is_open(token) {
            depth += 1;
        } else if is_close(token) {
            depth -= 1;
        }
        if depth <= 0 && token.is_punct(";") {
            return m;
        }
        if m + 1 >= sig.len() {
            return m;
        }
        let next = &tokens[sig[m + 1]];
        if depth <= 0
            && newline_between(tokens, sig[m], sig[m + 1])
            && !continues_line(token)
            && !continues_line(next)
        {
            return m;
        }
        m += 1;
    }
}

/// Last significant index of an `interface` body starting the search at `from`.
fn block_end(tokens: &[Token], sig: &[usize], from: usize) -> Option<usize> {
    let open = (from..sig.len()).find(|&m| tokens[sig[m]].is_punct("{"))?;
    let mut depth = 0i32;
    for (m, &idx) in sig.iter().enumerate().skip(open) {
        let token = &tokens[idx];
        if is_open(token) {
            depth += 1;
        } else if is_close(token) {
            depth -= 1;
            if depth == 0 {
                return Some(m);
            }
        }
    }
    None
}

/// If the statement starting at `sig[k]` is type-only, return the last
/// significant index it spans.
fn type_only_statement(tokens: &[Token], sig: &[usize], k: usize) -> Option<usize> {
    let at = |m: usize| sig.get(m).map(|&i| &tokens[i]);
    let mut j = k;
    let exported = at(j)?.is_identifier("export");
    if exported {
        j += 1;
    }
    let keyword = at(j)?;

    if !exported && keyword.is_identifier("import") {
        let second = at(j + 1)?;
        let third = at(j + 2)?;
        let type_import = second.is_identifier("type")
            && !third.is_identifier("from")
            && !third.is_punct(",")
            && !third.is_punct("=");
        return type_import.then(|| statement_end(tokens, sig, j));
    }

    if keyword.is_identifier("type") {
        let next = at(j + 1)?;
        if exported && next.is_punct("{") {
            return Some(statement_end(tokens, sig, j));
        }
        let after = at(j + 2)?;
        if next.kind == TokenKind::Identifier && (after.is_punct("=") || after.is_punct("<")) {
            return Some(statement_end(tokens, sig, j));
        }
        return None;
    }

    if keyword.is_identifier("interface") && at(j + 1)?.kind == TokenKind::Identifier {
        return block_end(tokens, sig, j + 1);
    }

    None
}

/// Remove declaration-level type syntax. Returns the number of statements removed.
pub(crate) fn lower_type_declarations(tree: &mut SyntaxTree) -> usize {
    let sig = tree.significant();
    let tokens = tree.tokens();
    let mut removals: Vec<(usize, usize)> = Vec::new();
    let mut depth = 0i32;
    let mut prev: Option<usize> = None;
    let mut k = 0;

    while k < sig.len() {
        let idx = sig[k];
        let token = &tokens[idx];
        let starts_statement = depth == 0
            && match prev {
                None => true,
                Some(p) => {
                    let prev_token = &tokens[p];
                    prev_token.is_punct(";")
                        || prev_token.is_punct("}")
                        || (newline_between(tokens, p, idx) && ends_expression(prev_token))
                }
            };

        if starts_statement {
            if let Some(end) = type_only_statement(tokens, &sig, k) {
                removals.push((idx, sig[end]));
                prev = None;
                k = end + 1;
                continue;
            }
        }

        if is_open(token) {
            depth += 1;
        } else if is_close(token) {
            depth -= 1;
        }
        prev = Some(idx);
        k += 1;
    }

    let count = removals.len();
    let tokens = tree.tokens_mut();
    for (start, end) in removals.into_iter().rev() {
        if let Some(next) = tokens.get_mut(end + 1) {
            if next.kind == TokenKind::Whitespace {
                if let Some(pos) = next.text.find('\n') {
                    next.text = next.text[pos + 1..].to_string();
                }
            }
        }
        if tokens.get(end + 1).is_some_and(|t| t.text.is_empty()) {
            tokens.remove(end + 1);
        }
        tokens.drain(start..=end);
    }
    count
}

/// Report top-level `const`/`let`/`class`/`function` names declared twice.
pub(crate) fn check_redeclarations(tree: &SyntaxTree) -> Vec<Diagnostic> {
    let sig = tree.significant();
    let tokens = tree.tokens();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut diagnostics = Vec::new();
    let mut depth = 0i32;

    for (k, &idx) in sig.iter().enumerate() {
        let token = &tokens[idx];
        if is_open(token) {
            depth += 1;
            continue;
        }
        if is_close(token) {
            depth -= 1;
            continue;
        }
        if depth != 0 || token.kind != TokenKind::Identifier {
            continue;
        }
        if !matches!(token.text.as_str(), "const" | "let" | "class" | "function") {
            continue;
        }
        if k > 0 && tokens[sig[k - 1]].is_punct(".") {
            continue;
        }
        let mut name_k = k + 1;
        if token.text == "function" && sig.get(name_k).is_some_and(|&i| tokens[i].is_punct("*")) {
            name_k += 1;
        }
        let Some(&name_idx) = sig.get(name_k) else {
            continue;
        };
        let name = &tokens[name_idx];
        if name.kind != TokenKind::Identifier {
            continue;
        }
        if seen.insert(name.text.as_str(), name_idx).is_some() {
            let mut diag = Diagnostic::error(format!(
                "Cannot redeclare block-scoped variable '{}'.",
                name.text
            ))
            .with_code(2451)
            .with_file(tree.file_name());
            if let Some(offset) = name.offset {
                let (line, column) = tree.original_location(offset);
                diag = diag.with_position(Position {
                    line: line + 1,
                    column: column + 1,
                });
            }
            diagnostics.push(diag);
        }
    }
    diagnostics
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Language service backed by the lexical engine.
///
/// Parsed trees are cached per file and content hash, so re-emitting an
/// unchanged snapshot skips tokenizing.
#[derive(Default)]
pub struct LexicalService {
    host: RefCell<Option<Rc<dyn LanguageServiceHost>>>,
    parsed: RefCell<HashMap<PathBuf, (TextDigest, SyntaxTree)>>,
}

impl LexicalService {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_host(&self) -> Option<Rc<dyn LanguageServiceHost>> {
        self.host.borrow().clone()
    }

    fn parse(&self, path: &Path, snapshot: &ScriptSnapshot) -> SyntaxTree {
        if let Some((hash, tree)) = self.parsed.borrow().get(path) {
            if hash == snapshot.hash() {
                return tree.clone();
            }
        }
        let tree = SyntaxTree::parse(path, snapshot.text());
        self.parsed
            .borrow_mut()
            .insert(path.to_path_buf(), (*snapshot.hash(), tree.clone()));
        tree
    }

    fn tree_for(&self, path: &Path) -> Option<SyntaxTree> {
        let host = self.current_host()?;
        let snapshot = host.script_snapshot(path)?;
        Some(self.parse(path, &snapshot))
    }
}

impl LanguageService for LexicalService {
    fn set_host(&self, host: Rc<dyn LanguageServiceHost>) {
        *self.host.borrow_mut() = Some(host);
    }

    fn get_program(&self) -> Option<Program> {
        let host = self.current_host()?;
        Some(Program {
            root_names: host.script_file_names(),
            options: host.compilation_settings(),
        })
    }

    fn get_emit_output(&self, path: &Path) -> TspipeResult<EmitOutput> {
        let Some(host) = self.current_host() else {
            return Ok(EmitOutput {
                diagnostics: vec![Diagnostic::error("No language service host is installed.")],
                emit_skipped: true,
                ..Default::default()
            });
        };
        let Some(snapshot) = host.script_snapshot(path) else {
            return Ok(EmitOutput {
                diagnostics: vec![Diagnostic::error(format!(
                    "File '{}' not found.",
                    path.display()
                ))
                .with_code(6053)],
                emit_skipped: true,
                ..Default::default()
            });
        };

        let options = host.compilation_settings();
        if options.no_emit_enabled() {
            return Ok(EmitOutput {
                emit_skipped: true,
                ..Default::default()
            });
        }

        let project_root = host.current_directory();
        if is_json_file(path) {
            return Ok(EmitOutput {
                output_files: json_output(path, snapshot.text(), &options, &project_root)
                    .into_iter()
                    .collect(),
                ..Default::default()
            });
        }

        let mut tree = self.parse(path, &snapshot);
        let syntax = tree.parse_diagnostics().to_vec();
        if has_errors(&syntax) {
            return Ok(EmitOutput {
                diagnostics: syntax,
                emit_skipped: true,
                ..Default::default()
            });
        }

        emit_tree(&mut tree, &host.custom_transformers())?;
        let rendered = render(&tree, &options, &project_root);
        Ok(EmitOutput {
            output_files: rendered.into_output_files(options.emit_bom_enabled()),
            diagnostics: Vec::new(),
            emit_skipped: false,
        })
    }

    fn get_syntactic_diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        self.tree_for(path)
            .map(|tree| tree.parse_diagnostics().to_vec())
            .unwrap_or_default()
    }

    fn get_semantic_diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        self.tree_for(path)
            .map(|tree| check_redeclarations(&tree))
            .unwrap_or_default()
    }

    fn get_options_diagnostics(&self) -> Vec<Diagnostic> {
        let Some(host) = self.current_host() else {
            return Vec::new();
        };
        let options = host.compilation_settings();
        let Some(root_dir) = options.root_dir.as_deref() else {
            return Vec::new();
        };
        host.script_file_names()
            .into_iter()
            .filter(|file| !file.starts_with(root_dir))
            .map(|file| {
                Diagnostic::error(format!(
                    "File '{}' is not under 'root_dir' '{}'. 'root_dir' is expected to contain all source files.",
                    file.display(),
                    root_dir.display()
                ))
                .with_code(6059)
            })
            .collect()
    }
}

/// Single-file transpiler backed by the lexical engine
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalTranspiler;

impl LexicalTranspiler {
    pub fn new() -> Self {
        Self
    }
}

impl Transpiler for LexicalTranspiler {
    fn transpile_module(
        &self,
        input: &str,
        options: &TranspileOptions<'_>,
    ) -> TspipeResult<TranspileOutput> {
        let mut tree = SyntaxTree::parse(options.file_name, input);
        let diagnostics = tree.parse_diagnostics().to_vec();
        if has_errors(&diagnostics) {
            return Ok(TranspileOutput {
                diagnostics,
                ..Default::default()
            });
        }
        emit_tree(&mut tree, options.transformers)?;
        let rendered = render(&tree, options.compiler_options, options.project_root);
        Ok(TranspileOutput {
            output_text: rendered.text,
            source_map_text: rendered.map.map(|(_, text)| text),
            diagnostics,
        })
    }
}
