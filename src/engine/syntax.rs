//! Token-level syntax tree
//!
//! The built-in engine works on a flat token stream rather than a full AST.
//! Every byte of the input lands in exactly one token, so printing an
//! untouched tree reproduces the input verbatim. Transformers rewrite the
//! token list in place.
//!
//! Regular expression literals are not recognized; a `/` is always
//! punctuation.

use std::path::{Path, PathBuf};

use crate::domain::{Diagnostic, Position};

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Template,
    Punctuation,
    Whitespace,
    Comment,
}

impl TokenKind {
    /// Whitespace and comments carry no meaning for the checker
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// One lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset in the original source, `None` for synthesized tokens
    pub offset: Option<usize>,
}

impl Token {
    /// A token that did not come from the source text
    pub fn synthesized(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            offset: None,
        }
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == name
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }
}

/// Parsed source file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    file_name: PathBuf,
    tokens: Vec<Token>,
    line_starts: Vec<usize>,
    parse_diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// Tokenize `text`. Never fails; lexical problems become diagnostics.
    pub fn parse(file_name: impl Into<PathBuf>, text: &str) -> Self {
        let file_name = file_name.into();
        let mut lexer = Lexer::new(text);
        let tokens = lexer.run();
        let mut parse_diagnostics: Vec<Diagnostic> = lexer
            .errors
            .into_iter()
            .map(|(offset, code, message)| {
                Diagnostic::error(message)
                    .with_code(code)
                    .with_file(&file_name)
                    .with_position(Position::from_offset(text, offset))
            })
            .collect();
        parse_diagnostics.extend(check_brackets(&tokens, text, &file_name));

        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            file_name,
            tokens,
            line_starts,
            parse_diagnostics,
        }
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut Vec<Token> {
        &mut self.tokens
    }

    /// Diagnostics found while tokenizing (syntax errors)
    pub fn parse_diagnostics(&self) -> &[Diagnostic] {
        &self.parse_diagnostics
    }

    /// Indices of non-trivia tokens, in order
    pub fn significant(&self) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.kind.is_trivia())
            .map(|(i, _)| i)
            .collect()
    }

    /// Rename every identifier token `from` to `to`. Returns the number of
    /// tokens rewritten.
    pub fn rename_identifier(&mut self, from: &str, to: &str) -> usize {
        let mut count = 0;
        for token in self.tokens.iter_mut() {
            if token.is_identifier(from) {
                token.text = to.to_string();
                count += 1;
            }
        }
        count
    }

    /// Insert a comment line at the very top of the file
    pub fn prepend_comment(&mut self, comment: &str) {
        self.tokens.insert(
            0,
            Token::synthesized(TokenKind::Whitespace, "\n".to_string()),
        );
        self.tokens.insert(
            0,
            Token::synthesized(TokenKind::Comment, format!("// {comment}")),
        );
    }

    /// 0-based line/column in the original source for a byte offset
    pub fn original_location(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line, offset - self.line_starts[line])
    }

    /// Concatenate token text
    pub fn print(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    errors: Vec<(usize, u32, String)>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, skip: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(skip)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.bump();
        }
    }

    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.pos;
            let kind = if c.is_whitespace() {
                self.eat_while(char::is_whitespace);
                TokenKind::Whitespace
            } else if c == '/' && self.peek_at(1) == Some('/') {
                self.eat_while(|c| c != '\n');
                TokenKind::Comment
            } else if c == '/' && self.peek_at(1) == Some('*') {
                self.block_comment(start);
                TokenKind::Comment
            } else if is_ident_start(c) {
                self.eat_while(is_ident_continue);
                TokenKind::Identifier
            } else if c.is_ascii_digit() {
                self.eat_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
                TokenKind::Number
            } else if c == '"' || c == '\'' {
                self.string(start, c);
                TokenKind::String
            } else if c == '`' {
                self.template(start);
                TokenKind::Template
            } else {
                self.bump();
                TokenKind::Punctuation
            };
            tokens.push(Token {
                kind,
                text: self.text[start..self.pos].to_string(),
                offset: Some(start),
            });
        }
        tokens
    }

    fn block_comment(&mut self, start: usize) {
        self.pos += 2;
        match self.text[self.pos..].find("*/") {
            Some(end) => self.pos += end + 2,
            None => {
                self.pos = self.text.len();
                self.errors.push((start, 1010, "'*/' expected.".to_string()));
            }
        }
    }

    fn string(&mut self, start: usize, quote: char) {
        self.bump();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.errors
                        .push((start, 1002, "Unterminated string literal.".to_string()));
                    return;
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some(c) if c == quote => {
                    self.bump();
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn template(&mut self, start: usize) {
        self.bump();
        let mut depth = 0usize;
        loop {
            match self.bump() {
                None => {
                    self.errors
                        .push((start, 1160, "Unterminated template literal.".to_string()));
                    return;
                }
                Some('\\') => {
                    self.bump();
                }
                Some('$') if depth == 0 && self.peek() == Some('{') => {
                    self.bump();
                    depth = 1;
                }
                Some('{') if depth > 0 => depth += 1,
                Some('}') if depth > 0 => depth -= 1,
                Some('`') if depth == 0 => return,
                Some(_) => {}
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn closing_for(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

fn check_brackets(tokens: &[Token], text: &str, file_name: &Path) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut stack: Vec<(&str, usize)> = Vec::new();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Punctuation) {
        let offset = token.offset.unwrap_or(0);
        match token.text.as_str() {
            open @ ("(" | "[" | "{") => stack.push((open, offset)),
            close @ (")" | "]" | "}") => match stack.pop() {
                Some((open, _)) if closing_for(open) == close => {}
                Some((open, _)) => {
                    diagnostics.push(
                        Diagnostic::error(format!("'{}' expected.", closing_for(open)))
                            .with_code(1005)
                            .with_file(file_name)
                            .with_position(Position::from_offset(text, offset)),
                    );
                }
                None => {
                    diagnostics.push(
                        Diagnostic::error("Declaration or statement expected.")
                            .with_code(1128)
                            .with_file(file_name)
                            .with_position(Position::from_offset(text, offset)),
                    );
                }
            },
            _ => {}
        }
    }
    if let Some((open, _)) = stack.last() {
        diagnostics.push(
            Diagnostic::error(format!("'{}' expected.", closing_for(open)))
                .with_code(1005)
                .with_file(file_name)
                .with_position(Position::from_offset(text, text.len())),
        );
    }
    diagnostics
}
