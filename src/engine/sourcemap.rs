//! Source map v3 generation for printed syntax trees
//!
//! One mapping segment per generated line, pointing at the first original
//! token printed on that line.

use std::path::{Component, Path, PathBuf};

use crate::engine::syntax::{SyntaxTree, TokenKind};

const BASE64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append the base64 VLQ encoding of `value`
pub(crate) fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq: u64 = if value < 0 {
        ((value.unsigned_abs()) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = vlq & 31;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 32;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Print the tree and build the `mappings` field alongside.
pub(crate) fn print_with_mappings(tree: &SyntaxTree) -> (String, String) {
    let mut text = String::new();
    // per generated line: (generated column, original line, original column)
    let mut lines: Vec<Option<(usize, usize, usize)>> = vec![None];
    let mut column = 0usize;

    for token in tree.tokens() {
        let mappable = token.kind != TokenKind::Whitespace;
        if let (true, Some(offset), Some(slot)) = (mappable, token.offset, lines.last_mut()) {
            if slot.is_none() {
                let (line, col) = tree.original_location(offset);
                *slot = Some((column, line, col));
            }
        }
        text.push_str(&token.text);
        for ch in token.text.chars() {
            if ch == '\n' {
                lines.push(None);
                column = 0;
            } else {
                column += ch.len_utf16();
            }
        }
    }

    let mut mappings = String::new();
    let (mut prev_line, mut prev_col) = (0i64, 0i64);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            mappings.push(';');
        }
        if let Some((gen_col, orig_line, orig_col)) = *line {
            encode_vlq(&mut mappings, gen_col as i64);
            encode_vlq(&mut mappings, 0);
            encode_vlq(&mut mappings, orig_line as i64 - prev_line);
            encode_vlq(&mut mappings, orig_col as i64 - prev_col);
            prev_line = orig_line as i64;
            prev_col = orig_col as i64;
        }
    }
    (text, mappings)
}

/// Render the source map JSON document for `output` generated from `source`.
pub(crate) fn source_map_json(output: &Path, source: &Path, mappings: &str) -> String {
    let file = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source_ref = output
        .parent()
        .map(|dir| relative_path(dir, source))
        .unwrap_or_else(|| source.to_path_buf());
    let doc = serde_json::json!({
        "version": 3,
        "file": file,
        "sourceRoot": "",
        "sources": [source_ref.to_string_lossy().replace('\\', "/")],
        "names": [],
        "mappings": mappings,
    });
    doc.to_string()
}

/// Path of `to` relative to directory `from`; both absolute and normalized.
pub(crate) fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to_components: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to_components[common..] {
        out.push(component.as_os_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut s = String::new();
        encode_vlq(&mut s, value);
        s
    }

    #[test]
    fn vlq_known_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(16), "gB");
    }

    #[test]
    fn identity_mapping_for_untouched_lines() {
        let tree = SyntaxTree::parse("a.ts", "let a = 1;\nlet b = 2;\n");
        let (text, mappings) = print_with_mappings(&tree);
        assert_eq!(text, "let a = 1;\nlet b = 2;\n");
        assert_eq!(mappings, "AAAA;AACA;");
    }

    #[test]
    fn relative_path_walks_up() {
        assert_eq!(
            relative_path(Path::new("/p/dist"), Path::new("/p/src/a.ts")),
            PathBuf::from("../src/a.ts")
        );
        assert_eq!(
            relative_path(Path::new("/p/src"), Path::new("/p/src/a.ts")),
            PathBuf::from("a.ts")
        );
    }

    #[test]
    fn source_map_json_fields() {
        let json = source_map_json(
            Path::new("/p/dist/a.js"),
            Path::new("/p/src/a.ts"),
            "AAAA",
        );
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["file"], "a.js");
        assert_eq!(value["sources"][0], "../src/a.ts");
        assert_eq!(value["mappings"], "AAAA");
    }
}
