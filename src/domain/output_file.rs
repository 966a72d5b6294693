//! OutputFile entity - one emitted artifact of a compile

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::hash::TextDigest;

/// UTF-8 byte order mark written ahead of the text when `write_bom` is set
pub const UTF8_BOM: &str = "\u{feff}";

/// A compiled output file ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    /// Absolute path where this file should be written
    name: PathBuf,
    /// Emitted text
    text: String,
    /// Whether a byte-order mark precedes the text on disk
    write_bom: bool,
}

impl OutputFile {
    /// Create a new OutputFile
    pub fn new(name: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            write_bom: false,
        }
    }

    /// Set the byte-order-mark flag
    pub fn with_bom(mut self, write_bom: bool) -> Self {
        self.write_bom = write_bom;
        self
    }

    /// Get the output path
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Get the emitted text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn write_bom(&self) -> bool {
        self.write_bom
    }

    /// Text exactly as it should land on disk
    pub fn disk_text(&self) -> String {
        if self.write_bom {
            format!("{UTF8_BOM}{}", self.text)
        } else {
            self.text.clone()
        }
    }

    /// SHA-256 of the emitted text
    pub fn hash(&self) -> TextDigest {
        TextDigest::of(&self.text)
    }
}
