//! Domain Layer
//!
//! Value objects and ports shared by the engine, the compiler and the
//! infrastructure adapters.
//!
//! ## Structure
//!
//! - `diagnostic` / `output_file` / `hash` / `target` - value types
//! - `ports/` - interface definitions for infrastructure (system, reporter)
//!
//! This layer never touches the file system directly. All I/O goes through
//! the `System` port.

pub mod diagnostic;
pub mod hash;
pub mod output_file;
pub mod ports;
pub mod target;

pub use diagnostic::{Diagnostic, DiagnosticCategory, Position};
pub use hash::TextDigest;
pub use output_file::OutputFile;
pub use target::{is_wildcard, normalize_targets, split_name_list, WILDCARD_TARGET};
