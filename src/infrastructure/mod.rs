//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `fs/` - `System` implementations (local disk, in-memory)
//! - `reporters` - `Reporter` implementations (console, JSON, collecting)
//! - `addons/` - built-in addons and the manifest resolver

pub mod addons;
pub mod fs;
pub mod reporters;

pub use addons::{builtin_addon, ManifestResolver, BUILTIN_ADDONS};
pub use fs::{LocalSystem, MemorySystem};
pub use reporters::{CollectingReporter, ConsoleReporter, JsonReporter};
