//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer provides concrete implementations.

pub mod reporter;
pub mod system;

pub use reporter::{NoopReporter, Reporter};
pub use system::{
    has_extension, normalize_path, FileWatcher, FsError, FsResult, System, WatchCallback,
};
