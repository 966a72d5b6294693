//! File System Implementations
//!
//! Concrete implementations of the `System` port.

mod local;
mod memory;

pub use local::{LocalSystem, LocalWatcher, IGNORE_FILE_NAME};
pub use memory::{MemorySystem, MemoryWatcher};
