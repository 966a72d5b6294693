//! Application Layer
//!
//! The compile pipeline. This layer:
//! - Depends on the Domain layer (value objects, ports) and the engine ports
//! - Never touches the file system except through the `System` port
//! - Is driven by the CLI or by embedding code
//!
//! ## Components
//!
//! - `FileCache` - per-(file, target) versions, snapshots and outputs
//! - `CompilationContext` - per-target state and addon extension points
//! - `AddonRegistry` - addon discovery, resolution and activation lists
//! - `Compiler` - the orchestrator (`compile`, `watch`)

pub mod addons;
pub mod cache;
pub mod compiler;
pub mod context;

pub use addons::{AddonRegistry, AddonResolver, CompilerAddon, ADDON_SENTINEL};
pub use cache::{CacheEntry, FileCache};
pub use compiler::{
    Compiler, CompilerOptions, CompilerState, EmitResult, WatcherState, DEBOUNCE_MS,
    WATCH_INTERVAL,
};
pub use context::{
    CompilationContext, ContextSetup, DependencyResolver, Generator, Processor, ResultProcessor,
    WatchRegistrar,
};
