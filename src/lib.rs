//! tspipe - incremental multi-target compilation orchestrator
//!
//! One `Compiler` compiles a project for several named targets. Each target
//! gets its own `CompilationContext` where addons register generators,
//! processors, syntax transformers and result processors. A shared
//! `FileCache` keeps per-target versions and outputs so that unchanged files
//! are not recompiled, and watch mode recompiles only what a change affects.

pub mod application;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    AddonRegistry, CompilationContext, Compiler, CompilerAddon, CompilerOptions, EmitResult,
    FileCache,
};
pub use config::{ProjectConfig, ProjectOptions, TargetConfig};
pub use domain::{Diagnostic, DiagnosticCategory, OutputFile};
pub use error::{TspipeError, TspipeResult};
pub use infrastructure::{CollectingReporter, ConsoleReporter, JsonReporter, LocalSystem, MemorySystem};
