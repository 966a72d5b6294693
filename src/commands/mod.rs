//! Command handlers
//!
//! Both commands share the same setup: load configuration, apply
//! environment overrides, discover addons and configure a compiler backed
//! by the local file system.

mod build;
mod watch;

use std::rc::Rc;

use anyhow::Result;
use tspipe::application::{AddonRegistry, Compiler, CompilerOptions};
use tspipe::config::{
    has_invalid_targets, load_or_default, load_with_warnings, EnvOverrides, ProjectConfig,
};
use tspipe::domain::ports::{Reporter, System};
use tspipe::domain::{is_wildcard, split_name_list, Diagnostic};
use tspipe::infrastructure::{
    builtin_addon, ConsoleReporter, JsonReporter, LocalSystem, ManifestResolver, BUILTIN_ADDONS,
};

use crate::cli::BuildArgs;

pub use build::cmd_build;
pub use watch::cmd_watch;

fn reporter_for(json: bool) -> Rc<dyn Reporter> {
    if json {
        Rc::new(JsonReporter::stdout())
    } else {
        Rc::new(ConsoleReporter::stderr())
    }
}

/// Every addon name mentioned anywhere: explicit list, global list and
/// per-target lists.
fn requested_addons(explicit: &str, config: &ProjectConfig) -> Vec<String> {
    let mut names = split_name_list(explicit);
    let configured = config.addons.iter().flatten();
    let per_target = config
        .targets
        .iter()
        .flat_map(|targets| targets.values())
        .filter_map(|target| target.addons.as_ref())
        .flatten();
    for name in configured.chain(per_target) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

/// Build a compiler for `args`. Returns `None` after reporting when the
/// requested targets are not configured.
pub fn prepare(args: &BuildArgs, json: bool, watch: bool) -> Result<Option<Compiler>> {
    let system: Rc<dyn System> = Rc::new(LocalSystem::new());
    let reporter = reporter_for(json);
    let project_root = system.resolve_path(&args.project);

    let (config, warnings) = match &args.config {
        Some(path) => load_with_warnings(system.as_ref(), &system.resolve_path(path))?,
        None => load_or_default(system.as_ref(), &project_root)?,
    };
    for warning in &warnings {
        reporter.report_diagnostic(&warning.to_diagnostic());
    }

    let env = EnvOverrides::from_env();
    let targets = if args.targets.is_empty() {
        env.targets.unwrap_or_default()
    } else {
        args.targets.clone()
    };
    if has_invalid_targets(&targets, Some(&config)) {
        let unknown: Vec<&str> = targets
            .iter()
            .filter(|t| !is_wildcard(t) && config.target(t).is_none())
            .map(String::as_str)
            .collect();
        let known = config.target_names();
        let mut diagnostic = Diagnostic::error(format!("Unknown target(s): {}", unknown.join(", ")));
        if !known.is_empty() {
            diagnostic = diagnostic.with_chain(format!("Configured targets: {}", known.join(", ")));
        }
        reporter.report_diagnostic(&diagnostic);
        return Ok(None);
    }

    let addon_names = args.addons.clone().or(env.addons).unwrap_or_default();
    let addon_dir = args
        .addon_dir
        .clone()
        .or_else(|| config.addon_dir.clone())
        .map(|dir| system.resolve_path(&project_root.join(dir)));
    let registry = AddonRegistry::new(
        system.as_ref(),
        addon_dir.as_deref(),
        &addon_names,
        Some(config.clone()),
        Rc::new(ManifestResolver::new(Rc::clone(&system))),
        Rc::clone(&reporter),
    );
    // Built-ins asked for by name work without a manifest
    let available = registry.available();
    for name in requested_addons(&addon_names, &config) {
        if BUILTIN_ADDONS.contains(&name.as_str()) && !available.contains(&name) {
            registry.register(builtin_addon(&name, &name, &toml::Table::new())?);
        }
    }

    let mut options = CompilerOptions::new(project_root, config, Rc::new(registry), reporter);
    options.targets = targets;
    options.out_dir = args
        .out_dir
        .clone()
        .or(env.out_dir)
        .map(|dir| system.resolve_path(&dir));
    options.source_map = args.source_map;
    options.transpile_only = args.transpile_only;
    options.debug = args.debug;
    options.watch = watch;

    let mut compiler = Compiler::with_lexical_engine(system);
    compiler.set_options(options);
    Ok(Some(compiler))
}
