//! Addon registry
//!
//! Addons are discovered from a directory, matched against the requested
//! names (explicit list, target config, global config) and loaded through an
//! `AddonResolver`. Missing and duplicate addons are reported as warnings;
//! resolution never fails the build.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::application::context::CompilationContext;
use crate::config::ProjectConfig;
use crate::domain::ports::{Reporter, System};
use crate::domain::{is_wildcard, split_name_list, Diagnostic};
use crate::error::TspipeResult;

/// File stem that marks a directory as an addon module
pub const ADDON_SENTINEL: &str = "addon";

/// A named extension. `activate` runs once per (addon, target) pair and
/// registers callbacks on the context.
pub trait CompilerAddon {
    fn name(&self) -> &str;

    fn activate(&self, context: &mut CompilationContext) -> TspipeResult<()>;
}

/// Turns a discovered addon module into a loaded addon
pub trait AddonResolver {
    fn resolve(&self, name: &str, path: &Path) -> TspipeResult<Rc<dyn CompilerAddon>>;
}

enum AddonSource {
    Module(PathBuf),
    Loaded(Rc<dyn CompilerAddon>),
}

struct AddonEntry {
    name: String,
    source: AddonSource,
}

/// Registry of discovered and programmatically registered addons
pub struct AddonRegistry {
    explicit: Vec<String>,
    config: Option<ProjectConfig>,
    resolver: Rc<dyn AddonResolver>,
    reporter: Rc<dyn Reporter>,
    entries: RefCell<Vec<AddonEntry>>,
}

impl AddonRegistry {
    /// Build a registry, scanning `addon_dir` when given.
    ///
    /// `names` is a comma separated list of addons to run; when empty the
    /// target and global configuration decide.
    pub fn new(
        system: &dyn System,
        addon_dir: Option<&Path>,
        names: &str,
        config: Option<ProjectConfig>,
        resolver: Rc<dyn AddonResolver>,
        reporter: Rc<dyn Reporter>,
    ) -> Self {
        let registry = Self {
            explicit: split_name_list(names),
            config,
            resolver,
            reporter,
            entries: RefCell::new(Vec::new()),
        };
        if let Some(dir) = addon_dir {
            registry.scan(system, dir);
        }
        registry
    }

    fn scan(&self, system: &dyn System, dir: &Path) {
        if !system.directory_exists(dir) {
            debug!(dir = %dir.display(), "addon directory does not exist");
            return;
        }
        let files = match system.read_directory(dir, &[]) {
            Ok(files) => files,
            Err(e) => {
                self.reporter.report_diagnostic(
                    &Diagnostic::warning(format!("Cannot scan addon directory: {e}"))
                        .with_file(dir),
                );
                return;
            }
        };
        for path in files {
            let is_sentinel = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case(ADDON_SENTINEL));
            if !is_sentinel {
                continue;
            }
            let Some(name) = path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            self.insert(name, AddonSource::Module(path));
        }
    }

    fn insert(&self, name: String, source: AddonSource) -> bool {
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.iter().find(|e| e.name == name) {
            let location = |source: &AddonSource| match source {
                AddonSource::Module(path) => path.display().to_string(),
                AddonSource::Loaded(_) => "<registered>".to_string(),
            };
            let message = format!(
                "Duplicate addon \"{}\" at {}; keeping {}",
                name,
                location(&source),
                location(&existing.source)
            );
            warn!("{message}");
            self.reporter
                .report_diagnostic(&Diagnostic::warning(message));
            return false;
        }
        debug!(addon = %name, "addon discovered");
        entries.push(AddonEntry { name, source });
        true
    }

    /// Register an already loaded addon. The first registration of a name wins.
    pub fn register(&self, addon: Rc<dyn CompilerAddon>) -> bool {
        self.insert(addon.name().to_string(), AddonSource::Loaded(addon))
    }

    /// Names of every known addon, in discovery order
    pub fn available(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|e| e.name.clone()).collect()
    }

    /// Explicit names win, then the target's list, then the global list.
    fn expected(&self, target: Option<&str>) -> Vec<String> {
        if !self.explicit.is_empty() {
            return self.explicit.clone();
        }
        let Some(config) = &self.config else {
            return Vec::new();
        };
        let target_list = target
            .filter(|t| !is_wildcard(t))
            .and_then(|t| config.target(t))
            .and_then(|t| t.addons.clone());
        target_list
            .or_else(|| config.addons.clone())
            .unwrap_or_default()
    }

    fn load(&self, index: usize) -> Option<Rc<dyn CompilerAddon>> {
        let (name, path) = {
            let entries = self.entries.borrow();
            let entry = entries.get(index)?;
            match &entry.source {
                AddonSource::Loaded(addon) => return Some(Rc::clone(addon)),
                AddonSource::Module(path) => (entry.name.clone(), path.clone()),
            }
        };
        match self.resolver.resolve(&name, &path) {
            Ok(addon) => {
                self.entries.borrow_mut()[index].source = AddonSource::Loaded(Rc::clone(&addon));
                Some(addon)
            }
            Err(e) => {
                warn!(addon = %name, error = %e, "addon failed to load");
                self.reporter.report_diagnostic(
                    &Diagnostic::error(e.to_string()).with_file(path),
                );
                None
            }
        }
    }

    /// Addons to activate for `target` (`None` or `"*"` for the untargeted
    /// context), in expected-list order when one exists, else discovery order.
    pub fn get_addons(&self, target: Option<&str>) -> Vec<Rc<dyn CompilerAddon>> {
        let expected = self.expected(target);
        if expected.is_empty() {
            let count = self.entries.borrow().len();
            return (0..count).filter_map(|i| self.load(i)).collect();
        }

        let mut missing: Vec<&str> = Vec::new();
        let mut found: Vec<usize> = Vec::new();
        for name in &expected {
            let index = self.entries.borrow().iter().position(|e| &e.name == name);
            match index {
                Some(i) if !found.contains(&i) => found.push(i),
                Some(_) => {}
                None => missing.push(name),
            }
        }

        if !missing.is_empty() {
            let message = match target.filter(|t| !is_wildcard(t)) {
                Some(t) => format!(
                    "Missing addons for target \"{}\": {}",
                    t,
                    missing.join(", ")
                ),
                None => format!("Missing addons: {}", missing.join(", ")),
            };
            warn!("{message}");
            self.reporter.report_diagnostic(&Diagnostic::warning(message));
        }

        found.into_iter().filter_map(|i| self.load(i)).collect()
    }
}
