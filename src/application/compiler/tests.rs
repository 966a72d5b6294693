use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::*;
use crate::application::addons::{AddonRegistry, AddonResolver, CompilerAddon};
use crate::config::{ProjectConfig, ProjectOptions, TargetConfig};
use crate::domain::WILDCARD_TARGET;
use crate::infrastructure::{builtin_addon, CollectingReporter, MemorySystem};

struct Unresolvable;

impl AddonResolver for Unresolvable {
    fn resolve(&self, name: &str, path: &Path) -> TspipeResult<Rc<dyn CompilerAddon>> {
        Err(TspipeError::AddonLoad {
            name: name.to_string(),
            path: path.to_path_buf(),
            message: "not resolvable in tests".to_string(),
        })
    }
}

struct FnAddon {
    name: String,
    activate: Box<dyn Fn(&mut CompilationContext)>,
}

impl CompilerAddon for FnAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self, context: &mut CompilationContext) -> TspipeResult<()> {
        (self.activate)(context);
        Ok(())
    }
}

fn addon(name: &str, activate: impl Fn(&mut CompilationContext) + 'static) -> Rc<dyn CompilerAddon> {
    Rc::new(FnAddon {
        name: name.to_string(),
        activate: Box::new(activate),
    })
}

fn builtin(uses: &str, options: &str) -> Rc<dyn CompilerAddon> {
    let options: toml::Table = toml::from_str(options).unwrap();
    builtin_addon(uses, uses, &options).unwrap()
}

fn files(names: &[&str]) -> ProjectConfig {
    ProjectConfig {
        files: names.iter().map(PathBuf::from).collect(),
        ..Default::default()
    }
}

struct Harness {
    system: Rc<MemorySystem>,
    reporter: Rc<CollectingReporter>,
    compiler: Compiler,
}

impl Harness {
    fn new(sources: &[(&str, &str)]) -> Self {
        Self::with_system(MemorySystem::new("/p"), sources)
    }

    fn with_system(system: MemorySystem, sources: &[(&str, &str)]) -> Self {
        for (path, content) in sources {
            system.add_file(*path, *content);
        }
        let system = Rc::new(system);
        let compiler = Compiler::with_lexical_engine(system.clone());
        Self {
            system,
            reporter: Rc::new(CollectingReporter::new()),
            compiler,
        }
    }

    fn options(&self, config: ProjectConfig, addons: Vec<Rc<dyn CompilerAddon>>) -> CompilerOptions {
        let registry = AddonRegistry::new(
            &*self.system,
            None,
            "",
            Some(config.clone()),
            Rc::new(Unresolvable),
            self.reporter.clone(),
        );
        for addon in addons {
            registry.register(addon);
        }
        CompilerOptions::new("/p", config, Rc::new(registry), self.reporter.clone())
    }

    fn configure(&mut self, config: ProjectConfig, addons: Vec<Rc<dyn CompilerAddon>>) {
        let options = self.options(config, addons);
        self.compiler.set_options(options);
    }

    fn version(&self, path: &str, target: &str) -> u64 {
        self.compiler.cache().get_version(Path::new(path), target)
    }
}

#[test]
fn compiles_single_file() {
    let mut h = Harness::new(&[("/p/a.ts", "export const x = 1;")]);
    h.configure(files(&["a.ts"]), vec![]);

    let result = h.compiler.compile().unwrap();
    assert!(!result.emit_skipped);
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.emitted_paths(), vec![PathBuf::from("/p/a.js")]);
    assert!(h.system.file("/p/a.js").unwrap().contains("const x = 1;"));
    assert_eq!(h.compiler.state(), CompilerState::ContextsCreated);
}

#[test]
fn rename_addon_rewrites_identifiers() {
    let mut h = Harness::new(&[("/p/a.ts", "export const foobar = 1;")]);
    h.configure(
        files(&["a.ts"]),
        vec![builtin("rename", "[identifiers]\nfoobar = \"barfoo\"")],
    );

    h.compiler.compile().unwrap();
    let js = h.system.file("/p/a.js").unwrap();
    assert!(js.contains("barfoo"));
    assert!(!js.contains("foobar"));
}

#[test]
fn processors_run_in_registration_order() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    let append = |suffix: &'static str| {
        addon(suffix, move |ctx| {
            ctx.register_processor(Rc::new(
                move |_: &CompilationContext, _: &Path, source: String| -> TspipeResult<String> {
                    Ok(format!("{source}{suffix}"))
                },
            ))
        })
    };
    h.configure(files(&["a.ts"]), vec![append("1"), append("2")]);

    h.compiler.compile().unwrap();
    let snapshot = h
        .compiler
        .cache()
        .get_snapshot(Path::new("/p/a.ts"), WILDCARD_TARGET)
        .unwrap();
    assert_eq!(snapshot.text(), "let a;12");
}

#[test]
fn unchanged_files_are_served_from_cache() {
    let mut h = Harness::new(&[("/p/a.ts", "let a = 1;")]);
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    h.configure(
        files(&["a.ts"]),
        vec![addon("count", move |ctx| {
            let counter = counter.clone();
            ctx.register_generator(Rc::new(
                move |_: &CompilationContext, _: &Path, _: &str| {
                    counter.set(counter.get() + 1);
                    Ok(())
                },
            ))
        })],
    );

    let first = h.compiler.compile().unwrap();
    let version = h.version("/p/a.ts", WILDCARD_TARGET);
    let second = h.compiler.compile().unwrap();

    assert_eq!(runs.get(), 1);
    assert_eq!(h.version("/p/a.ts", WILDCARD_TARGET), version);
    assert_eq!(first.emitted_files, second.emitted_files);

    h.system.add_file("/p/a.ts", "let a = 2;");
    h.compiler.compile().unwrap();
    assert_eq!(runs.get(), 2);
    assert!(h.version("/p/a.ts", WILDCARD_TARGET) > version);
}

#[test]
fn generator_can_add_root_files() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;"), ("/p/b.ts", "let b;")]);
    h.configure(
        files(&["a.ts"]),
        vec![addon("gen", |ctx| {
            ctx.register_generator(Rc::new(
                |ctx: &CompilationContext, path: &Path, _: &str| {
                    if path.ends_with("a.ts") {
                        ctx.add_input_file("b.ts");
                    }
                    Ok(())
                },
            ))
        })],
    );

    let result = h.compiler.compile().unwrap();
    assert_eq!(
        result.emitted_paths(),
        vec![PathBuf::from("/p/a.js"), PathBuf::from("/p/b.js")]
    );
    let context = h.compiler.context(WILDCARD_TARGET).unwrap();
    assert_eq!(context.root_file_count(), 2);
}

#[test]
fn result_processor_sees_every_root_once() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;"), ("/p/b.ts", "let b;")]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    h.configure(
        files(&["a.ts", "b.ts"]),
        vec![addon("collect", move |ctx| {
            let sink = sink.clone();
            ctx.register_result_processor(Rc::new(
                move |_: &CompilationContext, roots: &[PathBuf]| {
                    sink.borrow_mut().push(roots.to_vec());
                    Ok(())
                },
            ))
        })],
    );

    h.compiler.compile().unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![vec![PathBuf::from("/p/a.ts"), PathBuf::from("/p/b.ts")]]
    );
}

#[test]
fn manifest_addon_writes_index() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    h.configure(files(&["a.ts"]), vec![builtin("manifest", "")]);

    h.compiler.compile().unwrap();
    let manifest: serde_json::Value =
        serde_json::from_str(&h.system.file("/p/manifest.json").unwrap()).unwrap();
    assert_eq!(manifest["target"], WILDCARD_TARGET);
    assert_eq!(manifest["files"][0]["source"], "a.ts");
    assert_eq!(manifest["files"][0]["outputs"][0], "a.js");
}

#[test]
fn banner_addon_prefixes_output() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    h.configure(files(&["a.ts"]), vec![builtin("banner", "text = \"for {target}\"")]);

    h.compiler.compile().unwrap();
    assert!(h.system.file("/p/a.js").unwrap().starts_with("// for *\n"));
}

#[test]
fn compile_file_without_context_is_an_error() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    h.configure(files(&["a.ts"]), vec![]);
    h.compiler.compile().unwrap();

    let err = h
        .compiler
        .compile_file("nope", Path::new("/p/a.ts"), false)
        .unwrap_err();
    assert!(matches!(err, TspipeError::MissingContext { ref target } if target == "nope"));
}

#[test]
fn compile_before_options_is_an_error() {
    let h = Harness::new(&[]);
    let mut compiler = h.compiler;
    assert_eq!(compiler.state(), CompilerState::Uninitialized);
    assert!(matches!(compiler.compile(), Err(TspipeError::NotConfigured)));
}

#[test]
fn syntax_errors_skip_emit_and_are_reported() {
    let mut h = Harness::new(&[("/p/a.ts", "let a = \"unterminated;\n")]);
    h.configure(files(&["a.ts"]), vec![]);

    let result = h.compiler.compile().unwrap();
    assert!(result.emit_skipped);
    assert!(result.error_count() > 0);
    assert!(!h.reporter.errors().is_empty());
    assert!(h.system.file("/p/a.js").is_none());
}

#[test]
fn transpile_only_keeps_diagnostics_unreported() {
    let mut h = Harness::new(&[("/p/a.ts", "let a = \"unterminated;\n")]);
    let mut options = h.options(files(&["a.ts"]), vec![]);
    options.transpile_only = true;
    h.compiler.set_options(options);

    let result = h.compiler.compile().unwrap();
    assert!(result.emit_skipped);
    assert!(result.error_count() > 0);
    assert!(h.reporter.errors().is_empty());
}

#[test]
fn failed_file_stays_skipped_on_next_pass() {
    let mut h = Harness::new(&[("/p/a.ts", "let a = \"unterminated;\n")]);
    let mut options = h.options(files(&["a.ts"]), vec![]);
    options.transpile_only = true;
    h.compiler.set_options(options);

    let first = h.compiler.compile().unwrap();
    let second = h.compiler.compile().unwrap();
    assert!(first.emit_skipped);
    assert!(second.emit_skipped);
    assert_eq!(second.error_count(), first.error_count());

    h.system.add_file("/p/a.ts", "let a = \"done\";\n");
    let fixed = h.compiler.compile().unwrap();
    assert!(!fixed.emit_skipped);
    assert_eq!(fixed.emitted_paths(), vec![PathBuf::from("/p/a.js")]);
}

#[test]
fn missing_root_file_is_reported() {
    let mut h = Harness::new(&[]);
    h.configure(files(&["gone.ts"]), vec![]);

    let result = h.compiler.compile().unwrap();
    assert!(result.emit_skipped);
    assert!(result.diagnostics.iter().any(|d| d.code == Some(6053)));
}

#[test]
fn transpile_only_json_is_copied_under_out_dir() {
    let mut h = Harness::new(&[("/p/data.json", "{\"a\": 1}")]);
    let mut options = h.options(files(&["data.json"]), vec![]);
    options.transpile_only = true;
    options.out_dir = Some(PathBuf::from("/p/dist"));
    h.compiler.set_options(options);

    let result = h.compiler.compile().unwrap();
    assert!(!result.emit_skipped);
    assert_eq!(result.emitted_paths(), vec![PathBuf::from("/p/dist/data.json")]);
    assert_eq!(h.system.file("/p/dist/data.json").unwrap(), "{\"a\": 1}");
}

#[test]
fn transpile_only_json_without_out_dir_emits_nothing() {
    let mut h = Harness::new(&[("/p/data.json", "{\"a\": 1}")]);
    let mut options = h.options(files(&["data.json"]), vec![]);
    options.transpile_only = true;
    h.compiler.set_options(options);

    let result = h.compiler.compile().unwrap();
    assert!(!result.emit_skipped);
    assert!(result.emitted_files.is_empty());
}

#[test]
fn non_writing_target_emits_without_writing() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    let mut targets = BTreeMap::new();
    targets.insert(
        "check".to_string(),
        TargetConfig {
            write: Some(false),
            ..Default::default()
        },
    );
    let config = ProjectConfig {
        targets: Some(targets),
        ..files(&["a.ts"])
    };
    let mut options = h.options(config, vec![]);
    options.targets = vec!["check".to_string()];
    h.compiler.set_options(options);

    let result = h.compiler.compile().unwrap();
    assert_eq!(result.emitted_files.len(), 1);
    assert!(h.system.file("/p/a.js").is_none());
}

#[test]
fn targets_are_isolated() {
    let mut h = Harness::new(&[("/p/x.ts", "export const foo = 1;")]);
    let target = |out_dir: &str, settings: &str| TargetConfig {
        compiler_options: ProjectOptions {
            out_dir: Some(PathBuf::from(out_dir)),
            ..Default::default()
        },
        settings: toml::from_str(settings).unwrap(),
        ..Default::default()
    };
    let mut targets = BTreeMap::new();
    targets.insert(
        "a".to_string(),
        target("/p/out-a", "[rename.identifiers]\nfoo = \"bar\""),
    );
    targets.insert("b".to_string(), target("/p/out-b", ""));
    let config = ProjectConfig {
        targets: Some(targets),
        ..files(&["x.ts"])
    };
    let mut options = h.options(config, vec![builtin("rename", "")]);
    options.targets = vec!["a".to_string(), "b".to_string()];
    h.compiler.set_options(options);

    h.compiler.compile().unwrap();
    assert!(h.system.file("/p/out-a/x.js").unwrap().contains("bar"));
    assert!(h.system.file("/p/out-b/x.js").unwrap().contains("foo"));

    let before_b = h.version("/p/x.ts", "b");
    h.compiler
        .compile_file("a", Path::new("/p/x.ts"), true)
        .unwrap();
    assert_eq!(h.version("/p/x.ts", "b"), before_b);
}

#[test]
fn watch_reports_missing_primitive() {
    let mut h = Harness::with_system(
        MemorySystem::new("/p").without_watch(),
        &[("/p/a.ts", "let a;")],
    );
    let mut options = h.options(files(&["a.ts"]), vec![]);
    options.watch = true;
    h.compiler.set_options(options);

    let result = h.compiler.watch().unwrap();
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message == "File watching is not supported by the current system."));
    assert_eq!(h.reporter.errors().len(), 1);
    assert_eq!(h.compiler.watcher_count(), 0);
    assert!(h.system.file("/p/a.js").is_some());
}

#[test]
fn addon_watch_requests_without_primitive_are_not_errors() {
    let mut h = Harness::with_system(
        MemorySystem::new("/p").without_watch(),
        &[
            ("/p/comp.ts", "import './style.css';\nexport const c = 1;\n"),
            ("/p/style.css", "body {}"),
        ],
    );
    let mut options = h.options(files(&["comp.ts"]), vec![builtin("asset-imports", "")]);
    options.watch = true;
    h.compiler.set_options(options);

    let result = h.compiler.watch().unwrap();
    assert_eq!(h.reporter.errors().len(), 1);
    assert!(result.diagnostics.iter().any(Diagnostic::is_error));
    assert_eq!(h.compiler.watcher_count(), 0);
    assert!(h.system.file("/p/comp.js").is_some());
}

#[test]
fn watch_compiles_and_watches_generated_roots() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;"), ("/p/gen.ts", "let g;")]);
    let mut options = h.options(
        files(&["a.ts"]),
        vec![addon("gen", |ctx| {
            ctx.register_generator(Rc::new(
                |ctx: &CompilationContext, _: &Path, source: &str| {
                    if source.contains("gen") {
                        ctx.add_input_file("gen.ts");
                    }
                    Ok(())
                },
            ))
        })],
    );
    options.watch = true;
    h.compiler.set_options(options);
    h.compiler.watch().unwrap();
    assert_eq!(h.compiler.watcher_count(), 1);

    h.system.add_file("/p/a.ts", "let gen;");
    h.system.notify("/p/a.ts");
    let result = h.compiler.drain_changes().unwrap();

    assert_eq!(
        result.emitted_paths(),
        vec![PathBuf::from("/p/a.js"), PathBuf::from("/p/gen.js")]
    );
    assert_eq!(h.compiler.watcher_count(), 2);
    assert!(h.system.file("/p/gen.js").is_some());
}

#[test]
fn asset_change_recompiles_importer() {
    let mut h = Harness::new(&[
        ("/p/comp.ts", "import './style.css';\nexport const c = 1;\n"),
        ("/p/style.css", "body {}"),
    ]);
    let mut options = h.options(files(&["comp.ts"]), vec![builtin("asset-imports", "")]);
    options.watch = true;
    h.compiler.set_options(options);

    h.compiler.watch().unwrap();
    let before = h.version("/p/comp.ts", WILDCARD_TARGET);
    assert_eq!(h.compiler.watcher_count(), 2);

    h.system.add_file("/p/style.css", "body { color: red }");
    assert_eq!(h.system.notify("/p/style.css"), 1);
    let result = h.compiler.drain_changes().unwrap();

    assert_eq!(result.emitted_paths(), vec![PathBuf::from("/p/comp.js")]);
    assert!(h.version("/p/comp.ts", WILDCARD_TARGET) > before);
    assert!(h
        .reporter
        .watch_statuses()
        .iter()
        .any(|s| s.starts_with("File change detected: /p/style.css")));
}

#[test]
fn source_change_recompiles_only_that_file() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;"), ("/p/b.ts", "let b;")]);
    let mut options = h.options(files(&["a.ts", "b.ts"]), vec![]);
    options.watch = true;
    h.compiler.set_options(options);
    h.compiler.watch().unwrap();
    let b_version = h.version("/p/b.ts", WILDCARD_TARGET);

    h.system.add_file("/p/a.ts", "let a = 2;");
    h.system.notify("/p/a.ts");
    h.system.notify("/p/a.ts");
    let result = h.compiler.drain_changes().unwrap();

    assert_eq!(result.emitted_paths(), vec![PathBuf::from("/p/a.js")]);
    assert!(h.system.file("/p/a.js").unwrap().contains("let a = 2;"));
    assert_eq!(h.version("/p/b.ts", WILDCARD_TARGET), b_version);
}

#[test]
fn deleted_file_is_evicted() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    let mut options = h.options(files(&["a.ts"]), vec![]);
    options.watch = true;
    h.compiler.set_options(options);
    h.compiler.watch().unwrap();
    assert!(h.compiler.cache().contains(Path::new("/p/a.ts"), WILDCARD_TARGET));

    h.system.remove_file("/p/a.ts");
    h.system.notify("/p/a.ts");
    h.compiler.drain_changes().unwrap();

    assert!(!h.compiler.cache().contains(Path::new("/p/a.ts"), WILDCARD_TARGET));
    let context = h.compiler.context(WILDCARD_TARGET).unwrap();
    assert!(context.is_root_file(Path::new("/p/a.ts")));
}

#[test]
fn set_options_closes_previous_watchers() {
    let mut h = Harness::new(&[("/p/a.ts", "let a;")]);
    let mut options = h.options(files(&["a.ts"]), vec![]);
    options.watch = true;
    h.compiler.set_options(options);
    h.compiler.watch().unwrap();
    assert_eq!(h.system.active_watch_count(), 1);

    h.configure(files(&["a.ts"]), vec![]);
    assert_eq!(h.system.active_watch_count(), 0);
    assert_eq!(h.compiler.watcher_count(), 0);
    assert_eq!(h.compiler.state(), CompilerState::OptionsSet);
    assert!(h.compiler.context(WILDCARD_TARGET).is_none());
    assert!(h.compiler.cache().is_empty());
}
