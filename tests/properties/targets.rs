//! Property tests for per-target isolation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use proptest::prelude::*;

use tspipe::application::{AddonRegistry, Compiler, CompilerOptions};
use tspipe::infrastructure::ManifestResolver;
use tspipe::{CollectingReporter, MemorySystem, ProjectConfig, TargetConfig};

fn compiler_for(targets: &[String]) -> Compiler {
    let system = Rc::new(MemorySystem::new("/p"));
    system.add_file("/p/a.ts", "let a = 1;");
    system.add_file("/p/b.ts", "let b = 2;");

    let configured: BTreeMap<String, TargetConfig> = targets
        .iter()
        .map(|t| {
            (
                t.clone(),
                TargetConfig {
                    write: Some(false),
                    ..Default::default()
                },
            )
        })
        .collect();
    let config = ProjectConfig {
        files: vec![PathBuf::from("a.ts"), PathBuf::from("b.ts")],
        targets: Some(configured),
        ..Default::default()
    };

    let reporter = Rc::new(CollectingReporter::new());
    let registry = AddonRegistry::new(
        &*system,
        None,
        "",
        Some(config.clone()),
        Rc::new(ManifestResolver::new(system.clone())),
        reporter.clone(),
    );
    let mut options = CompilerOptions::new("/p", config, Rc::new(registry), reporter);
    options.targets = targets.to_vec();

    let mut compiler = Compiler::with_lexical_engine(system);
    compiler.set_options(options);
    compiler
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: force-recompiling a file for one target leaves every
    /// other target's cache entry untouched.
    #[test]
    fn property_recompile_is_target_local(
        names in proptest::collection::btree_set("[a-z]{1,6}", 1..5),
        pick in any::<prop::sample::Index>(),
    ) {
        let targets: Vec<String> = names.into_iter().collect();
        let mut compiler = compiler_for(&targets);
        let result = compiler.compile().unwrap();
        prop_assert!(!result.emit_skipped);

        let touched = &targets[pick.index(targets.len())];
        let path = Path::new("/p/a.ts");
        let before: Vec<u64> = targets
            .iter()
            .map(|t| compiler.cache().get_version(path, t))
            .collect();

        compiler.compile_file(touched, path, true).unwrap();

        for (target, version) in targets.iter().zip(before) {
            let now = compiler.cache().get_version(path, target);
            if target == touched {
                prop_assert_eq!(now, version + 1);
            } else {
                prop_assert_eq!(now, version);
            }
        }
    }
}
