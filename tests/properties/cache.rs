//! Property tests for the file cache.

use std::path::Path;
use std::rc::Rc;

use proptest::prelude::*;

use tspipe::application::FileCache;
use tspipe::MemorySystem;

fn cache_with(path: &str, content: &str) -> FileCache {
    let system = MemorySystem::new("/p");
    system.add_file(path, content);
    FileCache::new(Rc::new(system))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: recording the same source twice bumps the version once.
    #[test]
    fn property_update_source_is_idempotent(content in "(?s).{0,128}") {
        let path = Path::new("/p/a.ts");
        let cache = cache_with("/p/a.ts", &content);

        prop_assert!(cache.update_source(path, &content, "t"));
        prop_assert!(!cache.update_source(path, &content, "t"));
        prop_assert_eq!(cache.get_version(path, "t"), 1);
        prop_assert!(!cache.has_changed(path, "t"));
    }

    /// PROPERTY: versions never decrease and move exactly on content changes.
    #[test]
    fn property_version_counts_changes(
        contents in proptest::collection::vec("[a-c]{0,3}", 1..12)
    ) {
        let path = Path::new("/p/a.ts");
        let cache = cache_with("/p/a.ts", "");

        let mut expected = 0u64;
        let mut previous: Option<&String> = None;
        for content in &contents {
            if previous != Some(content) {
                expected += 1;
            }
            let before = cache.get_version(path, "t");
            cache.update_source(path, content, "t");
            prop_assert!(cache.get_version(path, "t") >= before);
            previous = Some(content);
        }
        prop_assert_eq!(cache.get_version(path, "t"), expected);
    }

    /// PROPERTY: a stale entry always bumps on the next update.
    #[test]
    fn property_mark_stale_forces_bump(content in "[a-z ;=]{0,32}") {
        let path = Path::new("/p/a.ts");
        let cache = cache_with("/p/a.ts", &content);

        cache.update_source(path, &content, "t");
        cache.mark_stale(path, "t");
        prop_assert!(cache.has_changed(path, "t"));
        prop_assert!(cache.update_source(path, &content, "t"));
        prop_assert_eq!(cache.get_version(path, "t"), 2);
    }
}
