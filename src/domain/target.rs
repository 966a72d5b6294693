//! Target names
//!
//! A target is a named compilation configuration. The name `*` denotes the
//! default, untargeted context that runs every available addon.

/// Name of the default/untargeted context
pub const WILDCARD_TARGET: &str = "*";

/// Returns true for the default/untargeted target name
pub fn is_wildcard(target: &str) -> bool {
    target == WILDCARD_TARGET
}

/// Split a comma-separated name list, trimming entries and dropping empty ones.
///
/// Used for both target lists and addon lists.
pub fn split_name_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a requested target list: empty means `["*"]`, duplicates are dropped
/// while preserving first-seen order.
pub fn normalize_targets<I, S>(targets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for target in targets {
        for name in split_name_list(target.as_ref()) {
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    if out.is_empty() {
        out.push(WILDCARD_TARGET.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_list_trims_and_drops_empty() {
        assert_eq!(split_name_list(" a, ,b ,, c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_name_list_empty_input() {
        assert!(split_name_list("").is_empty());
    }

    #[test]
    fn normalize_targets_defaults_to_wildcard() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(normalize_targets(empty), vec!["*"]);
    }

    #[test]
    fn normalize_targets_keeps_order_and_dedups() {
        assert_eq!(
            normalize_targets(["web,node", "web", "cli"]),
            vec!["web", "node", "cli"]
        );
    }

    #[test]
    fn wildcard_detection() {
        assert!(is_wildcard("*"));
        assert!(!is_wildcard("main"));
    }
}
