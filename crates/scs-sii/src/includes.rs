//! `@include` target collection.
//!
//! Paths are archive paths: `/`-separated, no drive, no leading slash once
//! resolved. Merging the included files is left to the caller.

use crate::cst::{Include, SiiFile};
use crate::visitor::Visitor;

/// Resolve `target` against the directory `base`.
///
/// A leading `/` means the archive root. `.` segments are dropped and `..`
/// pops one level, never above the root.
pub fn resolve_include(base: &str, target: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base.is_empty() => target.to_string(),
        None => format!("{}/{target}", base.trim_end_matches('/')),
    };
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Visitor that records every include path, resolved against a base directory.
#[derive(Debug, Clone, Default)]
pub struct IncludeCollector {
    base: String,
    paths: Vec<String>,
}

impl IncludeCollector {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            paths: Vec::new(),
        }
    }

    /// Run over `file` and return the targets in document order.
    pub fn collect(mut self, file: &SiiFile) -> Vec<String> {
        self.visit_file(file);
        self.paths
    }
}

impl Visitor for IncludeCollector {
    fn visit_include(&mut self, include: &Include) {
        self.paths.push(resolve_include(&self.base, &include.path));
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::parser::parse_sii;

    #[rstest]
    #[case("def", "city/berlin.sui", "def/city/berlin.sui")]
    #[case("def/", "./city.sui", "def/city.sui")]
    #[case("def/city", "../country.sui", "def/country.sui")]
    #[case("def/city", "/def/world/a.sui", "def/world/a.sui")]
    #[case("", "a.sui", "a.sui")]
    #[case("def", "../../x.sui", "x.sui")]
    fn test_resolve(#[case] base: &str, #[case] target: &str, #[case] expected: &str) {
        assert_eq!(resolve_include(base, target), expected);
    }

    #[test]
    fn test_collects_nested_includes_in_order() {
        let file = parse_sii(
            r#"SiiNunit {
@include "a.sui"
x : .y {
    @include "/root.sui"
    v: 1
}
@include "sub/b.sui"
}"#,
        )
        .tree
        .unwrap();
        let paths = IncludeCollector::new("def/city").collect(&file);
        assert_eq!(paths, ["def/city/a.sui", "root.sui", "def/city/sub/b.sui"]);
    }
}
