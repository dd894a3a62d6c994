//! Normalized schema trees from attribute path sets.
//!
//! Paths are grouped level by level on their first segment, in first-seen
//! order:
//!
//! ```text
//! {[a,b], [a,c], [d]}   →   [{"a": ["b", "c"]}, "d"]
//! {[a]}                 →   "a"
//! {[a], [a,b]}          →   ["a", {"a": "b"}]
//! ```

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::attribute_path::{AttributePath, AttributePathSet};

/// Several distinct roots become an array, a single root an object keyed by
/// it, a root without deeper levels a bare name. A root that is both a leaf
/// and a parent contributes both entries.
pub fn generate_schema(paths: &AttributePathSet) -> Value {
    let suffixes: Vec<&[String]> = paths.iter().map(AttributePath::segments).collect();
    level(&suffixes)
}

fn level(paths: &[&[String]]) -> Value {
    let mut groups: IndexMap<&str, Vec<&[String]>> = IndexMap::new();
    for path in paths {
        if let Some((head, rest)) = path.split_first() {
            groups.entry(head.as_str()).or_default().push(rest);
        }
    }

    let mut entries = Vec::new();
    for (root, rest) in groups {
        let terminal = rest.iter().any(|r| r.is_empty());
        let deeper: Vec<&[String]> = rest.into_iter().filter(|r| !r.is_empty()).collect();

        if terminal || deeper.is_empty() {
            entries.push(Value::String(root.to_string()));
        }
        if !deeper.is_empty() {
            let mut object = Map::new();
            object.insert(root.to_string(), level(&deeper));
            entries.push(Value::Object(object));
        }
    }

    if entries.len() == 1 {
        entries.remove(0)
    } else {
        Value::Array(entries)
    }
}

/// Walk a generated schema back to the attribute paths it describes.
pub fn schema_paths(schema: &Value) -> AttributePathSet {
    let mut out = AttributePathSet::new();
    let mut prefix = Vec::new();
    walk(schema, &mut prefix, &mut out);
    out
}

fn walk(node: &Value, prefix: &mut Vec<String>, out: &mut AttributePathSet) {
    match node {
        Value::String(name) => {
            prefix.push(name.clone());
            out.insert(AttributePath::new(prefix.iter().cloned()));
            prefix.pop();
        }
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, prefix, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn set(paths: &[&[&str]]) -> AttributePathSet {
        paths.iter().map(|p| AttributePath::new(p.iter().copied())).collect()
    }

    #[test]
    fn test_two_roots_one_nested() {
        let paths = set(&[&["a", "b"], &["a", "c"], &["d"]]);
        assert_eq!(generate_schema(&paths), json!([{ "a": ["b", "c"] }, "d"]));
    }

    #[test]
    fn test_single_leaf() {
        assert_eq!(generate_schema(&set(&[&["a"]])), json!("a"));
    }

    #[test]
    fn test_single_deep_path() {
        assert_eq!(generate_schema(&set(&[&["a", "b", "c"]])), json!({ "a": { "b": "c" } }));
    }

    #[test]
    fn test_leaf_and_parent_at_same_level() {
        let paths = set(&[&["a"], &["a", "b"]]);
        let schema = generate_schema(&paths);
        assert_eq!(schema, json!(["a", { "a": "b" }]));
        assert_eq!(schema_paths(&schema), paths);
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(generate_schema(&AttributePathSet::new()), json!([]));
        assert!(schema_paths(&json!([])).is_empty());
    }

    #[test]
    fn test_deterministic_for_fixed_order() {
        let paths = set(&[&["x", "y"], &["a"], &["x", "z", "w"]]);
        assert_eq!(generate_schema(&paths), generate_schema(&paths.clone()));
    }

    fn path_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e]{1,2}", 1..=5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_schema_round_trip(raw in prop::collection::vec(path_strategy(), 0..12)) {
            let paths: AttributePathSet = raw.iter().cloned().map(AttributePath::new).collect();
            let schema = generate_schema(&paths);
            let walked: BTreeSet<AttributePath> = schema_paths(&schema).into_iter().collect();
            let expected: BTreeSet<AttributePath> = paths.into_iter().collect();
            prop_assert_eq!(walked, expected);
        }

        #[test]
        fn prop_round_trip_ignores_insertion_order(raw in prop::collection::vec(path_strategy(), 1..10)) {
            let forward: AttributePathSet = raw.iter().cloned().map(AttributePath::new).collect();
            let backward: AttributePathSet = raw.iter().rev().cloned().map(AttributePath::new).collect();
            let a: BTreeSet<AttributePath> = schema_paths(&generate_schema(&forward)).into_iter().collect();
            let b: BTreeSet<AttributePath> = schema_paths(&generate_schema(&backward)).into_iter().collect();
            prop_assert_eq!(a, b);
        }
    }
}
