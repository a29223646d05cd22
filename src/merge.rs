//! Deep merge of nested configuration maps.
//!
//! Sources are folded left to right, later sources taking priority:
//!
//! - two objects under the same key are merged key by key,
//! - two non-object values resolve to the later one,
//! - an object and a non-object resolve to the object, whichever came first.
//!
//! Keys are matched ignoring ASCII case; the spelling that arrived first is
//! kept.

use crate::value::{find_key, ConfigValue, Map};

/// Merges `overlay` into `base` in place.
///
/// # Example
/// ```
/// use tierconf::merge::deep_merge;
/// use tierconf::value::Map;
/// use tierconf::ConfigValue;
///
/// let mut base: Map = serde_json::from_str(r#"{"a": {"b": 1}}"#).unwrap();
/// let overlay: Map = serde_json::from_str(r#"{"a": {"c": 2}}"#).unwrap();
/// deep_merge(&mut base, overlay);
///
/// let expected: Map = serde_json::from_str(r#"{"a": {"b": 1, "c": 2}}"#).unwrap();
/// assert_eq!(base, expected);
/// ```
pub fn deep_merge(base: &mut Map, overlay: Map) {
    merge_at(base, overlay, "", &mut Vec::new());
}

/// Like [`deep_merge`], returning the dotted keys whose incoming
/// non-mapping value was dropped because a mapping already sat there.
///
/// # Example
/// ```
/// use tierconf::merge::deep_merge_with_dropped;
/// use tierconf::value::Map;
///
/// let mut base: Map = serde_json::from_str(r#"{"db": {"host": "h"}}"#).unwrap();
/// let overlay: Map = serde_json::from_str(r#"{"db": 5}"#).unwrap();
/// assert_eq!(deep_merge_with_dropped(&mut base, overlay), vec!["db"]);
/// ```
pub fn deep_merge_with_dropped(base: &mut Map, overlay: Map) -> Vec<String> {
    let mut dropped = Vec::new();
    merge_at(base, overlay, "", &mut dropped);
    dropped
}

/// Merges a single incoming value into an existing slot.
pub fn merge_value(existing: &mut ConfigValue, incoming: ConfigValue) {
    merge_value_at(existing, incoming, "", &mut Vec::new());
}

fn merge_at(base: &mut Map, overlay: Map, prefix: &str, dropped: &mut Vec<String>) {
    for (key, incoming) in overlay {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match find_key(base, &key).cloned() {
            Some(stored) => {
                if let Some(existing) = base.get_mut(&stored) {
                    merge_value_at(existing, incoming, &path, dropped);
                }
            }
            None => {
                base.insert(key, incoming);
            }
        }
    }
}

fn merge_value_at(
    existing: &mut ConfigValue,
    incoming: ConfigValue,
    path: &str,
    dropped: &mut Vec<String>,
) {
    match (existing, incoming) {
        (ConfigValue::Object(current), ConfigValue::Object(next)) => {
            merge_at(current, next, path, dropped)
        }
        // structure wins over scalars
        (ConfigValue::Object(_), next) => {
            tracing::warn!(
                key = path,
                kind = next.type_name(),
                "dropping non-mapping value merged over a mapping"
            );
            dropped.push(path.to_string());
        }
        (slot, next) => *slot = next,
    }
}

/// Folds any number of sources into one map, lowest priority first.
pub fn merge_all<I>(sources: I) -> Map
where
    I: IntoIterator<Item = Map>,
{
    sources.into_iter().fold(Map::new(), |mut acc, source| {
        deep_merge(&mut acc, source);
        acc
    })
}

/// Non-consuming variant of [`merge_all`].
pub fn merged<'a, I>(sources: I) -> Map
where
    I: IntoIterator<Item = &'a Map>,
{
    merge_all(sources.into_iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(json: &str) -> Map {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_nested_objects_are_combined() {
        let result = merge_all([map(r#"{"a": {"b": 1}}"#), map(r#"{"a": {"c": 2}}"#)]);
        assert_eq!(result, map(r#"{"a": {"b": 1, "c": 2}}"#));
    }

    #[test]
    fn test_later_scalar_wins() {
        let result = merge_all([map(r#"{"a": 1, "b": "x"}"#), map(r#"{"a": 2}"#)]);
        assert_eq!(result, map(r#"{"a": 2, "b": "x"}"#));
    }

    #[test]
    fn test_object_replaces_earlier_scalar() {
        let result = merge_all([map(r#"{"a": 1}"#), map(r#"{"a": {"b": 2}}"#)]);
        assert_eq!(result, map(r#"{"a": {"b": 2}}"#));
    }

    #[test]
    fn test_object_survives_later_scalar() {
        let result = merge_all([map(r#"{"a": {"b": 2}}"#), map(r#"{"a": 1}"#)]);
        assert_eq!(result, map(r#"{"a": {"b": 2}}"#));
    }

    #[test]
    fn test_dropped_scalar_is_reported_with_full_key() {
        let mut base = map(r#"{"app": {"database": {"host": "h"}, "name": "x"}}"#);
        let dropped = deep_merge_with_dropped(
            &mut base,
            map(r#"{"APP": {"database": 5, "name": "y"}}"#),
        );
        assert_eq!(dropped, vec!["APP.database"]);
        assert_eq!(
            base,
            map(r#"{"app": {"database": {"host": "h"}, "name": "y"}}"#)
        );

        let mut base = map(r#"{"a": 1}"#);
        assert!(deep_merge_with_dropped(&mut base, map(r#"{"a": {"b": 2}}"#)).is_empty());
    }

    #[test]
    fn test_arrays_are_replaced_not_merged() {
        let result = merge_all([map(r#"{"a": [1, 2]}"#), map(r#"{"a": [3]}"#)]);
        assert_eq!(result, map(r#"{"a": [3]}"#));
    }

    #[test]
    fn test_case_insensitive_keys_merge() {
        let result = merge_all([
            map(r#"{"Database": {"host": "a"}}"#),
            map(r#"{"DATABASE": {"port": 1}}"#),
        ]);
        assert_eq!(result, map(r#"{"Database": {"host": "a", "port": 1}}"#));
    }

    #[test]
    fn test_deeply_nested_merge() {
        let result = merge_all([
            map(r#"{"a": {"b": {"c": 1, "d": 1}}}"#),
            map(r#"{"a": {"b": {"d": 2}, "e": 3}}"#),
            map(r#"{"a": {"b": {"f": 4}}}"#),
        ]);
        assert_eq!(
            result,
            map(r#"{"a": {"b": {"c": 1, "d": 2, "f": 4}, "e": 3}}"#)
        );
    }

    #[test]
    fn test_merged_does_not_consume() {
        let a = map(r#"{"x": 1}"#);
        let b = map(r#"{"y": 2}"#);
        let result = merged([&a, &b]);
        assert_eq!(result, map(r#"{"x": 1, "y": 2}"#));
        assert_eq!(a, map(r#"{"x": 1}"#));
    }
}
