//! Canonical property ordering for feed documents.
//!
//! `@id` comes first and `@type` second, `@context` is always last, and the remaining
//! keys sort case-insensitively with an ordinal tie break. Arrays keep their order.

use std::cmp::Ordering;

use serde_json::{Map, Value};

fn key_rank(key: &str) -> u8 {
    match key {
        "@id" => 0,
        "@type" => 1,
        "@context" => 3,
        _ => 2,
    }
}

pub fn compare_keys(a: &str, b: &str) -> Ordering {
    key_rank(a)
        .cmp(&key_rank(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Returns `value` with every object's keys in canonical order.
pub fn order_properties(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));

            let mut ordered = Map::with_capacity(entries.len());
            for (key, child) in entries {
                ordered.insert(key, order_properties(child));
            }
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(order_properties).collect()),
        other => other,
    }
}

/// Pretty-printed bytes of `value` in canonical order.
pub fn to_canonical_vec(value: Value) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(&order_properties(value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn test_special_keys_are_pinned() {
        let value = order_properties(json!({
            "@context": {},
            "zeta": 1,
            "@type": "Catalog",
            "Alpha": 2,
            "@id": "https://example.com/index.json",
            "beta": 3
        }));

        assert_eq!(
            keys(&value),
            vec!["@id", "@type", "Alpha", "beta", "zeta", "@context"]
        );
    }

    #[test]
    fn test_nested_objects_inside_arrays_are_ordered() {
        let value = order_properties(json!({
            "items": [
                { "version": "1.0.0", "@id": "a" },
                { "count": 1, "@type": "Page", "@id": "b" }
            ]
        }));

        let items = value["items"].as_array().unwrap();
        assert_eq!(keys(&items[0]), vec!["@id", "version"]);
        assert_eq!(keys(&items[1]), vec!["@id", "@type", "count"]);
        assert_eq!(items[0]["@id"], "a");
    }

    #[test]
    fn test_case_tie_breaks_ordinally() {
        assert_eq!(compare_keys("Id", "id"), Ordering::Less);
        assert_eq!(compare_keys("id", "ID"), Ordering::Greater);
        assert_eq!(compare_keys("apple", "Banana"), Ordering::Less);
    }
}
