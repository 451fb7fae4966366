//! Structural comparison of normalized representations
//!
//! The comparison walks the keys of `from` only, so it is directional: keys
//! present only in `to` are never examined. Lists of scalars are compared by
//! membership rather than position.

use serde_json::{Map, Value};

/// Server-computed keys skipped on either side
pub const IGNORED_KEYS: [&str; 2] = ["links", "auditInfo"];

/// Whether `from` is equivalent to `to`
pub fn equivalent(from: &Value, to: &Value) -> bool {
    match (from, to) {
        (Value::Object(from), Value::Object(to)) => compare_objects(from, to),
        (Value::Array(from), Value::Array(to)) => compare_lists(from, to),
        _ => from == to,
    }
}

pub fn compare_objects(from: &Map<String, Value>, to: &Map<String, Value>) -> bool {
    for (key, value) in from {
        if IGNORED_KEYS.contains(&key.as_str()) {
            continue;
        }

        let Some(dest) = to.get(key) else {
            return false;
        };

        let same = match (value, dest) {
            (Value::Null, Value::Null) => true,
            (Value::Object(value), Value::Object(dest)) => compare_objects(value, dest),
            (Value::Object(_), _) => false,
            (Value::Array(value), Value::Array(dest)) => compare_lists(value, dest),
            (Value::Array(_), _) => false,
            _ => value == dest,
        };

        if !same {
            return false;
        }
    }

    true
}

pub fn compare_lists(from: &[Value], to: &[Value]) -> bool {
    if from.len() != to.len() {
        return false;
    }

    // Membership covers every scalar, numbers and booleans included, not only strings
    from.iter().zip(to).all(|(element, dest)| match element {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => to.contains(element),
        Value::Object(element) => match dest {
            Value::Object(dest) => compare_objects(element, dest),
            _ => false,
        },
        _ => element == dest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::category::Category;
    use crate::sync::normalize::normalize;
    use serde_json::json;

    #[test]
    fn test_reflexive_after_normalization() {
        let samples = [
            (
                Category::Patient,
                json!({
                    "uuid": "1",
                    "person": {"preferredName": {"display": "A"}, "names": [{"givenName": "A"}]},
                    "links": [{"rel": "self"}]
                }),
            ),
            (
                Category::Observation,
                json!({"concept": {"uuid": "c"}, "groupMembers": null, "tags": ["a", "b"]}),
            ),
            (Category::Form, json!({"formFields": [], "encounterType": {"uuid": "e"}})),
        ];
        for (category, sample) in samples {
            let normalized = normalize(category, sample);
            assert!(equivalent(&normalized, &normalized));
        }
    }

    #[test]
    fn test_ignored_keys_are_skipped() {
        let from = json!({"uuid": "1", "links": [{"rel": "self"}], "auditInfo": {"creator": "a"}});
        let to = json!({"uuid": "1"});
        assert!(equivalent(&from, &to));
    }

    #[test]
    fn test_missing_key_is_a_divergence() {
        let from = json!({"uuid": "1", "gender": "F"});
        let to = json!({"uuid": "1"});
        assert!(!equivalent(&from, &to));
    }

    #[test]
    fn test_comparison_is_directional() {
        // Keys only present in `to` are never examined.
        let from = json!({"uuid": "1"});
        let to = json!({"uuid": "1", "gender": "F"});
        assert!(equivalent(&from, &to));
        assert!(!equivalent(&to, &from));
    }

    #[test]
    fn test_scalar_lists_ignore_order() {
        let from = json!({"tags": ["a", "b"]});
        let to = json!({"tags": ["b", "a"]});
        assert!(equivalent(&from, &to));

        let numbers = json!({"values": [1, 2, 3]});
        let shuffled = json!({"values": [3, 1, 2]});
        assert!(equivalent(&numbers, &shuffled));
    }

    #[test]
    fn test_number_and_bool_lists_use_membership() {
        // Not only strings: positional comparison would reject both pairs.
        let numbers = json!({"doses": [5, 10]});
        let reordered = json!({"doses": [10, 5]});
        assert!(equivalent(&numbers, &reordered));

        let flags = json!({"flags": [true, false]});
        let flipped = json!({"flags": [false, true]});
        assert!(equivalent(&flags, &flipped));

        let mixed = json!({"values": [1, "1"]});
        let other = json!({"values": ["1", 2]});
        assert!(!equivalent(&mixed, &other));
    }

    #[test]
    fn test_scalar_lists_use_membership_not_multiplicity() {
        // Membership only: duplicates on one side are not detected.
        let from = json!({"tags": ["a", "a"]});
        let to = json!({"tags": ["a", "b"]});
        assert!(equivalent(&from, &to));
        assert!(!equivalent(&to, &from));
    }

    #[test]
    fn test_lists_of_different_length_diverge() {
        let from = json!({"tags": ["a", "b"]});
        let to = json!({"tags": ["a", "b", "c"]});
        assert!(!equivalent(&from, &to));
        assert!(!equivalent(&to, &from));
    }

    #[test]
    fn test_object_lists_compare_positionally() {
        let from = json!({"names": [{"givenName": "A"}, {"givenName": "B"}]});
        let swapped = json!({"names": [{"givenName": "B"}, {"givenName": "A"}]});
        assert!(equivalent(&from, &from.clone()));
        assert!(!equivalent(&from, &swapped));
    }

    #[test]
    fn test_nested_divergence_short_circuits() {
        let from = json!({"person": {"gender": "F"}, "uuid": "1"});
        let to = json!({"person": {"gender": "M"}, "uuid": "1"});
        assert!(!equivalent(&from, &to));
    }

    #[test]
    fn test_null_handling() {
        assert!(equivalent(&json!({"a": null}), &json!({"a": null})));
        assert!(!equivalent(&json!({"a": "x"}), &json!({"a": null})));
        assert!(!equivalent(&json!({"a": null}), &json!({"a": "x"})));
    }

    #[test]
    fn test_shape_mismatch_diverges() {
        assert!(!equivalent(&json!({"a": {"b": 1}}), &json!({"a": "b"})));
        assert!(!equivalent(&json!({"a": [1]}), &json!({"a": 1})));
    }
}
