//! Resource normalization
//!
//! Strips fields that differ between instances for reasons unrelated to the
//! record itself (denormalized names, computed links) before two copies are
//! compared.

use serde_json::{Map, Value};

use super::category::Category;

/// Normalize `representation` according to `category`
///
/// Idempotent; categories without rules pass through unchanged.
pub fn normalize(category: Category, mut representation: Value) -> Value {
    if let Value::Object(object) = &mut representation {
        normalize_object(category, object);
    }
    representation
}

/// Normalize using the category named by the resource URL
pub fn normalize_for_url(url: &str, representation: Value) -> Value {
    match Category::from_resource_url(url) {
        Some(category) => normalize(category, representation),
        None => representation,
    }
}

fn normalize_object(category: Category, object: &mut Map<String, Value>) {
    match category {
        Category::Patient => {
            if let Some(Value::Object(person)) = object.get_mut("person") {
                strip_person(person);
            }
        }
        Category::Observation => collapse_concept(object),
        Category::Visit => {
            object.remove("preferredName");
        }
        Category::Form => {
            object.remove("formFields");
            object.remove("resources");
        }
        Category::Person => strip_person(object),
        _ => {}
    }
}

fn strip_person(person: &mut Map<String, Value>) {
    person.remove("preferredName");
    person.remove("preferredAddress");
}

/// Replace a nested concept object by its uuid
fn collapse_concept(object: &mut Map<String, Value>) {
    if let Some(concept) = object.get_mut("concept") {
        if concept.is_object() {
            let uuid = concept.get("uuid").cloned().unwrap_or(Value::Null);
            *concept = uuid;
        }
    }
}
