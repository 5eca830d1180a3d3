//! Read helpers for the parts of an OpenAPI tree the engine inspects.
//!
//! Every accessor degrades to an empty value when a section is missing or has
//! the wrong shape.

use std::sync::LazyLock;

use serde_json::{Map, Value};

/// HTTP methods in canonical traversal order.
pub const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// The object stored under `key`, or an empty object.
pub fn object<'a>(value: &'a Value, key: &str) -> &'a Map<String, Value> {
    match value.get(key) {
        Some(child) => fields(child),
        None => &EMPTY,
    }
}

/// The fields of an object, or an empty object for any other value.
pub fn fields(value: &Value) -> &Map<String, Value> {
    value.as_object().unwrap_or(&EMPTY)
}

/// The array stored under `key`, or an empty slice.
pub fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// The boolean stored under `key`, treating anything else as `false`.
pub fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Sorted union of the keys of two objects.
pub fn key_union<'a>(old: &'a Map<String, Value>, new: &'a Map<String, Value>) -> Vec<&'a str> {
    let mut keys: Vec<&str> = old.keys().chain(new.keys()).map(String::as_str).collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Location recorded for parameters that do not declare one.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Identity of a parameter within an operation: its location and name.
///
/// Unresolved `$ref` parameters are identified by the reference itself. A
/// parameter without an `in` field is keyed under [`UNKNOWN_LOCATION`], so it
/// never collides with a well-formed parameter of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterKey {
    /// The `in` field, or `$ref` for references.
    pub location: String,
    /// The `name` field, or the reference target.
    pub name: String,
}

impl ParameterKey {
    /// Extracts the key of a parameter object, if it has one.
    pub fn of(parameter: &Value) -> Option<Self> {
        if let Some(reference) = parameter.get("$ref").and_then(Value::as_str) {
            return Some(Self {
                location: "$ref".to_string(),
                name: reference.rsplit('/').next().unwrap_or(reference).to_string(),
            });
        }
        let name = parameter.get("name")?.as_str()?;
        let location = parameter
            .get("in")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_LOCATION);
        Some(Self {
            location: location.to_string(),
            name: name.to_string(),
        })
    }
}

/// The names listed in a schema's `required` array.
pub fn required_names(schema: &Value) -> Vec<&str> {
    array(schema, "required")
        .iter()
        .filter_map(Value::as_str)
        .collect()
}

/// Whether a response status key denotes a response clients depend on.
///
/// Success codes (`2xx`, `2XX`) and `default` qualify.
pub fn is_required_response(status: &str) -> bool {
    status == "default" || status.starts_with('2')
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parameter_without_location_is_not_a_query_parameter() {
        let declared = ParameterKey::of(&json!({"name": "q", "in": "query"})).unwrap();
        let undeclared = ParameterKey::of(&json!({"name": "q"})).unwrap();

        assert_eq!(undeclared.location, UNKNOWN_LOCATION);
        assert_ne!(declared, undeclared);
    }

    #[test]
    fn reference_is_keyed_by_target() {
        let key = ParameterKey::of(&json!({"$ref": "#/components/parameters/Units"})).unwrap();
        assert_eq!(key.location, "$ref");
        assert_eq!(key.name, "Units");
    }

    #[test]
    fn non_objects_have_no_fields() {
        assert!(fields(&json!([1, 2])).is_empty());
        assert!(object(&json!({"paths": "bogus"}), "paths").is_empty());
    }
}
