//! Canonicalization of documents before comparison.

use serde_json::{Map, Value};

use crate::{
    analysis::openapi::{METHODS, ParameterKey},
    domain::SpecDocument,
};

/// Errors raised for documents that are not OpenAPI 3.x at all.
///
/// This is the only failure the engine reports; sparse but well-shaped
/// documents are always accepted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidSpecError {
    /// The document root is not a JSON object.
    #[error("document root is not an object")]
    NotAnObject,
    /// A required top-level field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// A required top-level field has the wrong type.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// The offending field.
        field: &'static str,
        /// Description of the expected type.
        expected: &'static str,
    },
    /// The `openapi` field names a version other than 3.x.
    #[error("unsupported OpenAPI version '{0}', expected 3.x")]
    UnsupportedVersion(String),
}

/// Canonicalizes a document for comparison.
///
/// The result has its `paths` keys in sorted order and an object for every
/// path item. Within each path item only methods defined as objects are kept,
/// and path-level `parameters` are pushed down into every operation, with
/// operation-level parameters of the same name and location taking
/// precedence. A missing `paths` section becomes an empty one. `$ref`
/// pointers are left unresolved.
///
/// The input is never modified.
///
/// # Errors
///
/// Returns [`InvalidSpecError`] if the document is not an object, lacks a
/// string `openapi` field naming a 3.x version, or lacks an `info` object.
pub fn normalize(doc: &SpecDocument) -> Result<SpecDocument, InvalidSpecError> {
    let root = doc.as_value().as_object().ok_or(InvalidSpecError::NotAnObject)?;
    validate(root)?;

    let paths = root
        .get("paths")
        .and_then(Value::as_object)
        .map(normalize_paths)
        .unwrap_or_default();

    let mut normalized = root.clone();
    normalized.insert("paths".to_string(), Value::Object(paths));
    Ok(SpecDocument::new(Value::Object(normalized)))
}

fn validate(root: &Map<String, Value>) -> Result<(), InvalidSpecError> {
    let openapi = root
        .get("openapi")
        .ok_or(InvalidSpecError::MissingField("openapi"))?
        .as_str()
        .ok_or(InvalidSpecError::WrongType {
            field: "openapi",
            expected: "a string",
        })?;
    if openapi.split('.').next() != Some("3") {
        return Err(InvalidSpecError::UnsupportedVersion(openapi.to_string()));
    }

    if !root
        .get("info")
        .ok_or(InvalidSpecError::MissingField("info"))?
        .is_object()
    {
        return Err(InvalidSpecError::WrongType {
            field: "info",
            expected: "an object",
        });
    }
    Ok(())
}

fn normalize_paths(paths: &Map<String, Value>) -> Map<String, Value> {
    let mut keys: Vec<&String> = paths.keys().collect();
    keys.sort_unstable();

    let mut normalized = Map::new();
    for key in keys {
        let item = paths[key.as_str()]
            .as_object()
            .map(normalize_path_item)
            .unwrap_or_default();
        normalized.insert(key.clone(), Value::Object(item));
    }
    normalized
}

fn normalize_path_item(item: &Map<String, Value>) -> Map<String, Value> {
    let shared: &[Value] = item
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut normalized = Map::new();
    for (key, value) in item {
        if key == "parameters" {
            continue;
        }
        if METHODS.contains(&key.as_str()) {
            if let Some(operation) = value.as_object() {
                normalized.insert(key.clone(), Value::Object(merge_parameters(operation, shared)));
            }
        } else {
            normalized.insert(key.clone(), value.clone());
        }
    }
    normalized
}

fn merge_parameters(operation: &Map<String, Value>, shared: &[Value]) -> Map<String, Value> {
    let mut operation = operation.clone();
    let own: Vec<Value> = operation
        .get("parameters")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if shared.is_empty() && operation.get("parameters").is_none_or(Value::is_array) {
        return operation;
    }

    let overridden: Vec<ParameterKey> = own.iter().filter_map(ParameterKey::of).collect();
    let inherited = shared.iter().filter(|parameter| {
        ParameterKey::of(parameter).is_none_or(|key| !overridden.contains(&key))
    });

    let merged: Vec<Value> = own.iter().chain(inherited).cloned().collect();
    operation.insert("parameters".to_string(), Value::Array(merged));
    operation
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> SpecDocument {
        SpecDocument::new(value)
    }

    #[test]
    fn rejects_non_object() {
        assert_eq!(
            normalize(&doc(json!([1, 2]))).unwrap_err(),
            InvalidSpecError::NotAnObject
        );
    }

    #[test]
    fn rejects_missing_openapi_and_info() {
        assert_eq!(
            normalize(&doc(json!({"info": {}}))).unwrap_err(),
            InvalidSpecError::MissingField("openapi")
        );
        assert_eq!(
            normalize(&doc(json!({"openapi": "3.0.0"}))).unwrap_err(),
            InvalidSpecError::MissingField("info")
        );
        assert!(matches!(
            normalize(&doc(json!({"openapi": "3.0.0", "info": "x"}))).unwrap_err(),
            InvalidSpecError::WrongType { field: "info", .. }
        ));
    }

    #[test]
    fn rejects_swagger_two() {
        assert_eq!(
            normalize(&doc(json!({"openapi": "2.0", "info": {}}))).unwrap_err(),
            InvalidSpecError::UnsupportedVersion("2.0".to_string())
        );
    }

    #[test]
    fn missing_paths_become_empty() {
        let normalized = normalize(&doc(json!({"openapi": "3.1.0", "info": {"version": "1"}})))
            .unwrap();
        assert_eq!(normalized.as_value()["paths"], json!({}));
    }

    #[test]
    fn drops_undefined_methods_and_keeps_metadata() {
        let normalized = normalize(&doc(json!({
            "openapi": "3.0.0",
            "info": {"version": "1"},
            "paths": {
                "/b": {"summary": "bee", "get": {}, "post": null},
                "/a": null
            }
        })))
        .unwrap();

        let paths = normalized.as_value()["paths"].as_object().unwrap();
        assert_eq!(paths.keys().collect::<Vec<_>>(), ["/a", "/b"]);
        assert_eq!(paths["/a"], json!({}));
        assert_eq!(paths["/b"], json!({"summary": "bee", "get": {}}));
    }

    #[test]
    fn pushes_path_parameters_into_operations() {
        let normalized = normalize(&doc(json!({
            "openapi": "3.0.0",
            "info": {"version": "1"},
            "paths": {
                "/users/{id}": {
                    "parameters": [
                        {"name": "id", "in": "path", "required": true},
                        {"name": "verbose", "in": "query"}
                    ],
                    "get": {
                        "parameters": [{"name": "verbose", "in": "query", "required": true}]
                    },
                    "delete": {}
                }
            }
        })))
        .unwrap();

        let item = &normalized.as_value()["paths"]["/users/{id}"];
        assert!(item.get("parameters").is_none());
        assert_eq!(
            item["get"]["parameters"],
            json!([
                {"name": "verbose", "in": "query", "required": true},
                {"name": "id", "in": "path", "required": true}
            ])
        );
        assert_eq!(
            item["delete"]["parameters"],
            json!([
                {"name": "id", "in": "path", "required": true},
                {"name": "verbose", "in": "query"}
            ])
        );
    }

    #[test]
    fn input_is_untouched() {
        let original = doc(json!({
            "openapi": "3.0.0",
            "info": {"version": "1"},
            "paths": {"/x": {"parameters": [{"name": "a", "in": "query"}], "get": {}}}
        }));
        let before = original.as_value().clone();
        normalize(&original).unwrap();
        assert_eq!(original.as_value(), &before);
    }
}
