//! Structural comparison of two normalized documents.
//!
//! The walk threads a single output list through a recursive descent keyed
//! by canonical path strings. Traversal order is fixed: `info.version` and
//! the rest of `info`, then paths in sorted order, methods in [`METHODS`]
//! order, parameters in declaration order, schema properties in sorted
//! order, then other top-level fields and finally the `components` sections.
//! Identical inputs therefore always produce identical change lists.
//!
//! Every level compares the fields it understands structurally and reports
//! any other differing field as a plain value change. An element whose
//! values differ without any more specific change being found is reported
//! as a whole, so two documents that differ always yield at least one
//! change.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    analysis::openapi::{
        METHODS, ParameterKey, array, fields, flag, key_union, object, required_names,
    },
    domain::{AtomicChange, SpecDocument, Subject},
};

/// Schema keywords whose changes are reported as [`Subject::DataType`].
const TYPE_KEYWORDS: [&str; 3] = ["$ref", "type", "format"];

/// Schema keywords holding a single nested schema.
const NESTED_SCHEMAS: [&str; 3] = ["items", "not", "additionalProperties"];

/// Schema keywords holding a list of nested schemas.
const SCHEMA_LISTS: [&str; 3] = ["allOf", "anyOf", "oneOf"];

/// Schema keywords compared structurally by [`schema`].
const SCHEMA_FIELDS: [&str; 12] = [
    "$ref",
    "type",
    "format",
    "deprecated",
    "properties",
    "required",
    "items",
    "not",
    "additionalProperties",
    "allOf",
    "anyOf",
    "oneOf",
];

const OPERATION_FIELDS: [&str; 4] = ["deprecated", "parameters", "requestBody", "responses"];

const PARAMETER_FIELDS: [&str; 3] = ["required", "deprecated", "schema"];

/// Security scheme fields whose changes are reported as
/// [`Subject::SecurityKind`].
const SECURITY_KINDS: [&str; 2] = ["type", "scheme"];

const COMPONENT_SECTIONS: [&str; 6] = [
    "schemas",
    "parameters",
    "headers",
    "requestBodies",
    "responses",
    "securitySchemes",
];

static NULL: Value = Value::Null;

/// Computes the atomic changes between two normalized documents.
///
/// Missing or malformed sections are compared as empty or as plain values;
/// this function never fails. Structurally identical documents produce an
/// empty list, and documents that differ produce a non-empty one.
#[must_use]
pub fn diff(old: &SpecDocument, new: &SpecDocument) -> Vec<AtomicChange> {
    let (old, new) = (old.as_value(), new.as_value());
    let mut out = Vec::new();

    version(old, new, &mut out);
    remaining("info", field(old, "info"), field(new, "info"), &["version"], &mut out);
    paths(old, new, &mut out);
    remaining("", old, new, &["info", "paths", "components"], &mut out);
    components(field(old, "components"), field(new, "components"), &mut out);

    out
}

fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&NULL)
}

/// An absent value is represented as `null` during the walk.
fn present(value: &Value) -> Option<&Value> {
    (!value.is_null()).then_some(value)
}

fn child(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

fn version(old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    let old_version = old.pointer("/info/version");
    let new_version = new.pointer("/info/version");
    if old_version == new_version {
        return;
    }

    let describe = |v: Option<&Value>| match v {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    };
    let description = format!(
        "API version changed from {} to {}",
        describe(old_version),
        describe(new_version)
    );
    out.push(
        AtomicChange::modified(
            "info.version".to_string(),
            Subject::Version,
            old_version.cloned(),
            new_version.cloned(),
        )
        .with_description(description),
    );
}

fn paths(old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    let (old_paths, new_paths) = (object(old, "paths"), object(new, "paths"));

    for route in key_union(old_paths, new_paths) {
        let path = format!("paths.{route}");
        match (old_paths.get(route), new_paths.get(route)) {
            (Some(old_item), Some(new_item)) => path_item(&path, route, old_item, new_item, out),
            (Some(old_item), None) => out.push(
                AtomicChange::removed(path, Subject::Path, old_item.clone())
                    .with_description(format!("removed endpoint {route}")),
            ),
            (None, Some(new_item)) => out.push(
                AtomicChange::added(path, Subject::Path, new_item.clone())
                    .with_description(format!("added endpoint {route}")),
            ),
            (None, None) => {}
        }
    }
}

fn path_item(base: &str, route: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(base, old, new, out, |out| {
        for method in METHODS {
            let path = format!("{base}.{method}");
            let label = format!("{} {route}", method.to_uppercase());
            let old_op = old.get(method).filter(|op| op.is_object());
            let new_op = new.get(method).filter(|op| op.is_object());

            match (old_op, new_op) {
                (Some(old_op), Some(new_op)) => operation(&path, old_op, new_op, out),
                (Some(old_op), None) => out.push(
                    AtomicChange::removed(path, Subject::Operation, old_op.clone())
                        .with_description(format!("removed operation {label}")),
                ),
                (None, Some(new_op)) => out.push(
                    AtomicChange::added(path, Subject::Operation, new_op.clone())
                        .with_description(format!("added operation {label}")),
                ),
                (None, None) => {}
            }
        }
        remaining(base, old, new, &METHODS, out);
    });
}

fn operation(base: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(base, old, new, out, |out| {
        deprecation(base, old, new, out);
        remaining(base, old, new, &OPERATION_FIELDS, out);

        let path = format!("{base}.parameters");
        exhaustive(
            &path,
            field(old, "parameters"),
            field(new, "parameters"),
            out,
            |out| parameters(&path, old, new, out),
        );

        request_body(&format!("{base}.requestBody"), old, new, out);

        let path = format!("{base}.responses");
        exhaustive(
            &path,
            field(old, "responses"),
            field(new, "responses"),
            out,
            |out| responses(&path, old, new, out),
        );
    });
}

fn parameters(base: &str, old_op: &Value, new_op: &Value, out: &mut Vec<AtomicChange>) {
    let old_params = keyed_parameters(old_op);
    let new_params = keyed_parameters(new_op);

    let labels = parameter_labels(old_params.iter().chain(&new_params).map(|(k, _)| k));
    let label = |key: &ParameterKey| {
        labels
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.name.clone())
    };
    for (key, old_param) in &old_params {
        let path = format!("{base}.{}", label(key));
        match find_parameter(&new_params, key) {
            Some(new_param) => parameter(&path, old_param, new_param, out),
            None => out.push(
                AtomicChange::removed(
                    path,
                    Subject::Parameter {
                        required: flag(old_param, "required"),
                    },
                    (*old_param).clone(),
                )
                .with_description(format!("removed {} parameter '{}'", key.location, key.name))
                .with_parent(base),
            ),
        }
    }

    for (key, new_param) in &new_params {
        if find_parameter(&old_params, key).is_some() {
            continue;
        }
        let required = flag(new_param, "required");
        let optionality = if required { "required" } else { "optional" };
        out.push(
            AtomicChange::added(
                format!("{base}.{}", label(key)),
                Subject::Parameter { required },
                (*new_param).clone(),
            )
            .with_description(format!(
                "added {optionality} {} parameter '{}'",
                key.location, key.name
            ))
            .with_parent(base),
        );
    }
}

/// Parameters of an operation keyed by location and name, in declaration
/// order. Later duplicates of a key are ignored.
fn keyed_parameters(op: &Value) -> Vec<(ParameterKey, &Value)> {
    let mut keyed: Vec<(ParameterKey, &Value)> = Vec::new();
    for parameter in array(op, "parameters") {
        if let Some(key) = ParameterKey::of(parameter) {
            if !keyed.iter().any(|(k, _)| *k == key) {
                keyed.push((key, parameter));
            }
        }
    }
    keyed
}

fn find_parameter<'a>(
    params: &[(ParameterKey, &'a Value)],
    key: &ParameterKey,
) -> Option<&'a Value> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|&(_, parameter)| parameter)
}

/// Path segments for parameters: the bare name, or `name@location` when the
/// same name is used in more than one location.
fn parameter_labels<'a>(
    keys: impl Iterator<Item = &'a ParameterKey>,
) -> HashMap<ParameterKey, String> {
    let mut locations: HashMap<&str, Vec<&str>> = HashMap::new();
    let keys: Vec<&ParameterKey> = keys.collect();
    for key in &keys {
        let entry = locations.entry(key.name.as_str()).or_default();
        if !entry.contains(&key.location.as_str()) {
            entry.push(key.location.as_str());
        }
    }

    keys.iter()
        .map(|key| {
            let label = if locations[key.name.as_str()].len() > 1 {
                format!("{}@{}", key.name, key.location)
            } else {
                key.name.clone()
            };
            ((*key).clone(), label)
        })
        .collect()
}

/// Compares two parameters, or two headers, which share the same shape.
fn parameter(path: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(path, old, new, out, |out| {
        requirement(path, flag(old, "required"), flag(new, "required"), out);
        deprecation(path, old, new, out);
        remaining(path, old, new, &PARAMETER_FIELDS, out);
        schema(
            &format!("{path}.schema"),
            field(old, "schema"),
            field(new, "schema"),
            out,
        );
    });
}

fn request_body(path: &str, old_op: &Value, new_op: &Value, out: &mut Vec<AtomicChange>) {
    match (old_op.get("requestBody"), new_op.get("requestBody")) {
        (Some(old), Some(new)) => request_body_fields(path, old, new, out),
        (Some(old), None) => out.push(AtomicChange::removed(
            path.to_string(),
            Subject::RequestBody {
                required: flag(old, "required"),
            },
            old.clone(),
        )),
        (None, Some(new)) => out.push(AtomicChange::added(
            path.to_string(),
            Subject::RequestBody {
                required: flag(new, "required"),
            },
            new.clone(),
        )),
        (None, None) => {}
    }
}

fn request_body_fields(path: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(path, old, new, out, |out| {
        requirement(path, flag(old, "required"), flag(new, "required"), out);
        remaining(path, old, new, &["required", "content"], out);
        content(
            &format!("{path}.content"),
            field(old, "content"),
            field(new, "content"),
            out,
        );
    });
}

fn responses(base: &str, old_op: &Value, new_op: &Value, out: &mut Vec<AtomicChange>) {
    let (old_responses, new_responses) =
        (object(old_op, "responses"), object(new_op, "responses"));

    for status in key_union(old_responses, new_responses) {
        let path = format!("{base}.{status}");
        let subject = Subject::Response {
            status: status.to_string(),
        };
        match (old_responses.get(status), new_responses.get(status)) {
            (Some(old), Some(new)) => response(&path, old, new, out),
            (Some(old), None) => out.push(
                AtomicChange::removed(path, subject, old.clone())
                    .with_description(format!("removed response {status} from {base}")),
            ),
            (None, Some(new)) => out.push(
                AtomicChange::added(path, subject, new.clone())
                    .with_description(format!("added response {status} to {base}")),
            ),
            (None, None) => {}
        }
    }
}

fn response(path: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(path, old, new, out, |out| {
        remaining(path, old, new, &["headers", "content"], out);
        named_components(
            &format!("{path}.headers"),
            field(old, "headers"),
            field(new, "headers"),
            &Subject::Other,
            out,
            parameter,
        );
        content(
            &format!("{path}.content"),
            field(old, "content"),
            field(new, "content"),
            out,
        );
    });
}

/// Compares the `content` maps of a request body or response.
fn content(base: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(base, old, new, out, |out| {
        let (old_content, new_content) = (fields(old), fields(new));

        for media_type in key_union(old_content, new_content) {
            let path = format!("{base}.{media_type}");
            match (old_content.get(media_type), new_content.get(media_type)) {
                (Some(old_media), Some(new_media)) => {
                    exhaustive(&path, old_media, new_media, out, |out| {
                        remaining(&path, old_media, new_media, &["schema"], out);
                        schema(
                            &format!("{path}.schema"),
                            field(old_media, "schema"),
                            field(new_media, "schema"),
                            out,
                        );
                    });
                }
                (Some(old_media), None) => {
                    out.push(AtomicChange::removed(path, Subject::Other, old_media.clone()));
                }
                (None, Some(new_media)) => {
                    out.push(AtomicChange::added(path, Subject::Other, new_media.clone()));
                }
                (None, None) => {}
            }
        }
    });
}

/// Recursively compares two schemas.
///
/// Either side may be `null` when the schema is absent. References are
/// compared as strings and never followed.
fn schema(base: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    if old == new {
        return;
    }

    exhaustive(base, old, new, out, |out| {
        for keyword in TYPE_KEYWORDS {
            let (old_value, new_value) = (old.get(keyword), new.get(keyword));
            if old_value != new_value {
                out.push(AtomicChange::modified(
                    format!("{base}.{keyword}"),
                    Subject::DataType,
                    old_value.cloned(),
                    new_value.cloned(),
                ));
            }
        }
        deprecation(base, old, new, out);
        remaining(base, old, new, &SCHEMA_FIELDS, out);

        properties(base, old, new, out);

        for keyword in NESTED_SCHEMAS {
            let path = format!("{base}.{keyword}");
            let (old_nested, new_nested) = (field(old, keyword), field(new, keyword));
            if old_nested.is_object() || new_nested.is_object() {
                schema(&path, old_nested, new_nested, out);
            } else {
                values(&path, present(old_nested), present(new_nested), out);
            }
        }
        for keyword in SCHEMA_LISTS {
            schema_list(
                &format!("{base}.{keyword}"),
                field(old, keyword),
                field(new, keyword),
                out,
            );
        }
    });
}

/// Compares `allOf`/`anyOf`/`oneOf` lists position by position. Lists of
/// different lengths are compared as plain values.
fn schema_list(base: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    match (old.as_array(), new.as_array()) {
        (Some(old_list), Some(new_list)) if old_list.len() == new_list.len() => {
            for (index, (old_item, new_item)) in old_list.iter().zip(new_list).enumerate() {
                schema(&format!("{base}.{index}"), old_item, new_item, out);
            }
        }
        _ => values(base, present(old), present(new), out),
    }
}

fn properties(base: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    let (old_props, new_props) = (object(old, "properties"), object(new, "properties"));
    let (old_required, new_required) = (required_names(old), required_names(new));
    let parent = format!("{base}.properties");

    for name in key_union(old_props, new_props) {
        let path = format!("{parent}.{name}");
        let was_required = old_required.contains(&name);
        let is_required = new_required.contains(&name);

        match (old_props.get(name), new_props.get(name)) {
            (Some(old_prop), Some(new_prop)) => {
                requirement(&path, was_required, is_required, out);
                schema(&path, old_prop, new_prop, out);
            }
            (Some(old_prop), None) => out.push(
                AtomicChange::removed(
                    path,
                    Subject::Property {
                        required: was_required,
                    },
                    old_prop.clone(),
                )
                .with_description(format!("removed field '{name}' from {base}"))
                .with_parent(&parent),
            ),
            (None, Some(new_prop)) => {
                let optionality = if is_required { "required" } else { "optional" };
                out.push(
                    AtomicChange::added(
                        path,
                        Subject::Property {
                            required: is_required,
                        },
                        new_prop.clone(),
                    )
                    .with_description(format!("added {optionality} field '{name}' to {base}"))
                    .with_parent(&parent),
                );
            }
            (None, None) => {}
        }
    }
}

fn components(old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive("components", old, new, out, |out| {
        let section = |name: &str| {
            (
                format!("components.{name}"),
                field(old, name),
                field(new, name),
            )
        };

        let (path, old_section, new_section) = section("schemas");
        named_components(&path, old_section, new_section, &Subject::Schema, out, schema);

        let (path, old_section, new_section) = section("parameters");
        named_components(&path, old_section, new_section, &Subject::Other, out, parameter);

        let (path, old_section, new_section) = section("headers");
        named_components(&path, old_section, new_section, &Subject::Other, out, parameter);

        let (path, old_section, new_section) = section("requestBodies");
        named_components(
            &path,
            old_section,
            new_section,
            &Subject::Other,
            out,
            request_body_fields,
        );

        let (path, old_section, new_section) = section("responses");
        named_components(&path, old_section, new_section, &Subject::Other, out, response);

        let (path, old_section, new_section) = section("securitySchemes");
        named_components(
            &path,
            old_section,
            new_section,
            &Subject::SecurityScheme,
            out,
            security_scheme,
        );

        remaining("components", old, new, &COMPONENT_SECTIONS, out);
    });
}

fn security_scheme(path: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    exhaustive(path, old, new, out, |out| {
        for key in SECURITY_KINDS {
            let (old_value, new_value) = (old.get(key), new.get(key));
            if old_value != new_value {
                out.push(AtomicChange::modified(
                    format!("{path}.{key}"),
                    Subject::SecurityKind,
                    old_value.cloned(),
                    new_value.cloned(),
                ));
            }
        }
        remaining(path, old, new, &SECURITY_KINDS, out);
    });
}

/// Compares a map of named elements, reporting additions and removals as
/// `subject` and delegating shared names to `compare`.
fn named_components(
    base: &str,
    old: &Value,
    new: &Value,
    subject: &Subject,
    out: &mut Vec<AtomicChange>,
    compare: impl Fn(&str, &Value, &Value, &mut Vec<AtomicChange>),
) {
    exhaustive(base, old, new, out, |out| {
        let (old, new) = (fields(old), fields(new));
        for name in key_union(old, new) {
            let path = format!("{base}.{name}");
            match (old.get(name), new.get(name)) {
                (Some(old), Some(new)) => compare(&path, old, new, out),
                (Some(old), None) => {
                    out.push(AtomicChange::removed(path, subject.clone(), old.clone()));
                }
                (None, Some(new)) => {
                    out.push(AtomicChange::added(path, subject.clone(), new.clone()));
                }
                (None, None) => {}
            }
        }
    });
}

fn requirement(path: &str, was_required: bool, is_required: bool, out: &mut Vec<AtomicChange>) {
    if was_required == is_required {
        return;
    }
    let description = if is_required {
        format!("{path} became required")
    } else {
        format!("{path} became optional")
    };
    out.push(
        AtomicChange::modified(
            format!("{path}.required"),
            Subject::Requirement,
            Some(Value::Bool(was_required)),
            Some(Value::Bool(is_required)),
        )
        .with_description(description),
    );
}

fn deprecation(path: &str, old: &Value, new: &Value, out: &mut Vec<AtomicChange>) {
    let (was, is) = (flag(old, "deprecated"), flag(new, "deprecated"));
    if was == is {
        return;
    }
    let description = if is {
        format!("{path} deprecated")
    } else {
        format!("{path} no longer deprecated")
    };
    out.push(
        AtomicChange::modified(
            format!("{path}.deprecated"),
            Subject::Deprecation,
            Some(Value::Bool(was)),
            Some(Value::Bool(is)),
        )
        .with_description(description),
    );
}

/// Reports every differing field of two objects except the `handled` ones
/// as [`Subject::Other`].
fn remaining(base: &str, old: &Value, new: &Value, handled: &[&str], out: &mut Vec<AtomicChange>) {
    let (old, new) = (fields(old), fields(new));
    for key in key_union(old, new) {
        if !handled.contains(&key) {
            values(&child(base, key), old.get(key), new.get(key), out);
        }
    }
}

/// Runs `walk`, then reports the element as a whole if the two values
/// differ but the walk found no more specific change.
fn exhaustive(
    path: &str,
    old: &Value,
    new: &Value,
    out: &mut Vec<AtomicChange>,
    walk: impl FnOnce(&mut Vec<AtomicChange>),
) {
    let before = out.len();
    walk(out);
    if out.len() == before && old != new {
        values(path, present(old), present(new), out);
    }
}

/// Reports any difference between two optional values as [`Subject::Other`].
fn values(path: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<AtomicChange>) {
    if old != new {
        out.push(AtomicChange::modified(
            path.to_string(),
            Subject::Other,
            old.cloned(),
            new.cloned(),
        ));
    }
}
