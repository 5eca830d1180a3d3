//! This bench compares two large generated specifications that differ in a
//! handful of operations, parameters and schema properties.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use specdrift::{SpecDocument, analysis};

/// Generates a specification with `n` paths and `n` component schemas.
fn generate(n: usize, revision: usize) -> SpecDocument {
    let mut paths = Map::new();
    let mut schemas = Map::new();
    for i in 0..n {
        let required = revision > 0 && i % 50 == 0;
        paths.insert(
            format!("/resource{i}"),
            json!({
                "parameters": [{"name": "tenant", "in": "header", "required": true}],
                "get": {
                    "operationId": format!("getResource{i}"),
                    "parameters": [
                        {"name": "limit", "in": "query", "schema": {"type": "integer"}},
                        {"name": "filter", "in": "query", "required": required}
                    ],
                    "responses": {
                        "200": {"content": {"application/json": {"schema": {"$ref": format!("#/components/schemas/Resource{i}")}}}},
                        "404": {"description": "not found"}
                    }
                }
            }),
        );
        let mut properties = json!({
            "id": {"type": "string", "format": "uuid"},
            "name": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}}
        });
        if revision > 0 && i % 25 == 0 {
            properties["description"] = json!({"type": "string"});
        }
        schemas.insert(
            format!("Resource{i}"),
            json!({"type": "object", "required": ["id"], "properties": properties}),
        );
    }
    if revision > 0 {
        paths.remove("/resource1");
    }

    SpecDocument::new(json!({
        "openapi": "3.0.3",
        "info": {"title": "Bench", "version": format!("1.{revision}.0")},
        "paths": Value::Object(paths),
        "components": {"schemas": Value::Object(schemas)}
    }))
}

fn diff_pipeline(c: &mut Criterion) {
    let old = generate(500, 0);
    let new = generate(500, 1);

    c.bench_function("analyze 500 paths", |b| {
        b.iter(|| {
            analysis::analyze(
                "bench",
                "1.0.0",
                black_box(&old),
                "1.1.0",
                black_box(&new),
                analysis::DEFAULT_EXAMPLES,
            )
            .unwrap()
        });
    });

    let old = analysis::normalize(&old).unwrap();
    let new = analysis::normalize(&new).unwrap();
    c.bench_function("diff 500 paths", |b| {
        b.iter(|| analysis::diff(black_box(&old), black_box(&new)));
    });
}

criterion_group!(benches, diff_pipeline);
criterion_main!(benches);
