//! OpenAPI documents as immutable JSON trees.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A fetched OpenAPI document.
///
/// The document is an immutable JSON tree shared behind an [`Arc`], so
/// cloning is cheap and the ledger can hand out previous snapshots without
/// copying them. Object keys are held in sorted order, which makes the
/// serialized form canonical.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    value: Value,
    checksum: OnceLock<String>,
}

impl SpecDocument {
    /// Wraps a JSON value as a document.
    ///
    /// No validation is performed here; see
    /// [`normalize`](crate::analysis::normalize) for the structural checks.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            inner: Arc::new(Inner {
                value,
                checksum: OnceLock::new(),
            }),
        }
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON.
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Parses a YAML document.
    ///
    /// Mapping keys that are numbers or booleans (such as the `200:` keys of a
    /// `responses` block) are converted to strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML, or if it uses mapping
    /// keys that cannot be represented as strings.
    pub fn from_yaml(text: &str) -> Result<Self, ParseError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
        Ok(Self::new(yaml_to_json(yaml)?))
    }

    /// Parses a document that may be either JSON or YAML.
    ///
    /// JSON is attempted first since it is the more common wire format.
    ///
    /// # Errors
    ///
    /// Returns the YAML error if neither format parses.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        serde_json::from_str(text).map_or_else(
            |_| Self::from_yaml(text),
            |value| Ok(Self::new(value)),
        )
    }

    /// The underlying JSON tree.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.inner.value
    }

    /// The `info.version` string, if the document declares one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.inner.value.pointer("/info/version")?.as_str()
    }

    /// Returns the SHA-256 checksum of the canonical JSON encoding.
    ///
    /// Two documents with the same content have the same checksum regardless
    /// of the key order or whitespace of the text they were parsed from.
    ///
    /// # Panics
    ///
    /// Panics if JSON serialization fails (which should never happen for a
    /// tree whose keys are all strings).
    #[must_use]
    pub fn checksum(&self) -> &str {
        self.inner.checksum.get_or_init(|| {
            let encoded = serde_json::to_vec(&self.inner.value).expect("this should never fail");
            let hash = Sha256::digest(encoded);
            format!("{hash:x}")
        })
    }
}

impl PartialEq for SpecDocument {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.value == other.inner.value
    }
}

impl Eq for SpecDocument {}

impl From<Value> for SpecDocument {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Serialize for SpecDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpecDocument {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::new)
    }
}

/// Errors that can occur when parsing document text.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The text is not valid JSON.
    #[error("failed to parse JSON document")]
    Json(#[from] serde_json::Error),
    /// The text is not valid YAML.
    #[error("failed to parse YAML document")]
    Yaml(#[from] serde_yaml::Error),
    /// A YAML mapping key cannot be used as a JSON object key.
    #[error("unsupported mapping key: {0}")]
    UnsupportedKey(String),
}

fn yaml_to_json(yaml: serde_yaml::Value) -> Result<Value, ParseError> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, ParseError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(ParseError::UnsupportedKey(format!("{other:?}"))),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}
