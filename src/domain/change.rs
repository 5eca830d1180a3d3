//! Atomic and classified change records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether an element appeared, disappeared, or changed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The element exists only in the new document.
    Added,
    /// The element exists only in the old document.
    Removed,
    /// The element exists in both documents with different values.
    Modified,
    /// A kind produced by a newer producer that this version does not know.
    #[serde(other)]
    Unknown,
}

/// The element of the specification a change applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum Subject {
    /// The `info.version` string.
    Version,
    /// An entry in `paths`.
    Path,
    /// An HTTP method of a path item.
    Operation,
    /// An operation parameter, identified by name and location.
    Parameter {
        /// Whether the parameter is required.
        required: bool,
    },
    /// A property of a schema.
    Property {
        /// Whether the property is listed in its schema's `required` array.
        required: bool,
    },
    /// A flip of the `required` flag of a parameter, property or request body.
    Requirement,
    /// A `type`, `format` or `$ref` change.
    DataType,
    /// A response status code of an operation.
    Response {
        /// The status code key, e.g. `200`, `4XX` or `default`.
        status: String,
    },
    /// A named schema under `components.schemas`.
    Schema,
    /// The request body of an operation.
    RequestBody {
        /// Whether the request body is required.
        required: bool,
    },
    /// A named security scheme under `components.securitySchemes`.
    SecurityScheme,
    /// The `type` or `scheme` of a security scheme.
    SecurityKind,
    /// The `deprecated` flag of an operation, parameter or property.
    Deprecation,
    /// Documentation text and any other non-structural difference.
    Other,
    /// An element produced by a newer producer that this version does not
    /// know.
    #[serde(other)]
    Unknown,
}

impl Subject {
    /// A short noun describing the element, used in generated text.
    #[must_use]
    pub const fn noun(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Path => "endpoint",
            Self::Operation => "operation",
            Self::Parameter { .. } => "parameter",
            Self::Property { .. } => "field",
            Self::Requirement => "requirement",
            Self::DataType => "type",
            Self::Response { .. } => "response",
            Self::Schema => "schema",
            Self::RequestBody { .. } => "request body",
            Self::SecurityScheme => "security scheme",
            Self::SecurityKind => "security scheme type",
            Self::Deprecation => "deprecation",
            Self::Other | Self::Unknown => "element",
        }
    }
}

/// One detected difference between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicChange {
    /// Dot-separated location in the document, e.g.
    /// `paths./users.get.parameters.status`.
    pub path: String,
    /// Whether the element was added, removed or modified.
    pub kind: ChangeKind,
    /// What kind of element changed.
    pub subject: Subject,
    /// The value in the old document, if it had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// The value in the new document, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// Human-readable one-line description.
    pub description: String,
    /// The location of the containing element, when the element's own name
    /// may contain dots and so cannot be split off `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl AtomicChange {
    /// An element present only in the new document.
    #[must_use]
    pub fn added(path: String, subject: Subject, value: Value) -> Self {
        let description = format!("added {} {path}", subject.noun());
        Self {
            path,
            kind: ChangeKind::Added,
            subject,
            old_value: None,
            new_value: Some(value),
            description,
            parent: None,
        }
    }

    /// An element present only in the old document.
    #[must_use]
    pub fn removed(path: String, subject: Subject, value: Value) -> Self {
        let description = format!("removed {} {path}", subject.noun());
        Self {
            path,
            kind: ChangeKind::Removed,
            subject,
            old_value: Some(value),
            new_value: None,
            description,
            parent: None,
        }
    }

    /// An element whose value differs between the documents.
    ///
    /// Either side may be absent, for instance when a `format` is introduced
    /// on an existing property.
    #[must_use]
    pub fn modified(
        path: String,
        subject: Subject,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        let description = format!(
            "changed {} {path} from {} to {}",
            subject.noun(),
            display_value(old_value.as_ref()),
            display_value(new_value.as_ref()),
        );
        Self {
            path,
            kind: ChangeKind::Modified,
            subject,
            old_value,
            new_value,
            description,
            parent: None,
        }
    }

    /// Replaces the generated description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Records the location of the containing element.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// The location of the element containing this one.
    ///
    /// For `components.schemas.User.properties.name` this is
    /// `components.schemas.User.properties`. An explicitly recorded parent
    /// takes precedence over splitting the path.
    #[must_use]
    pub fn parent_path(&self) -> &str {
        self.parent.as_deref().unwrap_or_else(|| {
            self.path
                .rsplit_once('.')
                .map_or("", |(parent, _)| parent)
        })
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "none".to_string(),
        Some(Value::String(s)) => format!("'{s}'"),
        Some(Value::Object(_) | Value::Array(_)) => "a structured value".to_string(),
        Some(other) => other.to_string(),
    }
}

/// The contract impact category of a change.
///
/// Variants are ordered from least to most severe, so the aggregate of a
/// change set is the maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    /// A change that cannot affect an existing client.
    #[default]
    NonBreaking,
    /// A new capability.
    Addition,
    /// An element marked for future removal.
    Deprecation,
    /// A change that can cause a correctly implemented client to fail.
    Breaking,
}

impl ChangeType {
    /// The lowercase label used in summaries and exports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonBreaking => "non-breaking",
            Self::Addition => "addition",
            Self::Deprecation => "deprecation",
            Self::Breaking => "breaking",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently a change needs attention.
///
/// Variants are ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    #[default]
    Low,
    /// Likely to need client work.
    Medium,
    /// Will break some clients.
    High,
    /// Will break most clients.
    Critical,
}

impl Severity {
    /// All severities, most severe first.
    pub const DESCENDING: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// The contribution of one change of this severity to the impact score.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Critical => 40,
            Self::High => 20,
            Self::Medium => 8,
            Self::Low => 2,
        }
    }

    /// The lowercase label used in summaries and exports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`AtomicChange`] with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedChange {
    /// The underlying change.
    #[serde(flatten)]
    pub change: AtomicChange,
    /// The contract impact category.
    pub change_type: ChangeType,
    /// How urgently the change needs attention.
    pub severity: Severity,
}

/// The aggregate classification of a set of changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    /// The most severe change type present.
    pub change_type: ChangeType,
    /// The highest severity present.
    pub severity: Severity,
    /// Weighted sum of severities, capped at 100.
    pub impact_score: u8,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn severity_and_type_orderings() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);

        assert!(ChangeType::Breaking > ChangeType::Deprecation);
        assert!(ChangeType::Deprecation > ChangeType::Addition);
        assert!(ChangeType::Addition > ChangeType::NonBreaking);
    }

    #[test]
    fn unknown_kind_and_subject_deserialize() {
        let change: AtomicChange = serde_json::from_value(json!({
            "path": "x.y",
            "kind": "reshuffled",
            "subject": {"element": "webhook"},
            "description": "from the future"
        }))
        .unwrap();

        assert_eq!(change.kind, ChangeKind::Unknown);
        assert_eq!(change.subject, Subject::Unknown);
        assert_eq!(change.old_value, None);
    }

    #[test]
    fn classified_change_serializes_flat() {
        let classified = ClassifiedChange {
            change: AtomicChange::removed(
                "paths./users.get".to_string(),
                Subject::Operation,
                json!({}),
            ),
            change_type: ChangeType::Breaking,
            severity: Severity::Critical,
        };

        let value = serde_json::to_value(&classified).unwrap();
        assert_eq!(value["path"], "paths./users.get");
        assert_eq!(value["kind"], "removed");
        assert_eq!(value["subject"]["element"], "operation");
        assert_eq!(value["changeType"], "breaking");
        assert_eq!(value["severity"], "critical");

        let back: ClassifiedChange = serde_json::from_value(value).unwrap();
        assert_eq!(back, classified);
    }

    #[test]
    fn parent_path_strips_last_segment() {
        let change = AtomicChange::added(
            "components.schemas.User.properties.nickname".to_string(),
            Subject::Property { required: false },
            json!({"type": "string"}),
        );
        assert_eq!(change.parent_path(), "components.schemas.User.properties");
        assert_eq!(change.description, "added field components.schemas.User.properties.nickname");
    }

    #[test]
    fn recorded_parent_survives_dotted_names() {
        let change = AtomicChange::removed(
            "components.schemas.User.properties.geo.lat".to_string(),
            Subject::Property { required: false },
            json!({"type": "number"}),
        )
        .with_parent("components.schemas.User.properties");
        assert_eq!(change.parent_path(), "components.schemas.User.properties");

        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["parent"], "components.schemas.User.properties");
        let back: AtomicChange = serde_json::from_value(value).unwrap();
        assert_eq!(back.parent_path(), "components.schemas.User.properties");
    }

    #[test]
    fn modified_description_mentions_both_values() {
        let change = AtomicChange::modified(
            "info.version".to_string(),
            Subject::Version,
            Some(json!("1.0.0")),
            Some(json!("1.0.1")),
        );
        assert_eq!(
            change.description,
            "changed version info.version from '1.0.0' to '1.0.1'"
        );
    }
}
