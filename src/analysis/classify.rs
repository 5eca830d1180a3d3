//! Classification of atomic changes by contract impact.

use std::collections::HashSet;

use serde_json::Value;

use crate::{
    analysis::openapi::is_required_response,
    domain::{AtomicChange, ChangeKind, ChangeType, ClassifiedChange, Impact, Severity, Subject},
};

/// The maximum impact score.
pub const MAX_IMPACT_SCORE: u8 = 100;

/// Classifies each change.
///
/// Rules are evaluated in precedence order per change:
///
/// 1. removed path, method, or success/`default` response: breaking, critical
/// 2. new required parameter or property: breaking, high
/// 3. optional element becoming required: breaking, high
/// 4. type or format change: breaking, medium
/// 5. rename of a parameter or property: breaking, medium
/// 6. security scheme type or scheme change: breaking, critical
/// 7. new optional path, method, parameter, property or response: addition,
///    low
/// 8. element newly deprecated: deprecation, low
/// 9. anything else: non-breaking, low
///
/// A rename is a removal and an addition of the same kind of element under
/// the same parent with an otherwise identical shape. Each removal is paired
/// with the first matching addition in list order.
///
/// Unknown kinds and subjects fall through to rule 9; classification never
/// fails.
#[must_use]
pub fn classify(changes: &[AtomicChange]) -> Vec<ClassifiedChange> {
    let renamed = rename_pairs(changes);

    changes
        .iter()
        .enumerate()
        .map(|(index, change)| {
            let (change_type, severity) = rule(change, renamed.contains(&index));
            ClassifiedChange {
                change: change.clone(),
                change_type,
                severity,
            }
        })
        .collect()
}

fn rule(change: &AtomicChange, renamed: bool) -> (ChangeType, Severity) {
    use ChangeKind::{Added, Modified, Removed};

    match (change.kind, &change.subject) {
        (Removed, Subject::Path | Subject::Operation) => (ChangeType::Breaking, Severity::Critical),
        (Removed, Subject::Response { status }) if is_required_response(status) => {
            (ChangeType::Breaking, Severity::Critical)
        }
        (
            Added,
            Subject::Parameter { required: true }
            | Subject::Property { required: true }
            | Subject::RequestBody { required: true },
        ) => (ChangeType::Breaking, Severity::High),
        (Modified, Subject::Requirement) if is_true(change.new_value.as_ref()) => {
            (ChangeType::Breaking, Severity::High)
        }
        (Modified, Subject::DataType) => (ChangeType::Breaking, Severity::Medium),
        _ if renamed => (ChangeType::Breaking, Severity::Medium),
        (Modified, Subject::SecurityKind) => (ChangeType::Breaking, Severity::Critical),
        (
            Added,
            Subject::Path
            | Subject::Operation
            | Subject::Parameter { .. }
            | Subject::Property { .. }
            | Subject::Response { .. },
        ) => (ChangeType::Addition, Severity::Low),
        (Modified, Subject::Deprecation) if is_true(change.new_value.as_ref()) => {
            (ChangeType::Deprecation, Severity::Low)
        }
        _ => (ChangeType::NonBreaking, Severity::Low),
    }
}

fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

/// Indices of changes that form rename pairs.
fn rename_pairs(changes: &[AtomicChange]) -> HashSet<usize> {
    let mut paired = HashSet::new();

    for (removed_index, removed) in changes.iter().enumerate() {
        if removed.kind != ChangeKind::Removed || !is_renameable(&removed.subject) {
            continue;
        }
        let partner = changes.iter().enumerate().find(|(index, added)| {
            added.kind == ChangeKind::Added
                && !paired.contains(index)
                && added.subject == removed.subject
                && added.parent_path() == removed.parent_path()
                && same_shape(&removed.subject, removed.old_value.as_ref(), added.new_value.as_ref())
        });
        if let Some((added_index, _)) = partner {
            paired.insert(removed_index);
            paired.insert(added_index);
        }
    }

    paired
}

const fn is_renameable(subject: &Subject) -> bool {
    matches!(subject, Subject::Parameter { .. } | Subject::Property { .. })
}

/// Compares two elements ignoring their names.
///
/// Property names are map keys, so the schemas compare directly. Parameters
/// carry their name inline.
fn same_shape(subject: &Subject, old: Option<&Value>, new: Option<&Value>) -> bool {
    match (subject, old, new) {
        (Subject::Parameter { .. }, Some(Value::Object(old)), Some(Value::Object(new))) => {
            let mut old = old.clone();
            let mut new = new.clone();
            old.remove("name");
            new.remove("name");
            old == new
        }
        (_, Some(old), Some(new)) => old == new,
        _ => false,
    }
}

/// Computes the aggregate classification of a change set.
///
/// The change type and severity are the maxima over all changes. The impact
/// score weighs each change by severity (critical 40, high 20, medium 8, low
/// 2) and is capped at [`MAX_IMPACT_SCORE`]. An empty set is non-breaking,
/// low, and scores zero.
#[must_use]
pub fn aggregate(classified: &[ClassifiedChange]) -> Impact {
    let change_type = classified
        .iter()
        .map(|change| change.change_type)
        .max()
        .unwrap_or_default();
    let severity = classified
        .iter()
        .map(|change| change.severity)
        .max()
        .unwrap_or_default();
    let score = classified
        .iter()
        .map(|change| change.severity.weight())
        .fold(0u32, u32::saturating_add);

    Impact {
        change_type,
        severity,
        impact_score: u8::try_from(score).map_or(MAX_IMPACT_SCORE, |s| s.min(MAX_IMPACT_SCORE)),
    }
}
