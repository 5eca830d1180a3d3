use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    ApiId,
    change::{ChangeType, ClassifiedChange, Impact, Severity},
};

/// The classified diff for one version transition of an API.
///
/// A change set is created once per detected transition and never modified
/// afterwards. Acknowledgement and delivery state belong to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Globally unique identifier of this change set.
    pub id: Uuid,
    /// The API the transition belongs to.
    pub api_id: ApiId,
    /// Version of the previous snapshot.
    pub from_version: String,
    /// Version of the new snapshot.
    pub to_version: String,
    /// The classified changes, in diff order.
    pub changes: Vec<ClassifiedChange>,
    /// The most severe change type present.
    pub aggregate_change_type: ChangeType,
    /// The highest severity present.
    pub severity: Severity,
    /// Weighted severity score in `0..=100`.
    pub impact_score: u8,
    /// Human-readable digest.
    pub summary: String,
    /// When the transition was observed.
    pub detected_at: DateTime<Utc>,
}

impl ChangeSet {
    /// Assembles a change set with a freshly generated identifier.
    #[must_use]
    pub fn new(
        api_id: ApiId,
        from_version: String,
        to_version: String,
        changes: Vec<ClassifiedChange>,
        impact: Impact,
        summary: String,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            api_id,
            from_version,
            to_version,
            changes,
            aggregate_change_type: impact.change_type,
            severity: impact.severity,
            impact_score: impact.impact_score,
            summary,
            detected_at,
        }
    }

    /// Whether the transition contains at least one breaking change.
    #[must_use]
    pub fn is_breaking(&self) -> bool {
        self.aggregate_change_type == ChangeType::Breaking
    }

    /// The aggregate classification.
    #[must_use]
    pub const fn impact(&self) -> Impact {
        Impact {
            change_type: self.aggregate_change_type,
            severity: self.severity,
            impact_score: self.impact_score,
        }
    }

    /// Number of changes with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.changes
            .iter()
            .filter(|change| change.severity == severity)
            .count()
    }
}
