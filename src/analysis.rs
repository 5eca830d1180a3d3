//! The change-detection pipeline.
//!
//! Documents are normalized, compared structurally, classified, and
//! summarized. Every stage is a pure function; [`analyze`] runs them in
//! order for one pair of documents.

mod classify;
mod diff;
mod normalize;
mod openapi;
mod summary;

pub use classify::{MAX_IMPACT_SCORE, aggregate, classify};
pub use diff::diff;
pub use normalize::{InvalidSpecError, normalize};
pub use summary::{DEFAULT_EXAMPLES, summarize, summarize_with};

use tracing::debug;

use crate::domain::{ClassifiedChange, Impact, SpecDocument};

/// The result of comparing two documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// The classified changes in diff order.
    pub changes: Vec<ClassifiedChange>,
    /// The aggregate classification.
    pub impact: Impact,
    /// Human-readable digest.
    pub summary: String,
}

impl Analysis {
    /// Whether the documents are structurally identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Runs the full pipeline on two documents.
///
/// Both documents are normalized before comparison, so raw documents may be
/// passed directly. The summary names up to `examples` changes.
///
/// # Errors
///
/// Returns [`InvalidSpecError`] if either document is not an OpenAPI 3.x
/// document.
pub fn analyze(
    api_name: &str,
    from_version: &str,
    old: &SpecDocument,
    to_version: &str,
    new: &SpecDocument,
    examples: usize,
) -> Result<Analysis, InvalidSpecError> {
    let old = normalize(old)?;
    let new = normalize(new)?;

    let atomic = diff(&old, &new);
    let changes = classify(&atomic);
    let impact = aggregate(&changes);
    let summary = summarize_with(api_name, from_version, to_version, &changes, examples);

    debug!(
        api = api_name,
        from = from_version,
        to = to_version,
        changes = changes.len(),
        change_type = %impact.change_type,
        severity = %impact.severity,
        impact_score = impact.impact_score,
        "analyzed transition"
    );

    Ok(Analysis {
        changes,
        impact,
        summary,
    })
}
