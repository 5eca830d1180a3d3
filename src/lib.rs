//! Change detection for OpenAPI specifications.
//!
//! Successive snapshots of an API's specification are compared
//! structurally. Each difference is classified by compatibility impact and
//! severity, and every version transition yields one [`ChangeSet`] with a
//! human-readable summary.
//!
//! The [`analysis`] pipeline is pure. The [`Ledger`] records snapshots per
//! API and suppresses repeated transitions.

pub mod domain;
pub use domain::{
    ApiId, AtomicChange, ChangeKind, ChangeSet, ChangeType, ClassifiedChange, Config, Severity,
    SpecDocument,
};

pub mod analysis;
pub use analysis::{Analysis, InvalidSpecError, analyze};

/// Snapshot ledger and exports.
pub mod storage;
pub use storage::{Ledger, Observation, Outcome};
