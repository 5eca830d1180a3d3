//! Domain models for change detection.
//!
//! This module contains the core domain types: API identifiers, OpenAPI
//! documents, change records, change sets and configuration.

mod api_id;
pub use api_id::{ApiId, ApiIdError};

/// Atomic and classified change records.
pub mod change;
pub use change::{AtomicChange, ChangeKind, ChangeType, ClassifiedChange, Impact, Severity, Subject};

mod change_set;
pub use change_set::ChangeSet;

mod config;
pub use config::Config;

/// OpenAPI documents and parsing.
pub mod document;
pub use document::{ParseError, SpecDocument};
