//! State kept across observations, and its export formats.

/// JSON and CSV exports of change sets and ledger history.
pub mod export;
mod keyed;
mod ledger;

pub use keyed::{KeyedLocks, KeyedStore};
pub use ledger::{
    ApiHistory, HistoryStats, Ledger, LedgerEntry, Observation, Outcome, PendingObservation,
};
