//! The per-API record of observed specification versions.
//!
//! The [`Ledger`] is the stateful half of the engine. Each observation of an
//! API's document is compared against the most recent snapshot of that API,
//! and a [`ChangeSet`] is produced when the document changed. A given
//! `(from, to)` version transition is recorded at most once per API.

use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroUsize,
};

use chrono::{DateTime, Utc};
use nonempty::NonEmpty;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    analysis::{InvalidSpecError, analyze, normalize},
    domain::{ApiId, ChangeSet, Config, SpecDocument},
    storage::keyed::{KeyedLocks, KeyedStore},
};

/// One observed snapshot of an API's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// The version the snapshot was recorded under.
    pub version: String,
    /// Checksum of the document content.
    pub checksum: String,
    /// The document as fetched.
    pub document: SpecDocument,
    /// When the document was fetched.
    pub observed_at: DateTime<Utc>,
}

/// What recording an observation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// The first snapshot of the API; there was nothing to compare against.
    FirstSnapshot,
    /// The document is identical to the latest snapshot.
    Unchanged,
    /// The observation is older than the latest snapshot and was ignored.
    Stale,
    /// The document changed and a new change set was recorded.
    NewVersion,
    /// The document changed, but this version transition was already
    /// recorded. The earlier change set is returned.
    DuplicateTransition,
}

/// The result of [`Ledger::record_observation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// What recording the observation did.
    pub outcome: Outcome,
    /// The latest snapshot before this observation, if there was one.
    pub previous: Option<SpecDocument>,
    /// The change set for the transition, if the document changed.
    pub change_set: Option<ChangeSet>,
}

impl Observation {
    /// Whether this observation recorded a new change set.
    #[must_use]
    pub const fn is_new_version(&self) -> bool {
        matches!(self.outcome, Outcome::NewVersion)
    }

    const fn quiet(outcome: Outcome, previous: Option<SpecDocument>) -> Self {
        Self {
            outcome,
            previous,
            change_set: None,
        }
    }
}

/// An observation waiting to be recorded, for [`Ledger::record_batch`].
#[derive(Debug, Clone)]
pub struct PendingObservation {
    /// The observed API.
    pub api_id: ApiId,
    /// The version the document is recorded under.
    pub version: String,
    /// The fetched document.
    pub document: SpecDocument,
    /// When the document was fetched.
    pub observed_at: DateTime<Utc>,
}

/// Cumulative counters for one API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Number of snapshots currently retained.
    pub snapshots: usize,
    /// Number of distinct transitions recorded.
    pub change_sets: usize,
    /// Total number of classified changes across all change sets.
    pub changes: usize,
}

/// The ledger state of a single API.
#[derive(Debug, Default)]
pub struct ApiHistory {
    entries: Option<NonEmpty<LedgerEntry>>,
    change_sets: Vec<ChangeSet>,
    transitions: HashMap<(String, String), usize>,
    change_count: usize,
}

/// Settings a history needs while recording an observation.
#[derive(Debug, Clone, Copy)]
struct Recording {
    summary_examples: usize,
    history_limit: Option<NonZeroUsize>,
}

impl ApiHistory {
    /// The most recent snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&LedgerEntry> {
        self.entries.as_ref().map(NonEmpty::last)
    }

    /// Retained snapshots, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().flat_map(NonEmpty::iter)
    }

    /// Recorded change sets, in the order they were detected.
    #[must_use]
    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }

    /// Cumulative counters.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            snapshots: self.entries.as_ref().map_or(0, NonEmpty::len),
            change_sets: self.change_sets.len(),
            changes: self.change_count,
        }
    }

    fn observe(
        &mut self,
        api_id: &ApiId,
        entry: LedgerEntry,
        recording: Recording,
    ) -> Result<Observation, InvalidSpecError> {
        let Some(entries) = self.entries.as_mut() else {
            info!(version = %entry.version, "recorded first snapshot");
            self.entries = Some(NonEmpty::new(entry));
            return Ok(Observation::quiet(Outcome::FirstSnapshot, None));
        };

        let latest = entries.last();
        let previous = latest.document.clone();
        if latest.checksum == entry.checksum {
            debug!(version = %entry.version, "document unchanged");
            return Ok(Observation::quiet(Outcome::Unchanged, Some(previous)));
        }
        if entry.observed_at < latest.observed_at {
            warn!(
                version = %entry.version,
                observed_at = %entry.observed_at,
                latest = %latest.observed_at,
                "ignoring observation older than the latest snapshot"
            );
            return Ok(Observation::quiet(Outcome::Stale, Some(previous)));
        }

        let key = (latest.version.clone(), entry.version.clone());

        if let Some(&index) = self.transitions.get(&key) {
            info!(
                from = %key.0,
                to = %key.1,
                "transition already recorded, returning existing change set"
            );
            push_entry(entries, entry, recording.history_limit);
            return Ok(Observation {
                outcome: Outcome::DuplicateTransition,
                previous: Some(previous),
                change_set: Some(self.change_sets[index].clone()),
            });
        }

        let analysis = analyze(
            api_id,
            &key.0,
            &previous,
            &key.1,
            &entry.document,
            recording.summary_examples,
        )?;
        let change_set = ChangeSet::new(
            api_id.clone(),
            key.0.clone(),
            key.1.clone(),
            analysis.changes,
            analysis.impact,
            analysis.summary,
            entry.observed_at,
        );
        info!(
            from = %key.0,
            to = %key.1,
            change_type = %change_set.aggregate_change_type,
            severity = %change_set.severity,
            impact_score = change_set.impact_score,
            "recorded new version"
        );

        push_entry(entries, entry, recording.history_limit);
        self.change_count += change_set.changes.len();
        self.transitions.insert(key, self.change_sets.len());
        self.change_sets.push(change_set.clone());

        Ok(Observation {
            outcome: Outcome::NewVersion,
            previous: Some(previous),
            change_set: Some(change_set),
        })
    }
}

/// Appends a snapshot, dropping the oldest ones beyond `limit`.
fn push_entry(
    entries: &mut NonEmpty<LedgerEntry>,
    entry: LedgerEntry,
    limit: Option<NonZeroUsize>,
) {
    entries.push(entry);
    if let Some(limit) = limit {
        while entries.len() > limit.get() && !entries.tail.is_empty() {
            entries.head = entries.tail.remove(0);
        }
    }
}

/// Records observations of monitored APIs and detects version transitions.
///
/// State is kept per API in a [`KeyedStore`], which serializes observations
/// of the same API. Observations of different APIs proceed in parallel.
pub struct Ledger<S = KeyedLocks<ApiId, ApiHistory>> {
    config: Config,
    store: S,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Ledger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_store(config, KeyedLocks::new())
    }
}

impl<S> Ledger<S>
where
    S: KeyedStore<ApiId, ApiHistory>,
{
    /// Creates a ledger on top of the given store.
    pub const fn with_store(config: Config, store: S) -> Self {
        Self { config, store }
    }

    /// The ledger configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Records an observation of an API's document.
    ///
    /// - The first observation of an API is stored and nothing is compared.
    /// - A document with the same checksum as the latest snapshot is a no-op.
    /// - An observation older than the latest snapshot is ignored.
    /// - Otherwise the document is compared with the latest snapshot. If the
    ///   `(from, to)` version transition was already recorded, the earlier
    ///   change set is returned and no counters change; else a new change set
    ///   is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSpecError`] if the document is not an OpenAPI 3.x
    /// document. Nothing is stored in that case.
    #[instrument(level = "debug", skip(self, document), fields(api = %api_id))]
    pub fn record_observation(
        &self,
        api_id: &ApiId,
        version: &str,
        document: SpecDocument,
        observed_at: DateTime<Utc>,
    ) -> Result<Observation, InvalidSpecError> {
        normalize(&document)?;

        let entry = LedgerEntry {
            version: version.to_string(),
            checksum: document.checksum().to_string(),
            document,
            observed_at,
        };
        let recording = Recording {
            summary_examples: self.config.summary_examples(),
            history_limit: self.config.history_limit,
        };

        self.store
            .with_mut(api_id, |history| history.observe(api_id, entry, recording))
    }

    /// Records many observations, possibly of different APIs.
    ///
    /// Observations are grouped per API and each group is recorded in
    /// `observed_at` order; groups are processed in parallel. Results are
    /// returned in input order.
    pub fn record_batch(
        &self,
        observations: Vec<PendingObservation>,
    ) -> Vec<Result<Observation, InvalidSpecError>> {
        let total = observations.len();
        let mut groups: BTreeMap<ApiId, Vec<(usize, PendingObservation)>> = BTreeMap::new();
        for (index, observation) in observations.into_iter().enumerate() {
            groups
                .entry(observation.api_id.clone())
                .or_default()
                .push((index, observation));
        }
        debug!(observations = total, apis = groups.len(), "recording batch");

        let mut results: Vec<(usize, Result<Observation, InvalidSpecError>)> = groups
            .into_values()
            .collect::<Vec<_>>()
            .into_par_iter()
            .flat_map_iter(|mut group| {
                group.sort_by_key(|(_, observation)| observation.observed_at);
                group
                    .into_iter()
                    .map(|(index, observation)| {
                        let result = self.record_observation(
                            &observation.api_id,
                            &observation.version,
                            observation.document,
                            observation.observed_at,
                        );
                        (index, result)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        results.sort_unstable_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// The most recent snapshot of an API.
    pub fn latest(&self, api_id: &ApiId) -> Option<LedgerEntry> {
        self.store
            .with_ref(api_id, |history| history.latest().cloned())
            .flatten()
    }

    /// Retained snapshots of an API, oldest first.
    pub fn history(&self, api_id: &ApiId) -> Vec<LedgerEntry> {
        self.store
            .with_ref(api_id, |history| history.entries().cloned().collect())
            .unwrap_or_default()
    }

    /// Change sets recorded for an API, in detection order.
    pub fn change_sets(&self, api_id: &ApiId) -> Vec<ChangeSet> {
        self.store
            .with_ref(api_id, |history| history.change_sets().to_vec())
            .unwrap_or_default()
    }

    /// Cumulative counters for an API.
    pub fn stats(&self, api_id: &ApiId) -> Option<HistoryStats> {
        self.store.with_ref(api_id, ApiHistory::stats)
    }

    /// All APIs with recorded state, sorted.
    pub fn api_ids(&self) -> Vec<ApiId> {
        let mut ids = self.store.keys();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::domain::{ChangeType, Severity};

    fn api() -> ApiId {
        ApiId::new("weather").unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn spec(version: &str, paths: &[&str]) -> SpecDocument {
        let paths: serde_json::Map<String, serde_json::Value> = paths
            .iter()
            .map(|path| {
                (
                    (*path).to_string(),
                    json!({"get": {"responses": {"200": {"description": "ok"}}}}),
                )
            })
            .collect();
        SpecDocument::new(json!({
            "openapi": "3.0.3",
            "info": {"title": "Weather", "version": version},
            "paths": paths,
        }))
    }

    #[test]
    fn first_observation_has_nothing_to_compare() {
        let ledger = Ledger::default();
        let observation = ledger
            .record_observation(&api(), "1.0", spec("1.0", &["/forecast"]), at(0))
            .unwrap();

        assert_eq!(observation.outcome, Outcome::FirstSnapshot);
        assert!(!observation.is_new_version());
        assert!(observation.previous.is_none());
        assert!(observation.change_set.is_none());
        assert_eq!(ledger.history(&api()).len(), 1);
    }

    #[test]
    fn reobserving_identical_content_is_a_noop() {
        let ledger = Ledger::default();
        let doc = spec("1.0", &["/forecast"]);

        for minute in 0..3 {
            let observation = ledger
                .record_observation(&api(), "1.0", doc.clone(), at(minute))
                .unwrap();
            assert!(!observation.is_new_version());
            assert!(observation.change_set.is_none());
        }

        assert!(ledger.change_sets(&api()).is_empty());
        assert_eq!(ledger.history(&api()).len(), 1);
    }

    #[test]
    fn new_version_produces_change_set() {
        let ledger = Ledger::default();
        let v1 = spec("1.0", &["/forecast", "/users"]);
        let v2 = spec("1.1", &["/forecast"]);

        ledger.record_observation(&api(), "1.0", v1.clone(), at(0)).unwrap();
        let observation = ledger.record_observation(&api(), "1.1", v2, at(5)).unwrap();

        assert!(observation.is_new_version());
        assert_eq!(observation.previous, Some(v1));
        let change_set = observation.change_set.unwrap();
        assert_eq!(change_set.api_id, api());
        assert_eq!(change_set.from_version, "1.0");
        assert_eq!(change_set.to_version, "1.1");
        assert_eq!(change_set.detected_at, at(5));
        assert_eq!(change_set.aggregate_change_type, ChangeType::Breaking);
        assert_eq!(change_set.severity, Severity::Critical);
        assert!(change_set.summary.starts_with("weather v1.0 → v1.1 (breaking)"));

        assert_eq!(ledger.latest(&api()).unwrap().version, "1.1");
        assert_eq!(
            ledger.stats(&api()),
            Some(HistoryStats {
                snapshots: 2,
                change_sets: 1,
                changes: change_set.changes.len(),
            })
        );
    }

    #[test]
    fn duplicate_transition_is_suppressed() {
        let ledger = Ledger::default();
        let v1 = spec("1", &["/a"]);
        let v2 = spec("2", &["/a", "/b"]);

        ledger.record_observation(&api(), "1", v1.clone(), at(0)).unwrap();
        let first = ledger.record_observation(&api(), "2", v2.clone(), at(1)).unwrap();
        let rollback = ledger.record_observation(&api(), "1", v1, at(2)).unwrap();
        let before = ledger.stats(&api()).unwrap();
        let retried = ledger.record_observation(&api(), "2", v2, at(3)).unwrap();

        assert!(first.is_new_version());
        assert!(rollback.is_new_version());
        assert_eq!(retried.outcome, Outcome::DuplicateTransition);
        assert!(!retried.is_new_version());
        assert_eq!(
            retried.change_set.map(|c| c.id),
            first.change_set.as_ref().map(|c| c.id)
        );

        let stored: Vec<_> = ledger
            .change_sets(&api())
            .into_iter()
            .filter(|c| c.from_version == "1" && c.to_version == "2")
            .collect();
        assert_eq!(stored.len(), 1);

        let after = ledger.stats(&api()).unwrap();
        assert_eq!(
            after,
            HistoryStats {
                snapshots: before.snapshots + 1,
                ..before
            }
        );
        assert_eq!(after.change_sets, 2);
        assert_eq!(after.snapshots, 4);
        assert_eq!(ledger.latest(&api()).unwrap().version, "2");
    }

    #[test]
    fn stale_observation_is_ignored() {
        let ledger = Ledger::default();
        ledger
            .record_observation(&api(), "2", spec("2", &["/a"]), at(10))
            .unwrap();

        let observation = ledger
            .record_observation(&api(), "1", spec("1", &[]), at(5))
            .unwrap();
        assert_eq!(observation.outcome, Outcome::Stale);
        assert_eq!(ledger.latest(&api()).unwrap().version, "2");
    }

    #[test]
    fn invalid_document_is_not_stored() {
        let ledger = Ledger::default();
        let error = ledger
            .record_observation(&api(), "1", SpecDocument::new(json!({"info": {}})), at(0))
            .unwrap_err();

        assert_eq!(error, InvalidSpecError::MissingField("openapi"));
        assert!(ledger.latest(&api()).is_none());
        assert!(ledger.api_ids().is_empty());
    }

    #[test]
    fn history_limit_keeps_newest() {
        let mut config = Config::default();
        config.history_limit = NonZeroUsize::new(2);
        let ledger = Ledger::new(config);
        for (minute, version) in [(0, "1"), (1, "2"), (2, "3"), (3, "4")] {
            ledger
                .record_observation(&api(), version, spec(version, &[]), at(minute))
                .unwrap();
        }

        let versions: Vec<_> = ledger
            .history(&api())
            .into_iter()
            .map(|entry| entry.version)
            .collect();
        assert_eq!(versions, ["3", "4"]);
        assert_eq!(ledger.change_sets(&api()).len(), 3);
    }

    #[test]
    fn concurrent_observations_of_one_api_record_one_transition() {
        let ledger = Ledger::default();
        ledger
            .record_observation(&api(), "1", spec("1", &["/a"]), at(0))
            .unwrap();
        let v2 = spec("2", &["/a", "/b"]);

        let outcomes: Vec<Outcome> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        ledger
                            .record_observation(&api(), "2", v2.clone(), at(1))
                            .unwrap()
                            .outcome
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(
            outcomes.iter().filter(|&&o| o == Outcome::NewVersion).count(),
            1
        );
        assert_eq!(
            outcomes.iter().filter(|&&o| o == Outcome::Unchanged).count(),
            7
        );
        assert_eq!(ledger.change_sets(&api()).len(), 1);
    }

    #[test]
    fn batch_orders_per_api_and_preserves_input_order() {
        let ledger = Ledger::default();
        let other = ApiId::new("billing").unwrap();
        let pending = |api_id: &ApiId, version: &str, paths: &[&str], minute| PendingObservation {
            api_id: api_id.clone(),
            version: version.to_string(),
            document: spec(version, paths),
            observed_at: at(minute),
        };

        let results = ledger.record_batch(vec![
            pending(&api(), "2", &["/a", "/b"], 5),
            pending(&other, "1", &["/x"], 0),
            pending(&api(), "1", &["/a"], 0),
            pending(&other, "2", &[], 1),
        ]);

        let outcomes: Vec<_> = results
            .into_iter()
            .map(|result| result.unwrap().outcome)
            .collect();
        assert_eq!(
            outcomes,
            [
                Outcome::NewVersion,
                Outcome::FirstSnapshot,
                Outcome::FirstSnapshot,
                Outcome::NewVersion,
            ]
        );
        assert_eq!(ledger.api_ids(), vec![other, api()]);
    }
}
