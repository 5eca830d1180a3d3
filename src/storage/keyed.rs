//! Per-key serialized state.
//!
//! The ledger reads the latest snapshot of an API and then writes a new one.
//! Two observations of the same API must not interleave between those steps,
//! while observations of different APIs may run in parallel. [`KeyedStore`]
//! captures that contract, and [`KeyedLocks`] implements it in memory with
//! one mutex per key.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

/// Keyed state with at most one writer per key at a time.
pub trait KeyedStore<K, V>: Send + Sync {
    /// Runs `f` with exclusive access to the value for `key`, creating a
    /// default value if none exists.
    ///
    /// Calls for the same key are serialized; calls for different keys may
    /// run concurrently.
    fn with_mut<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> R;

    /// Runs `f` with access to the value for `key`, if one exists.
    fn with_ref<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R>;

    /// All keys that have a value, in unspecified order.
    fn keys(&self) -> Vec<K>;
}

/// An in-memory [`KeyedStore`] holding a mutex per key.
///
/// The outer map is only write-locked while a new key is inserted, so work on
/// existing keys never contends on it. A poisoned mutex is recovered rather
/// than propagated; the guarded state is only replaced wholesale by its
/// owner, so it is never observed half-written.
#[derive(Debug)]
pub struct KeyedLocks<K, V> {
    slots: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Default for KeyedLocks<K, V> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedLocks<K, V>
where
    K: Eq + Hash + Clone,
    V: Default,
{
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn slot(&self, key: &K) -> Arc<Mutex<V>> {
        if let Some(slot) = self.existing(key) {
            return slot;
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

impl<K, V> KeyedStore<K, V> for KeyedLocks<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Default + Send,
{
    fn with_mut<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> R {
        let slot = self.slot(key);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn with_ref<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let slot = self.existing(key)?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&guard))
    }

    fn keys(&self) -> Vec<K> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
