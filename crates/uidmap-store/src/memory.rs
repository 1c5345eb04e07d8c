//! In-memory durable store for testing and embedding.
//!
//! [`InMemoryStore`] keeps two maps: the working view that `get`/`set` operate
//! on, and a "saved" map standing in for the medium. `save` copies the working
//! view into the saved map and `load` copies it back, so unsaved writes are
//! lost across a simulated restart exactly as they would be on disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::DurableStore;

/// An in-memory implementation of [`DurableStore`].
///
/// Counts `set` and `save` calls so tests can assert how many physical writes
/// an operation caused, and can be switched into failing loads or saves.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    working: RwLock<HashMap<String, i64>>,
    saved: RwLock<HashMap<String, i64>>,
    sets: AtomicUsize,
    saves: AtomicUsize,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose medium already holds `entries`.
    ///
    /// Seeding does not count towards [`set_count`](Self::set_count) or
    /// [`save_count`](Self::save_count).
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let map: HashMap<String, i64> = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            working: RwLock::new(map.clone()),
            saved: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Number of `set` calls so far.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent `load` fail (or succeed again).
    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Value as last saved to the simulated medium.
    pub fn saved_value(&self, key: &str) -> Option<i64> {
        self.saved.read().get(key).copied()
    }

    /// Number of keys on the simulated medium.
    pub fn saved_len(&self) -> usize {
        self.saved.read().len()
    }
}

impl DurableStore for InMemoryStore {
    fn load(&self) -> StoreResult<()> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory medium is offline".into()));
        }
        let saved = self.saved.read().clone();
        *self.working.write() = saved;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.working.read().get(key).copied())
    }

    fn set(&self, key: &str, value: i64) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.working.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.working.write().remove(key).is_some())
    }

    fn save(&self) -> StoreResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory medium is read-only".into()));
        }
        let working = self.working.read().clone();
        *self.saved.write() = working;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self.working.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn entries(&self) -> StoreResult<Vec<(String, i64)>> {
        let mut entries: Vec<(String, i64)> = self
            .working
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        Ok(entries)
    }
}
