//! The identifier registry: three in-memory indices over a durable store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uidmap_store::{DurableStore, StoreResult};
use uidmap_types::{validate_key, Binding, Identifier, CAPACITY};

use crate::error::{RegistryError, Result};
use crate::generator::CandidateGenerator;

/// Persisted, concurrent `key <-> id` registry.
///
/// Invariants maintained at all times:
/// - every `forward[k] = id` has `reverse[id] = k` and `stable[id] = k`;
/// - `stable` never loses an entry;
/// - no id is bound to two keys and no key to two ids.
///
/// `reverse` may briefly hold a claim whose forward half lost a race; that
/// claim is removed before the losing thread retries.
///
/// An id is only ever returned by [`get_or_create_id`](Self::get_or_create_id)
/// once its binding has been saved to the store.
pub struct Registry {
    forward: DashMap<String, Identifier>,
    reverse: DashMap<Identifier, String>,
    stable: DashMap<Identifier, String>,
    candidates: CandidateGenerator,
    store: Arc<dyn DurableStore>,
    /// Bindings visible in `forward` but not yet saved to the store.
    unsaved: DashMap<String, Identifier>,
    /// Size of `unsaved`, so fast-path hits can skip the map.
    unsaved_len: AtomicUsize,
    /// Single critical section for every store write.
    persist_lock: Mutex<()>,
    closed: AtomicBool,
}

impl Registry {
    /// Bootstrap a registry from `store`.
    ///
    /// Loads the store and indexes every valid entry. Entries holding `-1`, an
    /// out-of-range value, an empty key, or an id already taken by an earlier
    /// key (in key order) are removed from the store and skipped.
    pub fn open(store: Arc<dyn DurableStore>) -> Result<Self> {
        store.load().map_err(RegistryError::StoreUnavailable)?;
        let entries = store.entries().map_err(RegistryError::StoreUnavailable)?;

        let registry = Self {
            forward: DashMap::new(),
            reverse: DashMap::new(),
            stable: DashMap::new(),
            candidates: CandidateGenerator::new(),
            store,
            unsaved: DashMap::new(),
            unsaved_len: AtomicUsize::new(0),
            persist_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        };

        let mut purged = Vec::new();
        for (key, raw) in entries {
            let id = match Identifier::try_from(raw) {
                Ok(id) if validate_key(&key).is_ok() && !registry.reverse.contains_key(&id) => id,
                _ => {
                    purged.push((key, raw));
                    continue;
                }
            };
            registry.forward.insert(key.clone(), id);
            registry.reverse.insert(id, key.clone());
            registry.stable.insert(id, key);
        }

        if !purged.is_empty() {
            registry.purge(&purged);
        }

        info!(
            bindings = registry.forward.len(),
            purged = purged.len(),
            "identifier registry opened"
        );
        Ok(registry)
    }

    /// Drop corrupt entries from the store.
    ///
    /// Failures are logged only: the entries are already excluded from the
    /// indices, and any removal left unsaved rides along with the next save.
    fn purge(&self, purged: &[(String, i64)]) {
        let _guard = self.persist_lock.lock();
        for (key, raw) in purged {
            warn!(key = %key, value = raw, "purging corrupt store entry");
            if let Err(e) = self.store.remove(key) {
                warn!(key = %key, error = %e, "failed to remove corrupt store entry");
            }
        }
        if let Err(e) = self.store.save() {
            warn!(error = %e, "failed to save store after purging corrupt entries");
        }
    }

    /// Return the id bound to `key`, allocating and persisting one if needed.
    ///
    /// Concurrent callers with the same key all receive the same id and the
    /// store sees exactly one write for it. A binding whose save failed is
    /// retried on every call for its key and reported as
    /// [`RegistryError::Store`] until a save succeeds. Fails with
    /// [`RegistryError::AllocationExhausted`] when every legal id is bound,
    /// leaving existing bindings untouched.
    pub fn get_or_create_id(&self, key: &str) -> Result<Identifier> {
        validate_key(key)?;

        let mut misses = 0usize;
        loop {
            if let Some(id) = self.fast_path(key) {
                self.ensure_persisted(key)?;
                return Ok(id);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(RegistryError::Closed);
            }

            let candidate = self.candidates.next_candidate();
            if self.reverse.contains_key(&candidate) || !self.claim_reverse(candidate, key) {
                misses += 1;
                if misses % CAPACITY == 0 && self.forward.len() >= CAPACITY {
                    warn!(key, capacity = CAPACITY, "identifier space exhausted");
                    return Err(RegistryError::AllocationExhausted { capacity: CAPACITY });
                }
                continue;
            }

            if !self.claim_forward(key, candidate) {
                // Another thread bound this key first; give the candidate back
                // and pick up the winner's id on the next pass.
                self.reverse.remove_if(&candidate, |_, owner| owner == key);
                debug!(key, candidate = %candidate, "lost forward race; released candidate");
                continue;
            }

            self.stable.insert(candidate, key.to_string());
            debug!(key, id = %candidate, "allocated identifier");
            self.ensure_persisted(key)?;
            return Ok(candidate);
        }
    }

    /// Forward lookup that also makes sure the binding is resolvable by id.
    fn fast_path(&self, key: &str) -> Option<Identifier> {
        let id = *self.forward.get(key)?;
        // The allocating thread may not have reached the stable index yet.
        if !self.stable.contains_key(&id) {
            self.stable.entry(id).or_insert_with(|| key.to_string());
        }
        Some(id)
    }

    fn claim_reverse(&self, candidate: Identifier, key: &str) -> bool {
        match self.reverse.entry(candidate) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(key.to_string());
                true
            }
        }
    }

    fn claim_forward(&self, key: &str, candidate: Identifier) -> bool {
        match self.forward.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                // Recorded while the shard is still locked, so no reader can
                // see the forward entry without also seeing it as unsaved.
                self.unsaved.insert(key.to_string(), candidate);
                self.unsaved_len.fetch_add(1, Ordering::AcqRel);
                slot.insert(candidate);
                true
            }
        }
    }

    /// Save `key`'s binding if it is still pending. One writer at a time.
    fn ensure_persisted(&self, key: &str) -> Result<()> {
        if self.unsaved_len.load(Ordering::Acquire) == 0 || !self.unsaved.contains_key(key) {
            return Ok(());
        }
        let _guard = self.persist_lock.lock();
        if !self.unsaved.contains_key(key) {
            // Saved by another caller while we waited.
            return Ok(());
        }
        self.write_unsaved().map_err(|e| {
            warn!(
                key,
                pending = self.unsaved_len.load(Ordering::Acquire),
                error = %e,
                "failed to persist bindings"
            );
            RegistryError::Store(e)
        })
    }

    /// Write every pending binding and save. Caller holds `persist_lock`.
    fn write_unsaved(&self) -> StoreResult<()> {
        let pending: Vec<Binding> = self
            .unsaved
            .iter()
            .map(|e| Binding::new(e.key().clone(), *e.value()))
            .collect();
        for binding in &pending {
            self.store.set(&binding.key, i64::from(binding.id))?;
        }
        self.store.save()?;
        for binding in pending {
            if self.unsaved.remove(&binding.key).is_some() {
                self.unsaved_len.fetch_sub(1, Ordering::AcqRel);
            }
        }
        Ok(())
    }

    /// The key stably bound to `id`, if any.
    pub fn lookup_key(&self, id: Identifier) -> Option<String> {
        self.stable.get(&id).map(|key| key.value().clone())
    }

    /// [`lookup_key`](Self::lookup_key) for an unvalidated number.
    pub fn lookup_raw(&self, raw: i64) -> Option<String> {
        Identifier::try_from(raw).ok().and_then(|id| self.lookup_key(id))
    }

    /// The id bound to `key`, without allocating or saving.
    ///
    /// Includes bindings whose save is still pending.
    pub fn id_of(&self, key: &str) -> Option<Identifier> {
        self.fast_path(key)
    }

    /// All issued ids, sorted.
    pub fn ids(&self) -> Vec<Identifier> {
        let mut ids: Vec<Identifier> = self.forward.iter().map(|e| *e.value()).collect();
        ids.sort();
        ids
    }

    /// All bindings, sorted by id.
    pub fn bindings(&self) -> Vec<Binding> {
        let mut bindings: Vec<Binding> = self
            .forward
            .iter()
            .map(|e| Binding::new(e.key().clone(), *e.value()))
            .collect();
        bindings.sort_by_key(|b| b.id);
        bindings
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if no key is bound.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Retry any bindings whose persistence failed, then save the store.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.persist_lock.lock();
        self.write_unsaved().map_err(RegistryError::Store)
    }

    /// Stop allocating, then flush. Existing bindings stay readable.
    ///
    /// A call that was already past the closed check may still finish its
    /// allocation; it saves its own binding before returning.
    pub fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.flush()?;
        info!(bindings = self.forward.len(), "identifier registry closed");
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.forward.len())
            .field("stable", &self.stable.len())
            .field("unsaved", &self.unsaved_len.load(Ordering::Acquire))
            .field("closed", &self.is_closed())
            .finish()
    }
}
