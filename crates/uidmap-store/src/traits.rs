use crate::error::StoreResult;

/// Synchronous `String -> i64` store backing the registry across restarts.
///
/// All implementations must satisfy these invariants:
/// - `set` and `remove` are visible to `get`/`keys` immediately but are only
///   guaranteed durable after a successful `save`.
/// - `load` replaces the in-memory view with what the medium holds; a medium
///   that does not exist yet is an empty store.
/// - Values are opaque. The store does not reject negative or out-of-range
///   numbers.
///
/// Callers are expected to serialize `set`/`save` pairs themselves; backends
/// only guarantee that individual calls are thread-safe.
pub trait DurableStore: Send + Sync {
    /// Populate the in-memory view from the backing medium.
    fn load(&self) -> StoreResult<()>;

    /// Read a value by key. Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Create or overwrite a value. Durable after the next `save`.
    fn set(&self, key: &str, value: i64) -> StoreResult<()>;

    /// Delete a key. Returns `true` if it existed. Durable after the next `save`.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Flush every pending write to the backing medium.
    fn save(&self) -> StoreResult<()>;

    /// All keys currently present, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Whether `key` is present.
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Read every `(key, value)` pair, sorted by key.
    ///
    /// Default implementation calls `get()` for each key. Backends may
    /// override to read under a single lock.
    fn entries(&self) -> StoreResult<Vec<(String, i64)>> {
        let mut out = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }
}
