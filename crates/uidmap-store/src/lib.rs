//! Durable key/value storage for the unique id map.
//!
//! The registry keeps its authoritative indices in memory and relies on a
//! [`DurableStore`] only to survive restarts. The store is a plain
//! `String -> i64` map with an explicit `save` step: writes are buffered until
//! saved, and nothing is read from the medium until `load` is called.
//!
//! # Storage Backends
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//! - [`JournalStore`] -- append-only, CRC-framed journal file
//!
//! # Design Rules
//!
//! 1. Values are raw `i64`; the store never validates them. Interpreting
//!    sentinel or out-of-range values is the registry's job.
//! 2. `set` and `remove` are buffered; only `save` touches the medium.
//! 3. A missing medium loads as an empty store. An unreadable one is an error.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod journal;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use journal::{JournalConfig, JournalRecord, JournalStore, SyncMode};
pub use memory::InMemoryStore;
pub use traits::DurableStore;
