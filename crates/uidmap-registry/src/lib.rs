//! Unique string-to-integer identifier registry.
//!
//! A [`Registry`] hands out compact, stable identifiers for arbitrary string
//! keys and persists every binding to a [`DurableStore`] so the same key maps
//! to the same number after a restart.
//!
//! # Architecture
//!
//! - The **forward index** (`key -> id`) answers the common case without
//!   locking beyond a shard read.
//! - The **live reverse index** (`id -> key`) is where concurrent allocations
//!   race: a candidate id is claimed with an insert-if-absent, then the key is
//!   claimed the same way in the forward index. Losing either race rolls back
//!   and retries; races never surface as errors.
//! - The **stable reverse index** (`id -> key`) is append-only and is the only
//!   index consulted by [`Registry::lookup_key`].
//! - Writes to the durable store are funneled through one critical section.
//!
//! # Modules
//!
//! - [`error`] — [`RegistryError`] and the crate `Result` alias
//! - [`generator`] — [`CandidateGenerator`], the candidate id stream
//! - [`registry`] — [`Registry`] itself
//! - [`config`] — [`RegistryConfig`], TOML-backed configuration
//! - [`global`] — optional process-wide installation
//!
//! [`DurableStore`]: uidmap_store::DurableStore

pub mod config;
pub mod error;
pub mod generator;
pub mod global;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use generator::CandidateGenerator;
pub use registry::Registry;
