//! Error types for registry operations.

use thiserror::Error;
use uidmap_store::StoreError;
use uidmap_types::TypeError;

/// Errors that can escape a registry call.
///
/// Allocation races are resolved internally and never appear here.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every identifier in the legal range is bound.
    #[error("out of identifiers: all {capacity} ids are bound")]
    AllocationExhausted { capacity: usize },

    /// The durable store could not be loaded at bootstrap.
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// A new binding could not be written to the durable store.
    #[error("failed to persist binding: {0}")]
    Store(#[source] StoreError),

    /// The key can never be bound.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    /// The registry was closed and no longer allocates.
    #[error("registry is closed")]
    Closed,

    /// No process-wide registry has been installed.
    #[error("no registry configured")]
    NotConfigured,

    /// A process-wide registry is already installed.
    #[error("a registry is already configured")]
    AlreadyConfigured,

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
