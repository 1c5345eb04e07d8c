//! Process-wide registry.
//!
//! Most code should pass a [`Registry`] around explicitly. This module exists
//! for call sites that cannot, and refuses every call until a registry has
//! been installed.

use std::sync::OnceLock;

use uidmap_types::Identifier;

use crate::error::{RegistryError, Result};
use crate::registry::Registry;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Install the process-wide registry. Only the first call succeeds.
pub fn install(registry: Registry) -> Result<&'static Registry> {
    REGISTRY
        .set(registry)
        .map_err(|_| RegistryError::AlreadyConfigured)?;
    registry_ref()
}

/// The installed registry, or [`RegistryError::NotConfigured`].
pub fn registry_ref() -> Result<&'static Registry> {
    REGISTRY.get().ok_or(RegistryError::NotConfigured)
}

/// [`Registry::get_or_create_id`] on the installed registry.
pub fn get_or_create_id(key: &str) -> Result<Identifier> {
    registry_ref()?.get_or_create_id(key)
}

/// [`Registry::lookup_key`] on the installed registry.
pub fn lookup_key(id: Identifier) -> Result<Option<String>> {
    Ok(registry_ref()?.lookup_key(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uidmap_store::InMemoryStore;

    // The only test in this binary that touches the process-wide slot.
    #[test]
    fn install_lifecycle() {
        assert!(matches!(
            get_or_create_id("custom:block_x").unwrap_err(),
            RegistryError::NotConfigured
        ));

        let registry = Registry::open(Arc::new(InMemoryStore::new())).unwrap();
        install(registry).unwrap();

        let id = get_or_create_id("custom:block_x").unwrap();
        assert_eq!(lookup_key(id).unwrap().as_deref(), Some("custom:block_x"));
        assert_eq!(registry_ref().unwrap().len(), 1);

        let second = Registry::open(Arc::new(InMemoryStore::new())).unwrap();
        assert!(matches!(
            install(second).unwrap_err(),
            RegistryError::AlreadyConfigured
        ));
    }
}
