use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uidmap_store::{JournalConfig, JournalStore, SyncMode};

use crate::error::{RegistryError, Result};
use crate::registry::Registry;

/// Which durable store backs the registry, and how it syncs.
///
/// ```toml
/// store_path = "/var/lib/game/custom-ids.journal"
/// sync_mode = "every_write"
/// compact_on_load = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub store_path: PathBuf,
    pub sync_mode: SyncMode,
    pub compact_on_load: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("uidmap.journal"),
            sync_mode: SyncMode::EveryWrite,
            compact_on_load: false,
        }
    }
}

impl RegistryConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RegistryError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| RegistryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig {
            sync_mode: self.sync_mode,
            compact_on_load: self.compact_on_load,
        }
    }

    /// Open the configured journal without loading it.
    pub fn open_store(&self) -> Result<Arc<JournalStore>> {
        let store = JournalStore::open(&self.store_path, self.journal_config())
            .map_err(RegistryError::StoreUnavailable)?;
        Ok(Arc::new(store))
    }

    /// Open the configured journal and bootstrap a registry on it.
    pub fn open_registry(&self) -> Result<Registry> {
        Registry::open(self.open_store()?)
    }
}
