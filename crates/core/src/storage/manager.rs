use log::debug;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::portfolio::PortfolioState;

use super::format;
use super::store::KeyValueStore;

/// Result of reading the stored blob.
#[derive(Debug)]
pub enum StoredState {
    /// Nothing stored under the key yet
    Missing,
    /// A blob exists but could not be read; it has been logged
    Unreadable,
    Loaded(PortfolioState),
}

/// Reads and writes the state blob through a [`KeyValueStore`].
///
/// Flow: PortfolioState → JSON → store[key], and back.
pub struct StorageManager {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl StorageManager {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored state.
    ///
    /// Only store access failures are errors; a corrupt blob is logged and
    /// reported as [`StoredState::Unreadable`].
    pub fn load(&self) -> Result<StoredState, CoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            debug!("No stored state under '{}'", self.key);
            return Ok(StoredState::Missing);
        };
        Ok(format::load(&raw).map_or(StoredState::Unreadable, StoredState::Loaded))
    }

    /// Serialize and write the whole state under the configured key.
    pub fn save(&self, state: &PortfolioState) -> Result<(), CoreError> {
        let json = serde_json::to_string(state)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize portfolio: {e}")))?;
        self.store.set(&self.key, &json)?;
        debug!("Saved state under '{}' ({} bytes)", self.key, json.len());
        Ok(())
    }

    /// Delete the stored blob.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.store.remove(&self.key)
    }
}
