use std::sync::Arc;

use tracing::debug;

use super::{ConfigError, LabSettings, SettingsStorage};

/// Typed access to the persisted settings document.
#[derive(Clone)]
pub struct OperationConfigStore {
    storage: Arc<dyn SettingsStorage>,
}

impl OperationConfigStore {
    pub fn new(storage: Arc<dyn SettingsStorage>) -> Self {
        Self { storage }
    }

    /// Load stored settings merged over the built-in defaults.
    pub async fn load(&self) -> Result<LabSettings, ConfigError> {
        let stored = self.storage.load().await?;
        let settings = LabSettings::from_stored(stored)?;
        debug!(commands = settings.commands.len(), server_url = %settings.server_url, "settings loaded");
        Ok(settings)
    }

    /// Persist the full settings document.
    pub async fn save(&self, settings: &LabSettings) -> Result<(), ConfigError> {
        self.storage.save(&settings.to_value()?).await
    }
}

impl std::fmt::Debug for OperationConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationConfigStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettingsStorage;
    use serde_json::json;

    #[tokio::test]
    async fn save_of_load_is_a_no_op() {
        let stored = json!({
            "server_url": "http://localhost:5000",
            "debug": "verbose",
            "commands": {
                "hello_world": {"active": true, "label": "Hello world", "mode": "insert-text"},
                "gone": {"active": true, "label": "Gone", "mode": "panel", "region": "left"}
            }
        });
        let storage = Arc::new(MemorySettingsStorage::with_data(stored.clone()));
        let store = OperationConfigStore::new(storage.clone());

        let settings = store.load().await.unwrap();
        store.save(&settings).await.unwrap();
        assert_eq!(storage.snapshot().await, Some(stored));
    }

    #[tokio::test]
    async fn load_never_writes() {
        let storage = Arc::new(MemorySettingsStorage::new());
        let store = OperationConfigStore::new(storage.clone());
        store.load().await.unwrap();
        assert_eq!(storage.save_count(), 0);
        assert!(storage.snapshot().await.is_none());
    }
}
