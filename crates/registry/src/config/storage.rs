use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dirs_next::config_dir;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use vaultlab_util::expand_tilde;

use super::ConfigError;

/// Returns the default path for the settings file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var("VAULTLAB_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultlab")
        .join("settings.json")
}

/// Opaque load/save of the settings document.
#[async_trait]
pub trait SettingsStorage: Send + Sync {
    /// `Ok(None)` means nothing has been saved yet.
    async fn load(&self) -> Result<Option<Value>, ConfigError>;

    async fn save(&self, data: &Value) -> Result<(), ConfigError>;
}

/// Settings stored as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct FileSettingsStorage {
    path: PathBuf,
}

impl FileSettingsStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsStorage for FileSettingsStorage {
    async fn load(&self) -> Result<Option<Value>, ConfigError> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "no settings file yet");
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, data: &Value) -> Result<(), ConfigError> {
        if let Some(parent_directory) = self.path.parent()
            && !parent_directory.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent_directory).await?;
        }
        let content = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, content).await?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// In-process settings, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySettingsStorage {
    data: Mutex<Option<Value>>,
    saves: AtomicUsize,
}

impl MemorySettingsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: Mutex::new(Some(data)),
            saves: AtomicUsize::new(0),
        }
    }

    pub async fn snapshot(&self) -> Option<Value> {
        self.data.lock().await.clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStorage for MemorySettingsStorage {
    async fn load(&self) -> Result<Option<Value>, ConfigError> {
        Ok(self.data.lock().await.clone())
    }

    async fn save(&self, data: &Value) -> Result<(), ConfigError> {
        *self.data.lock().await = Some(data.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
