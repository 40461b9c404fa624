//! Durable plugin settings.
//!
//! Settings live in one JSON document:
//! `{"server_url": ..., "debug": "verbose" | "off", "commands": {<id>: {...}}}`.
//! The file sits at `$VAULTLAB_CONFIG_PATH` or
//! `<config dir>/vaultlab/settings.json`.

mod model;
mod storage;
mod store;

pub use model::{ConfigError, DEFAULT_SERVER_URL, DebugLevel, LabSettings, ParseDebugLevelError};
pub use storage::{FileSettingsStorage, MemorySettingsStorage, SettingsStorage, default_config_path};
pub use store::OperationConfigStore;
