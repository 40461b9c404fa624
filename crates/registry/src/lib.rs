//! Settings persistence and catalog reconciliation for vaultlab.
//!
//! [`OperationConfigStore`] loads and saves the durable settings document;
//! [`reconcile`] merges it with the operations a remote currently serves.

pub mod config;
pub mod reconcile;

pub use config::{
    ConfigError, DEFAULT_SERVER_URL, DebugLevel, FileSettingsStorage, LabSettings, MemorySettingsStorage,
    OperationConfigStore, ParseDebugLevelError, SettingsStorage, default_config_path,
};
pub use reconcile::{ReconciledOperation, Reconciliation, reconcile};
