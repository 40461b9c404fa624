#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use vaultlab_engine::host::memory::{MemoryEditor, MemoryRemote, MemorySlots, MemoryVault, RecordingNotifier};
use vaultlab_engine::{Host, LabPlugin};
use vaultlab_registry::{MemorySettingsStorage, OperationConfigStore};

pub struct Harness {
    pub editor: Arc<MemoryEditor>,
    pub vault: Arc<MemoryVault>,
    pub slots: Arc<MemorySlots>,
    pub notifier: Arc<RecordingNotifier>,
    pub remote: Arc<MemoryRemote>,
    pub storage: Arc<MemorySettingsStorage>,
    pub plugin: Arc<LabPlugin>,
}

pub fn harness(stored: Option<Value>, catalog: &[&str]) -> Harness {
    let editor = Arc::new(MemoryEditor::with_document("notes/a.md", "hello"));
    let vault = Arc::new(MemoryVault::new("/vault", ["notes/a.md", "notes/b.md"]));
    let slots = Arc::new(MemorySlots::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let remote = Arc::new(MemoryRemote::available(catalog.iter().copied()));
    let storage = Arc::new(match stored {
        Some(data) => MemorySettingsStorage::with_data(data),
        None => MemorySettingsStorage::new(),
    });
    let host = Host::new(editor.clone(), vault.clone(), slots.clone(), notifier.clone());
    let plugin = Arc::new(LabPlugin::new(
        OperationConfigStore::new(storage.clone()),
        remote.clone(),
        host,
    ));
    Harness {
        editor,
        vault,
        slots,
        notifier,
        remote,
        storage,
        plugin,
    }
}

pub fn settings(commands: Value) -> Value {
    json!({
        "server_url": "http://localhost:5000",
        "debug": "verbose",
        "commands": commands
    })
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
