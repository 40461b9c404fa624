//! In-process host collaborators.
//!
//! Used by the engine's tests and by embedders that drive the engine without
//! a real editor. Every fake records what was done to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::Notify;
use vaultlab_api::{RemoteSource, ServerStatus, TransportError};
use vaultlab_types::{OperationId, Region, RequestContext, SurfaceId};

use super::{Editor, HostError, Notifier, SlotHost, Vault};
use crate::surface::RenderedView;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct EditorState {
    document: Option<String>,
    text: String,
    selection: Option<String>,
    mutations: usize,
}

/// Single-document editor; the cursor sits at the end of the text.
#[derive(Debug, Default)]
pub struct MemoryEditor {
    state: Mutex<EditorState>,
}

impl MemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(EditorState {
                document: Some(path.into()),
                text: text.into(),
                ..Default::default()
            }),
        }
    }

    pub fn set_active_document(&self, path: Option<&str>) {
        lock(&self.state).document = path.map(str::to_string);
    }

    pub fn select(&self, selection: impl Into<String>) {
        lock(&self.state).selection = Some(selection.into());
    }

    pub fn text(&self) -> String {
        lock(&self.state).text.clone()
    }

    pub fn mutation_count(&self) -> usize {
        lock(&self.state).mutations
    }
}

impl Editor for MemoryEditor {
    fn active_document(&self) -> Option<String> {
        lock(&self.state).document.clone()
    }

    fn selection(&self) -> Option<String> {
        lock(&self.state).selection.clone()
    }

    fn insert_at_cursor(&self, text: &str) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if state.document.is_none() {
            return Err(HostError::NoActiveDocument);
        }
        state.text.push_str(text);
        state.mutations += 1;
        Ok(())
    }

    fn replace_selection(&self, text: &str) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if state.document.is_none() {
            return Err(HostError::NoActiveDocument);
        }
        match state.selection.take() {
            Some(selection) if !selection.is_empty() => {
                state.text = state.text.replacen(&selection, text, 1);
            }
            _ => state.text.push_str(text),
        }
        state.selection = Some(text.to_string());
        state.mutations += 1;
        Ok(())
    }
}

/// Fixed file set rooted at a fake absolute path.
#[derive(Debug)]
pub struct MemoryVault {
    root: String,
    files: Mutex<Vec<String>>,
    opened: Mutex<Vec<(String, bool)>>,
}

impl MemoryVault {
    pub fn new<I, S>(root: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            files: Mutex::new(files.into_iter().map(Into::into).collect()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every `(path, split)` passed to [`Vault::open`].
    pub fn opened(&self) -> Vec<(String, bool)> {
        lock(&self.opened).clone()
    }
}

impl Vault for MemoryVault {
    fn root(&self) -> &str {
        &self.root
    }

    fn contains(&self, path: &str) -> bool {
        lock(&self.files).iter().any(|file| file == path)
    }

    fn open(&self, path: &str, split: bool) -> Result<(), HostError> {
        if !self.contains(path) {
            return Err(HostError::DocumentNotFound { path: path.to_string() });
        }
        lock(&self.opened).push((path.to_string(), split));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotRecord {
    pub region: Region,
    pub title: String,
    pub reveals: usize,
    pub view: Option<RenderedView>,
}

/// Slot container that keeps every placed slot in insertion order.
#[derive(Debug, Default)]
pub struct MemorySlots {
    slots: Mutex<IndexMap<String, SlotRecord>>,
    attaches: Mutex<usize>,
    detaches: Mutex<usize>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a slot directly, as another plugin or an earlier session would.
    pub fn insert_slot(&self, slot: impl Into<String>) {
        lock(&self.slots).insert(
            slot.into(),
            SlotRecord {
                region: Region::Right,
                title: String::new(),
                reveals: 0,
                view: None,
            },
        );
    }

    pub fn slot_ids(&self) -> Vec<String> {
        lock(&self.slots).keys().cloned().collect()
    }

    pub fn record(&self, slot: &str) -> Option<SlotRecord> {
        lock(&self.slots).get(slot).cloned()
    }

    pub fn view(&self, slot: &str) -> Option<RenderedView> {
        lock(&self.slots).get(slot).and_then(|record| record.view.clone())
    }

    pub fn attach_count(&self) -> usize {
        *lock(&self.attaches)
    }

    pub fn detach_count(&self) -> usize {
        *lock(&self.detaches)
    }
}

impl SlotHost for MemorySlots {
    fn attach(&self, slot: &SurfaceId, region: Region, title: &str) -> Result<(), HostError> {
        let mut slots = lock(&self.slots);
        if slots.contains_key(slot.as_str()) {
            return Err(HostError::slot(slot.as_str(), "already attached"));
        }
        slots.insert(
            slot.to_string(),
            SlotRecord {
                region,
                title: title.to_string(),
                reveals: 0,
                view: None,
            },
        );
        *lock(&self.attaches) += 1;
        Ok(())
    }

    fn detach(&self, slot: &str) {
        if lock(&self.slots).shift_remove(slot).is_some() {
            *lock(&self.detaches) += 1;
        }
    }

    fn active_slots(&self) -> Vec<String> {
        self.slot_ids()
    }

    fn reveal(&self, slot: &SurfaceId) -> Result<(), HostError> {
        let mut slots = lock(&self.slots);
        let record = slots
            .get_mut(slot.as_str())
            .ok_or_else(|| HostError::slot(slot.as_str(), "not attached"))?;
        record.reveals += 1;
        Ok(())
    }

    fn present(&self, slot: &SurfaceId, view: &RenderedView) {
        if let Some(record) = lock(&self.slots).get_mut(slot.as_str()) {
            record.view = Some(view.clone());
        }
    }
}

/// Notifier that keeps every notice.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<String> {
        lock(&self.notices).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notice(&self, message: &str) {
        lock(&self.notices).push(message.to_string());
    }
}

/// Scripted remote: a settable catalog and one canned reply per operation.
#[derive(Debug)]
pub struct MemoryRemote {
    status: Mutex<ServerStatus>,
    replies: Mutex<HashMap<OperationId, Result<Value, String>>>,
    gates: Mutex<HashMap<OperationId, Arc<Notify>>>,
    calls: Mutex<Vec<(String, RequestContext)>>,
    status_checks: Mutex<usize>,
}

impl MemoryRemote {
    pub fn available<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let remote = Self::unavailable();
        remote.set_catalog(ids);
        remote
    }

    pub fn unavailable() -> Self {
        Self {
            status: Mutex::new(ServerStatus::Unavailable {
                reason: "connection refused".to_string(),
            }),
            replies: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            status_checks: Mutex::new(0),
        }
    }

    pub fn set_catalog<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.status) = ServerStatus::Available {
            ids: ids.into_iter().map(|id| OperationId::new(id.into())).collect(),
        };
    }

    pub fn go_offline(&self) {
        *lock(&self.status) = ServerStatus::Unavailable {
            reason: "connection refused".to_string(),
        };
    }

    pub fn reply(&self, id: &str, body: Value) {
        lock(&self.replies).insert(OperationId::from(id), Ok(body));
    }

    /// Make calls to `id` fail at the transport level.
    pub fn fail(&self, id: &str, message: &str) {
        lock(&self.replies).insert(OperationId::from(id), Err(message.to_string()));
    }

    /// Hold replies for `id` until the returned gate is notified.
    pub fn hold(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).insert(OperationId::from(id), Arc::clone(&gate));
        gate
    }

    /// Every `(url, payload)` posted so far.
    pub fn calls(&self) -> Vec<(String, RequestContext)> {
        lock(&self.calls).clone()
    }

    pub fn status_checks(&self) -> usize {
        *lock(&self.status_checks)
    }
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn fetch_status(&self, _server_url: &str) -> ServerStatus {
        *lock(&self.status_checks) += 1;
        lock(&self.status).clone()
    }

    async fn post(&self, url: &str, payload: &RequestContext) -> Result<Value, TransportError> {
        lock(&self.calls).push((url.to_string(), payload.clone()));
        let id = OperationId::from_url(url).ok_or_else(|| TransportError::request(url, "no operation in url"))?;

        let gate = lock(&self.gates).get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match lock(&self.replies).get(&id).cloned() {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(TransportError::request(url, message)),
            None => Err(TransportError::request(url, "404 Not Found")),
        }
    }
}
