//! Slot lifecycle for operation surfaces.
//!
//! Each surface moves `registered -> attached -> unregistered`. The manager
//! keeps its own registry of the surfaces it created, and on teardown also
//! clears every host slot carrying the reserved prefix so slots left by an
//! earlier session never survive a pass.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vaultlab_types::SurfaceId;

use crate::dispatcher::Dispatcher;
use crate::host::{FocusEvent, HostError, SlotHost};
use crate::surface::SurfaceHandle;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("surface already registered: {id}")]
    AlreadyRegistered { id: SurfaceId },

    #[error("surface not registered: {id}")]
    NotRegistered { id: SurfaceId },

    #[error("surface {id} does not occupy a slot")]
    NoSlot { id: SurfaceId },

    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Registered,
    Attached,
}

struct SlotEntry {
    handle: SurfaceHandle,
    state: SlotState,
    focus_listener: Option<JoinHandle<()>>,
}

impl SlotEntry {
    fn release(self, slots: &dyn SlotHost) {
        self.handle.mark_detached();
        if let Some(listener) = self.focus_listener {
            listener.abort();
        }
        if self.state == SlotState::Attached {
            slots.detach(self.handle.id().as_str());
        }
    }
}

/// Owner of every slot identity vaultlab places in the host.
pub struct LifecycleManager {
    slots: Arc<dyn SlotHost>,
    entries: Mutex<IndexMap<SurfaceId, SlotEntry>>,
}

impl LifecycleManager {
    pub fn new(slots: Arc<dyn SlotHost>) -> Self {
        Self {
            slots,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Detach every slot this system owns, registered here or merely prefixed.
    ///
    /// Returns the number of host slots detached.
    pub async fn teardown(&self, verbose: bool) -> usize {
        let mut detached = 0;
        for slot in self.slots.active_slots() {
            if SurfaceId::has_reserved_prefix(&slot) {
                if verbose {
                    debug!(surface = %slot, "detaching");
                }
                self.slots.detach(&slot);
                detached += 1;
            }
        }

        let mut entries = self.entries.lock().await;
        for (id, entry) in entries.drain(..) {
            if verbose {
                debug!(surface = %id, state = ?entry.state, "unregistering");
            }
            entry.release(self.slots.as_ref());
        }
        detached
    }

    pub async fn register(&self, handle: SurfaceHandle) -> Result<(), LifecycleError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(handle.id()) {
            return Err(LifecycleError::AlreadyRegistered { id: handle.id().clone() });
        }
        debug!(surface = %handle.id(), mode = %handle.mode(), "registered surface");
        entries.insert(
            handle.id().clone(),
            SlotEntry {
                handle,
                state: SlotState::Registered,
                focus_listener: None,
            },
        );
        Ok(())
    }

    /// Place a registered surface in its slot, revealing it if the slot
    /// already exists, then present its current state.
    pub async fn attach(&self, id: &SurfaceId, active_document: Option<&str>) -> Result<(), LifecycleError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| LifecycleError::NotRegistered { id: id.clone() })?;
        if !entry.handle.requires_slot() {
            return Err(LifecycleError::NoSlot { id: id.clone() });
        }

        if self.slots.active_slots().iter().any(|slot| slot == id.as_str()) {
            self.slots.reveal(id)?;
        } else {
            let config = &entry.handle.operation().config;
            self.slots
                .attach(id, config.region_or_default(), entry.handle.operation().label())?;
        }
        entry.state = SlotState::Attached;

        let view = {
            let mut surface = entry.handle.lock().await;
            surface.as_view_mut().load(active_document);
            surface.as_view().render()
        };
        self.slots.present(id, &view);
        debug!(surface = %id, "attached surface");
        Ok(())
    }

    /// Reveal an attached slot.
    pub async fn reveal(&self, id: &SurfaceId) -> Result<(), LifecycleError> {
        let entries = self.entries.lock().await;
        match entries.get(id) {
            Some(entry) if entry.state == SlotState::Attached => Ok(self.slots.reveal(id)?),
            _ => Err(LifecycleError::NotRegistered { id: id.clone() }),
        }
    }

    /// Run the surface's invocation on every focus transition.
    pub async fn subscribe_focus(
        &self,
        id: &SurfaceId,
        mut receiver: broadcast::Receiver<FocusEvent>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<(), LifecycleError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| LifecycleError::NotRegistered { id: id.clone() })?;
        let handle = entry.handle.clone();

        let listener = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if !handle.is_attached() {
                            break;
                        }
                        debug!(surface = %handle.id(), path = %event.path, "focus changed; invoking");
                        if let Err(err) = dispatcher.invoke(&handle).await {
                            warn!(surface = %handle.id(), error = %err, "focus-triggered invocation failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(surface = %handle.id(), skipped, "focus listener lagged");
                    }
                }
            }
        });

        if let Some(previous) = entry.focus_listener.replace(listener) {
            previous.abort();
        }
        Ok(())
    }

    /// Remove one surface, detaching its slot.
    pub async fn detach(&self, id: &SurfaceId) -> Result<(), LifecycleError> {
        let entry = self
            .entries
            .lock()
            .await
            .shift_remove(id)
            .ok_or_else(|| LifecycleError::NotRegistered { id: id.clone() })?;
        entry.release(self.slots.as_ref());
        debug!(surface = %id, "detached surface");
        Ok(())
    }

    pub async fn handle(&self, id: &SurfaceId) -> Option<SurfaceHandle> {
        self.entries.lock().await.get(id).map(|entry| entry.handle.clone())
    }

    pub async fn handles(&self) -> Vec<SurfaceHandle> {
        self.entries.lock().await.values().map(|entry| entry.handle.clone()).collect()
    }

    pub async fn state(&self, id: &SurfaceId) -> Option<SlotState> {
        self.entries.lock().await.get(id).map(|entry| entry.state)
    }

    pub async fn attached_ids(&self) -> Vec<SurfaceId> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| entry.state == SlotState::Attached)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryEditor, MemorySlots};
    use crate::surface::SurfaceFactory;
    use vaultlab_types::{ActiveOperation, OperationConfig, OperationId, OperationMode, Region};

    fn handle(id: &str, mode: OperationMode) -> SurfaceHandle {
        let mut config = OperationConfig::new(id, mode).activated();
        config.region = Some(Region::Left);
        SurfaceFactory::new(Arc::new(MemoryEditor::new())).create(&ActiveOperation::new(OperationId::from(id), config))
    }

    #[tokio::test]
    async fn attach_reveals_existing_slot_instead_of_duplicating() {
        let slots = Arc::new(MemorySlots::new());
        let manager = LifecycleManager::new(slots.clone());
        let panel = handle("similar", OperationMode::Panel);
        slots.insert_slot(panel.id().as_str());

        manager.register(panel.clone()).await.unwrap();
        manager.attach(panel.id(), None).await.unwrap();

        assert_eq!(slots.slot_ids(), vec!["vaultlab_similar".to_string()]);
        assert_eq!(slots.attach_count(), 0);
        assert_eq!(slots.record("vaultlab_similar").unwrap().reveals, 1);
        assert_eq!(manager.state(panel.id()).await, Some(SlotState::Attached));
        assert!(slots.view("vaultlab_similar").is_some());
    }

    #[tokio::test]
    async fn teardown_clears_prefixed_and_registered_slots_only() {
        let slots = Arc::new(MemorySlots::new());
        slots.insert_slot("vaultlab_stale");
        slots.insert_slot("file-explorer");
        let manager = LifecycleManager::new(slots.clone());

        let panel = handle("similar", OperationMode::Panel);
        manager.register(panel.clone()).await.unwrap();
        manager.attach(panel.id(), None).await.unwrap();
        assert_eq!(slots.record("vaultlab_similar").unwrap().region, Region::Left);

        let detached = manager.teardown(true).await;
        assert_eq!(detached, 2);
        assert_eq!(slots.detach_count(), 2);
        assert_eq!(slots.slot_ids(), vec!["file-explorer".to_string()]);
        assert!(!panel.is_attached());
        assert!(manager.handles().await.is_empty());
    }

    #[tokio::test]
    async fn registration_is_unique_and_text_surfaces_have_no_slot() {
        let manager = LifecycleManager::new(Arc::new(MemorySlots::new()));
        let text = handle("hello_world", OperationMode::InsertText);
        manager.register(text.clone()).await.unwrap();
        assert!(matches!(
            manager.register(text.clone()).await,
            Err(LifecycleError::AlreadyRegistered { .. })
        ));
        assert!(matches!(manager.attach(text.id(), None).await, Err(LifecycleError::NoSlot { .. })));
        assert_eq!(manager.state(text.id()).await, Some(SlotState::Registered));
        assert!(manager.attached_ids().await.is_empty());
    }

    #[tokio::test]
    async fn detach_removes_single_surface() {
        let slots = Arc::new(MemorySlots::new());
        let manager = LifecycleManager::new(slots.clone());
        let panel = handle("similar", OperationMode::Panel);
        manager.register(panel.clone()).await.unwrap();
        manager.attach(panel.id(), None).await.unwrap();

        manager.detach(panel.id()).await.unwrap();
        assert!(slots.slot_ids().is_empty());
        assert!(!panel.is_attached());
        assert!(matches!(
            manager.detach(panel.id()).await,
            Err(LifecycleError::NotRegistered { .. })
        ));
    }
}
