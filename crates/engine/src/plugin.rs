//! The plugin object: settings, remote status and registered commands.
//!
//! [`LabPlugin`] owns all process-wide state. Every reconciliation pass
//! (load, URL change, command toggle, manual refresh) runs under the state
//! lock, so passes never interleave.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use vaultlab_api::{RemoteSource, ServerStatus, TransportError, operation_url, validate_server_url};
use vaultlab_registry::{
    ConfigError, DebugLevel, LabSettings, OperationConfigStore, Reconciliation, reconcile,
};
use vaultlab_types::{
    ActiveOperation, OperationConfig, OperationId, OperationMode, Region, SURFACE_PREFIX, SurfaceId,
};

use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
use crate::host::{FocusEvent, Host, HostError};
use crate::lifecycle::{LifecycleError, LifecycleManager};
use crate::surface::{ClickOutcome, LabView, SurfaceFactory, SurfaceHandle};

pub const UNREACHABLE_NOTICE: &str = "Lab: Cannot reach server";

const FOCUS_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("operation is not active: {id}")]
    NotActive { id: OperationId },

    #[error("operation {id} is in {mode} mode")]
    WrongMode { id: OperationId, mode: OperationMode },
}

/// One invocable command exposed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct LabCommand {
    /// `vaultlab_<operation id>`.
    pub id: String,
    pub operation: OperationId,
    pub name: String,
    pub mode: OperationMode,
}

/// Partial edit of one operation's config. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationUpdate {
    pub label: Option<String>,
    pub mode: Option<OperationMode>,
    /// An empty icon clears it back to the default.
    pub icon: Option<String>,
    pub invoke_on_focus: Option<bool>,
    pub region: Option<Region>,
}

impl OperationUpdate {
    fn apply(self, config: &mut OperationConfig) {
        if let Some(label) = self.label {
            config.label = label;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(icon) = self.icon {
            config.icon = if icon.trim().is_empty() { None } else { Some(icon) };
        }
        if let Some(enabled) = self.invoke_on_focus {
            config.invoke_on_focus = Some(enabled);
        }
        if let Some(region) = self.region {
            config.region = Some(region);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsEntry {
    pub id: OperationId,
    pub url: String,
    pub config: OperationConfig,
    /// Never configured by the user.
    pub synthesized: bool,
}

/// Everything the settings surface shows.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub server_url: String,
    pub debug: DebugLevel,
    pub status_line: String,
    pub operations: Vec<SettingsEntry>,
}

struct PluginState {
    settings: LabSettings,
    status: ServerStatus,
    reconciliation: Reconciliation,
    active: IndexMap<OperationId, ActiveOperation>,
    dispatcher: Arc<Dispatcher>,
}

pub struct LabPlugin {
    store: OperationConfigStore,
    remote: Arc<dyn RemoteSource>,
    host: Host,
    factory: SurfaceFactory,
    lifecycle: LifecycleManager,
    focus: broadcast::Sender<FocusEvent>,
    state: Mutex<PluginState>,
}

impl LabPlugin {
    pub fn new(store: OperationConfigStore, remote: Arc<dyn RemoteSource>, host: Host) -> Self {
        let settings = LabSettings::default();
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&remote),
            host.clone(),
            settings.server_url.clone(),
            settings.debug,
        ));
        let (focus, _) = broadcast::channel(FOCUS_CHANNEL_CAPACITY);
        Self {
            store,
            factory: SurfaceFactory::new(Arc::clone(&host.editor)),
            lifecycle: LifecycleManager::new(Arc::clone(&host.slots)),
            remote,
            host,
            focus,
            state: Mutex::new(PluginState {
                settings,
                status: ServerStatus::Unavailable {
                    reason: "not loaded".to_string(),
                },
                reconciliation: Reconciliation::default(),
                active: IndexMap::new(),
                dispatcher,
            }),
        }
    }

    /// Load settings and run the first reconciliation pass.
    pub async fn load(&self) -> Result<ServerStatus, PluginError> {
        let mut state = self.state.lock().await;
        state.settings = self.store.load().await?;
        info!(server_url = %state.settings.server_url, "loading vaultlab");
        Ok(self.reconcile_pass(&mut state).await)
    }

    /// Re-run reconciliation against the current settings.
    pub async fn refresh(&self) -> Result<ServerStatus, PluginError> {
        let mut state = self.state.lock().await;
        Ok(self.reconcile_pass(&mut state).await)
    }

    /// Tear down every surface and forget the registered commands.
    pub async fn unload(&self) {
        let mut state = self.state.lock().await;
        self.lifecycle.teardown(state.settings.debug.is_verbose()).await;
        state.active.clear();
        state.reconciliation = Reconciliation::default();
        state.status = ServerStatus::Unavailable {
            reason: "unloaded".to_string(),
        };
        info!("vaultlab unloaded");
    }

    async fn reconcile_pass(&self, state: &mut PluginState) -> ServerStatus {
        let status = self.remote.fetch_status(&state.settings.server_url).await;
        let detached = self.lifecycle.teardown(state.settings.debug.is_verbose()).await;
        state.active.clear();
        state.status = status.clone();
        state.dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.remote),
            self.host.clone(),
            state.settings.server_url.clone(),
            state.settings.debug,
        ));

        let ServerStatus::Available { ids } = &status else {
            warn!(server_url = %state.settings.server_url, detached, "server unavailable; no operations registered");
            state.reconciliation = Reconciliation::default();
            self.host.notifier.notice(UNREACHABLE_NOTICE);
            return state.status.clone();
        };

        state.reconciliation = reconcile(ids, &state.settings.commands);
        let active_document = self.host.editor.active_document();
        for operation in state.reconciliation.active() {
            if let Err(err) = self.install(&operation, &state.dispatcher, active_document.as_deref()).await {
                warn!(operation = %operation.id, error = %err, "failed to install surface");
                continue;
            }
            state.active.insert(operation.id.clone(), operation);
        }
        info!(
            catalog = ids.len(),
            active = state.active.len(),
            detached,
            "reconciliation pass complete"
        );
        status
    }

    async fn install(
        &self,
        operation: &ActiveOperation,
        dispatcher: &Arc<Dispatcher>,
        active_document: Option<&str>,
    ) -> Result<SurfaceHandle, PluginError> {
        let handle = self.factory.create(operation);
        self.lifecycle.register(handle.clone()).await?;

        let placed = async {
            // Focus triggers only apply to slot surfaces.
            if !handle.requires_slot() {
                if operation.config.invokes_on_focus() {
                    debug!(operation = %operation.id, mode = %operation.mode(), "focus trigger ignored for text mode");
                }
                return Ok(());
            }
            self.lifecycle.attach(handle.id(), active_document).await?;
            if operation.config.invokes_on_focus() {
                self.lifecycle
                    .subscribe_focus(handle.id(), self.focus.subscribe(), Arc::clone(dispatcher))
                    .await?;
            }
            Ok::<(), LifecycleError>(())
        }
        .await;

        if let Err(err) = placed {
            if let Err(cleanup) = self.lifecycle.detach(handle.id()).await {
                debug!(surface = %handle.id(), error = %cleanup, "cleanup after failed install");
            }
            return Err(err.into());
        }
        Ok(handle)
    }

    /// Handle of an active operation, reopening its slot if it was closed.
    async fn live_handle(&self, id: &OperationId) -> Result<(SurfaceHandle, Arc<Dispatcher>), PluginError> {
        let state = self.state.lock().await;
        let operation = state
            .active
            .get(id)
            .ok_or_else(|| PluginError::NotActive { id: id.clone() })?;
        let dispatcher = Arc::clone(&state.dispatcher);

        if let Some(handle) = self.lifecycle.handle(&operation.surface_id()).await {
            return Ok((handle, dispatcher));
        }
        let active_document = self.host.editor.active_document();
        let handle = self.install(operation, &dispatcher, active_document.as_deref()).await?;
        Ok((handle, dispatcher))
    }

    /// Run the command bound to an operation.
    ///
    /// Conversations only bring their panel forward; lines are sent with
    /// [`LabPlugin::submit_message`].
    pub async fn invoke(&self, id: &OperationId) -> Result<DispatchOutcome, PluginError> {
        let (handle, dispatcher) = self.live_handle(id).await?;
        if handle.mode() == OperationMode::Conversation {
            self.lifecycle.reveal(handle.id()).await?;
            return Ok(DispatchOutcome::Revealed);
        }
        Ok(dispatcher.invoke(&handle).await?)
    }

    pub async fn submit_message(&self, id: &OperationId, line: &str) -> Result<DispatchOutcome, PluginError> {
        let (handle, dispatcher) = self.live_handle(id).await?;
        if handle.mode() != OperationMode::Conversation {
            return Err(PluginError::WrongMode {
                id: id.clone(),
                mode: handle.mode(),
            });
        }
        Ok(dispatcher.submit(&handle, line).await?)
    }

    /// Tell the plugin the focused document changed.
    ///
    /// The host must update what its editor reports before calling this;
    /// focus-triggered operations read the context when they fire.
    pub async fn notify_focus_change(&self, path: Option<&str>) {
        for handle in self.lifecycle.handles().await {
            let view = {
                let mut surface = handle.lock().await;
                surface.as_list_mut().map(|panel| {
                    panel.set_active_document(path);
                    panel.render()
                })
            };
            if let Some(view) = view {
                self.host.slots.present(handle.id(), &view);
            }
        }

        let Some(path) = path else {
            return;
        };
        if self.focus.send(FocusEvent { path: path.to_string() }).is_err() {
            debug!(%path, "no focus subscribers");
        }
    }

    async fn panel_handle(&self, id: &OperationId) -> Result<SurfaceHandle, PluginError> {
        let state = self.state.lock().await;
        let operation = state
            .active
            .get(id)
            .ok_or_else(|| PluginError::NotActive { id: id.clone() })?;
        if operation.mode() != OperationMode::Panel {
            return Err(PluginError::WrongMode {
                id: id.clone(),
                mode: operation.mode(),
            });
        }
        let surface_id = operation.surface_id();
        self.lifecycle
            .handle(&surface_id)
            .await
            .ok_or_else(|| LifecycleError::NotRegistered { id: surface_id }.into())
    }

    /// Open a list item; a stale item is dropped and the user told.
    pub async fn click_item(&self, id: &OperationId, path: &str, split: bool) -> Result<ClickOutcome, PluginError> {
        let handle = self.panel_handle(id).await?;
        let (outcome, view) = {
            let mut surface = handle.lock().await;
            let panel = surface.as_list_mut().ok_or_else(|| PluginError::WrongMode {
                id: id.clone(),
                mode: handle.mode(),
            })?;
            let outcome = panel.click(path, split, self.host.vault.as_ref())?;
            (outcome, panel.render())
        };
        if let ClickOutcome::Removed { path } = &outcome {
            self.host.notifier.notice(&format!("'{path}' not found"));
            self.host.slots.present(handle.id(), &view);
        }
        Ok(outcome)
    }

    pub async fn clear_panel(&self, id: &OperationId) -> Result<(), PluginError> {
        let handle = self.panel_handle(id).await?;
        let view = {
            let mut surface = handle.lock().await;
            surface.as_list_mut().map(|panel| {
                panel.clear();
                panel.render()
            })
        };
        if let Some(view) = view {
            self.host.slots.present(handle.id(), &view);
        }
        Ok(())
    }

    /// Detach an operation's panel. The next invocation reopens it.
    pub async fn close_panel(&self, id: &OperationId) -> Result<(), PluginError> {
        let surface_id = {
            let state = self.state.lock().await;
            let operation = state
                .active
                .get(id)
                .ok_or_else(|| PluginError::NotActive { id: id.clone() })?;
            if !operation.mode().requires_surface() {
                return Err(PluginError::WrongMode {
                    id: id.clone(),
                    mode: operation.mode(),
                });
            }
            operation.surface_id()
        };
        self.lifecycle.detach(&surface_id).await?;
        Ok(())
    }

    pub async fn commands(&self) -> Vec<LabCommand> {
        let state = self.state.lock().await;
        state
            .active
            .values()
            .map(|operation| LabCommand {
                id: format!("{SURFACE_PREFIX}{}", operation.id),
                operation: operation.id.clone(),
                name: operation.label().to_string(),
                mode: operation.mode(),
            })
            .collect()
    }

    pub async fn status(&self) -> ServerStatus {
        self.state.lock().await.status.clone()
    }

    pub async fn settings(&self) -> LabSettings {
        self.state.lock().await.settings.clone()
    }

    /// Slot identities currently attached by this plugin.
    pub async fn attached_surfaces(&self) -> Vec<SurfaceId> {
        self.lifecycle.attached_ids().await
    }

    pub async fn surface(&self, id: &OperationId) -> Option<SurfaceHandle> {
        self.lifecycle.handle(&SurfaceId::for_operation(id)).await
    }

    pub async fn settings_view(&self) -> SettingsView {
        let state = self.state.lock().await;
        let status_line = match &state.status {
            ServerStatus::Available { ids } => format!("online [{}]", ids.len()),
            ServerStatus::Unavailable { .. } => "cannot reach server".to_string(),
        };
        let operations = state
            .reconciliation
            .operations()
            .iter()
            .map(|operation| SettingsEntry {
                id: operation.id.clone(),
                url: operation_url(&state.settings.server_url, &operation.id),
                config: state
                    .settings
                    .command(&operation.id)
                    .cloned()
                    .unwrap_or_else(|| operation.config.clone()),
                synthesized: state.settings.command(&operation.id).is_none(),
            })
            .collect();
        SettingsView {
            server_url: state.settings.server_url.clone(),
            debug: state.settings.debug,
            status_line,
            operations,
        }
    }

    /// Point at another server, persist, and reconcile against it.
    pub async fn set_server_url(&self, server_url: &str) -> Result<ServerStatus, PluginError> {
        validate_server_url(server_url)?;
        let mut state = self.state.lock().await;
        state.settings.server_url = server_url.trim().to_string();
        self.store.save(&state.settings).await?;
        Ok(self.reconcile_pass(&mut state).await)
    }

    /// Enable or disable an operation, persist, and reconcile.
    pub async fn set_operation_active(&self, id: &OperationId, active: bool) -> Result<ServerStatus, PluginError> {
        let mut state = self.state.lock().await;
        state.settings.command_mut(id).active = active;
        self.store.save(&state.settings).await?;
        info!(operation = %id, active, "operation toggled");
        Ok(self.reconcile_pass(&mut state).await)
    }

    /// Persist a config edit. It takes effect on the next pass.
    pub async fn update_operation(&self, id: &OperationId, update: OperationUpdate) -> Result<(), PluginError> {
        let mut state = self.state.lock().await;
        update.apply(state.settings.command_mut(id));
        self.store.save(&state.settings).await?;
        debug!(operation = %id, "operation config updated");
        Ok(())
    }

    pub async fn set_debug(&self, debug: DebugLevel) -> Result<(), PluginError> {
        let mut state = self.state.lock().await;
        state.settings.debug = debug;
        self.store.save(&state.settings).await?;
        state.dispatcher.set_debug(debug);
        let level = debug;
        info!(debug = %level, "debug level changed");
        Ok(())
    }
}

impl std::fmt::Debug for LabPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabPlugin").field("host", &self.host).finish_non_exhaustive()
    }
}
